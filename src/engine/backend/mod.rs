//! Audio input abstractions for the blow detector.
//!
//! A backend opens a measurement-only input stream and hands back an
//! [`InputMeter`] that the sampling thread polls once per tick. The meter is
//! opened, read and closed on that one thread, so it does not need to be
//! `Send` (cpal streams are not on every platform).

use std::sync::Arc;

use crate::audio::Sample;
use crate::config::AudioSessionConfig;
use crate::error::AudioError;

/// Factory for input meters, shared between the context and detectors.
pub trait AudioInput: Send + Sync {
    /// Short backend name for logs and telemetry
    fn name(&self) -> &'static str;

    /// Configure the audio session and start a metering input stream.
    fn open(&self, session: &AudioSessionConfig) -> Result<Box<dyn InputMeter>, AudioError>;
}

/// An open input stream that can be metered.
pub trait InputMeter {
    /// Collapse everything captured since the previous call into one reading.
    fn update_meters(&mut self) -> Sample;

    /// Stop the stream and release the device. Must be idempotent.
    fn close(&mut self);
}

/// Reject session settings no backend can honour.
pub(crate) fn validate_session(session: &AudioSessionConfig) -> Result<(), AudioError> {
    if session.sample_rate == 0 {
        return Err(AudioError::UnsupportedSession {
            reason: "sample rate must be greater than 0".to_string(),
        });
    }
    if session.channels != 1 {
        return Err(AudioError::UnsupportedSession {
            reason: format!("metering is mono only (got {} channels)", session.channels),
        });
    }
    if session.ring_capacity == 0 {
        return Err(AudioError::UnsupportedSession {
            reason: "ring capacity must be greater than 0".to_string(),
        });
    }
    Ok(())
}

#[cfg(target_os = "android")]
mod oboe;
#[cfg(target_os = "android")]
pub use oboe::{mark_android_context_initialized, OboeInput};

#[cfg(not(target_os = "android"))]
mod cpal;
#[cfg(not(target_os = "android"))]
pub use cpal::CpalInput;

mod scripted;
mod wav;
pub use scripted::ScriptedInput;
pub use wav::{wav_duration, WavInput};

/// Platform microphone backend.
pub fn default_input() -> Arc<dyn AudioInput> {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "android")] {
            Arc::new(OboeInput::default())
        } else {
            Arc::new(CpalInput::default())
        }
    }
}
