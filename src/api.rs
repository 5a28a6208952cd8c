// Public API for flutter_rust_bridge integration
// Flat functions the reveal screen calls; all state lives in RevealContext

#![allow(dead_code)] // FFI functions are called from Dart, not detected by Rust analyzer

use futures::stream::BoxStream;
use futures::StreamExt;
use once_cell::sync::Lazy;
use tokio_stream::wrappers::BroadcastStream;

use crate::context::RevealContext;
use crate::engine::{BlowSample, DetectorState};
use crate::error::DetectorError;
use crate::reveal::{RevealOutcome, RevealState, RevealUpdate};
use crate::telemetry::LifecycleEvent;

// Re-export error code constants for FFI exposure
pub use crate::error::{AudioErrorCodes, DetectorErrorCodes};

/// Global RevealContext instance
///
/// One context per process; it owns at most one reveal session at a time.
static REVEAL_CONTEXT: Lazy<RevealContext> = Lazy::new(RevealContext::new);

/// Get the version of the native core
#[flutter_rust_bridge::frb(sync)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Open the reveal session for a new screen visit
///
/// Call when the reveal screen mounts. Creates a fresh detector, registers
/// the reveal as its listener and asks for microphone access. The prompt
/// stays open until [`resolve_microphone_permission`] is called. A session
/// left over from a previous visit is closed.
///
/// # Errors
/// - Invalid thresholds or sampling interval in the loaded configuration
/// - Lock poisoning on context state
#[flutter_rust_bridge::frb]
pub fn open_reveal_session() -> Result<(), DetectorError> {
    REVEAL_CONTEXT.open_session()
}

/// Deliver the user's answer to the microphone prompt
///
/// Returns `true` if a pending prompt was resolved. An answer given before
/// the prompt is requested is kept for it.
#[flutter_rust_bridge::frb]
pub fn resolve_microphone_permission(granted: bool) -> Result<bool, DetectorError> {
    REVEAL_CONTEXT.resolve_permission(granted)
}

/// Close the reveal session
///
/// Call when the screen unmounts. Stops sampling and releases the
/// microphone. Safe to call when no session is open.
#[flutter_rust_bridge::frb]
pub fn close_reveal_session() -> Result<(), DetectorError> {
    REVEAL_CONTEXT.close_session()
}

/// Tap on the portrait: fallback for devices without a usable microphone
#[flutter_rust_bridge::frb]
pub fn tap_portrait() -> Result<RevealOutcome, DetectorError> {
    REVEAL_CONTEXT.tap()
}

/// Snapshot of the reveal: lifecycle, detector state and blur radius
#[flutter_rust_bridge::frb(sync)]
pub fn reveal_state() -> Result<RevealState, DetectorError> {
    REVEAL_CONTEXT.state()
}

/// Snapshot of the detector state alone
#[flutter_rust_bridge::frb(sync)]
pub fn detector_state() -> Result<DetectorState, DetectorError> {
    REVEAL_CONTEXT.state().map(|state| state.detector)
}

/// Classify a single metering reading against the configured thresholds
///
/// Used by calibration screens to preview how a level would be judged.
#[flutter_rust_bridge::frb(sync)]
pub fn classify_reading(average_power: f32, peak_power: f32) -> Result<BlowSample, DetectorError> {
    REVEAL_CONTEXT.classify(average_power, peak_power)
}

/// Stream of reveal updates (blow samples and taps with the resulting blur)
///
/// Ends when the session is closed or replaced. Empty if no session is open.
#[flutter_rust_bridge::frb(ignore)]
pub async fn reveal_update_stream() -> BoxStream<'static, RevealUpdate> {
    match REVEAL_CONTEXT.subscribe_updates() {
        Ok(rx) => BroadcastStream::new(rx)
            .filter_map(|item| async move { item.ok() })
            .boxed(),
        Err(err) => {
            log::warn!("[API] reveal_update_stream: {}", err);
            futures::stream::empty().boxed()
        }
    }
}

/// Stream of raw blow samples, one per sampling tick
#[flutter_rust_bridge::frb(ignore)]
pub async fn blow_sample_stream() -> BoxStream<'static, BlowSample> {
    reveal_update_stream()
        .await
        .filter_map(|update| async move { update.sample })
        .boxed()
}

/// Stream of detector lifecycle events for the current session
#[flutter_rust_bridge::frb(ignore)]
pub async fn lifecycle_stream() -> BoxStream<'static, LifecycleEvent> {
    match REVEAL_CONTEXT.subscribe_lifecycle() {
        Ok(rx) => BroadcastStream::new(rx)
            .filter_map(|item| async move { item.ok() })
            .boxed(),
        Err(err) => {
            log::warn!("[API] lifecycle_stream: {}", err);
            futures::stream::empty().boxed()
        }
    }
}

/// Get AudioErrorCodes as a structured object with all error code constants
#[flutter_rust_bridge::frb(sync)]
pub fn get_audio_error_codes() -> AudioErrorCodes {
    AudioErrorCodes {}
}

/// Get DetectorErrorCodes as a structured object with all error code constants
#[flutter_rust_bridge::frb(sync)]
pub fn get_detector_error_codes() -> DetectorErrorCodes {
    DetectorErrorCodes {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_version() {
        assert_eq!(get_version(), "0.1.0");
    }
}
