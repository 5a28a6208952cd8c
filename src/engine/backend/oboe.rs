//! Oboe-based metering input for Android (AAudio/OpenSL ES)

use std::sync::atomic::{AtomicBool, Ordering};

use oboe::{
    AudioInputCallback, AudioInputStreamSafe, AudioStream, AudioStreamAsync, AudioStreamBuilder,
    DataCallbackResult, Input, InputPreset, Mono, PerformanceMode, SharingMode,
};

use crate::audio::{level_ring, LevelConsumer, LevelProducer, MeterWindow, Sample};
use crate::config::AudioSessionConfig;
use crate::error::AudioError;

use super::{validate_session, AudioInput, InputMeter};

static ANDROID_CONTEXT_READY: AtomicBool = AtomicBool::new(false);

/// Record that `ndk_context` was initialized (called from `JNI_OnLoad`).
pub fn mark_android_context_initialized() {
    ANDROID_CONTEXT_READY.store(true, Ordering::SeqCst);
}

/// Realtime callback: copies mono frames into the level ring.
struct MeterCallback {
    producer: LevelProducer,
}

impl AudioInputCallback for MeterCallback {
    type FrameType = (f32, Mono);

    fn on_audio_ready(
        &mut self,
        _stream: &mut dyn AudioInputStreamSafe,
        frames: &[f32],
    ) -> DataCallbackResult {
        self.producer.push_interleaved(frames, 1);
        DataCallbackResult::Continue
    }
}

/// Android microphone input opened in unprocessed (measurement) mode.
#[derive(Default)]
pub struct OboeInput {
    _unit: (),
}

impl AudioInput for OboeInput {
    fn name(&self) -> &'static str {
        "oboe"
    }

    fn open(&self, session: &AudioSessionConfig) -> Result<Box<dyn InputMeter>, AudioError> {
        validate_session(session)?;
        if !ANDROID_CONTEXT_READY.load(Ordering::SeqCst) {
            return Err(AudioError::ContextNotInitialized);
        }

        let (producer, consumer) = level_ring(session.ring_capacity);
        let mut stream = AudioStreamBuilder::default()
            .set_performance_mode(PerformanceMode::LowLatency)
            .set_sharing_mode(SharingMode::Shared)
            .set_input_preset(InputPreset::Unprocessed)
            .set_direction::<Input>()
            .set_sample_rate(session.sample_rate as i32)
            .set_channel_count::<Mono>()
            .set_format::<f32>()
            .set_callback(MeterCallback { producer })
            .open_stream()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Input stream: {:?}", e),
            })?;

        stream.start().map_err(|e| AudioError::HardwareError {
            details: format!("Input start failed: {:?}", e),
        })?;

        log::info!("[OboeInput] Metering {} Hz mono", session.sample_rate);

        Ok(Box::new(OboeMeter {
            stream: Some(stream),
            consumer,
            window: MeterWindow::new(),
        }))
    }
}

struct OboeMeter {
    stream: Option<AudioStreamAsync<Input, MeterCallback>>,
    consumer: LevelConsumer,
    window: MeterWindow,
}

impl InputMeter for OboeMeter {
    fn update_meters(&mut self) -> Sample {
        self.consumer.drain_into(&mut self.window);
        self.window.take_reading()
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.stop() {
                log::warn!("[OboeInput] Stop failed: {:?}", err);
            }
            drop(stream);
            log::info!(
                "[OboeInput] Input released ({} samples dropped)",
                self.consumer.dropped_samples()
            );
        }
    }
}

impl Drop for OboeMeter {
    fn drop(&mut self) {
        self.close();
    }
}
