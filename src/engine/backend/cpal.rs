//! CPAL-based metering input for desktop platforms (Linux, macOS, Windows)

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio::{level_ring, LevelConsumer, MeterWindow, Sample};
use crate::config::AudioSessionConfig;
use crate::error::AudioError;

use super::{validate_session, AudioInput, InputMeter};

/// Default host input device, metered through a lock-free ring.
#[derive(Default)]
pub struct CpalInput {
    _unit: (),
}

impl CpalInput {
    /// Prefer a mono config at the requested rate, then any channel count at
    /// that rate, then the device default.
    fn pick_config(
        device: &cpal::Device,
        sample_rate: u32,
    ) -> Result<cpal::SupportedStreamConfig, AudioError> {
        let rate = cpal::SampleRate(sample_rate);
        if let Ok(ranges) = device.supported_input_configs() {
            let mut candidates: Vec<_> = ranges
                .filter(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
                .collect();
            candidates.sort_by_key(|range| range.channels());
            if let Some(range) = candidates.into_iter().next() {
                return Ok(range.with_sample_rate(rate));
            }
        }

        log::warn!(
            "[CpalInput] {} Hz not supported by input device, using device default",
            sample_rate
        );
        device
            .default_input_config()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to get default input config: {:?}", e),
            })
    }
}

impl AudioInput for CpalInput {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn open(&self, session: &AudioSessionConfig) -> Result<Box<dyn InputMeter>, AudioError> {
        validate_session(session)?;

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;

        let supported = Self::pick_config(&device, session.sample_rate)?;
        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();
        let channels_count = stream_config.channels as usize;

        let (mut producer, consumer) = level_ring(session.ring_capacity);
        let err_fn = |err| log::error!("Input stream error: {}", err);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    producer.push_interleaved(data, channels_count);
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    producer.push_interleaved_i16(data, channels_count);
                },
                err_fn,
                None,
            ),
            other => {
                return Err(AudioError::StreamOpenFailed {
                    reason: format!("Unsupported input sample format {:?}", other),
                })
            }
        }
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })?;

        stream.play().map_err(|e| AudioError::HardwareError {
            details: format!("Input start failed: {}", e),
        })?;

        log::info!(
            "[CpalInput] Metering {} Hz, {} channel(s) from default input",
            stream_config.sample_rate.0,
            channels_count
        );

        Ok(Box::new(CpalMeter {
            stream: Some(stream),
            consumer,
            window: MeterWindow::new(),
        }))
    }
}

struct CpalMeter {
    stream: Option<cpal::Stream>,
    consumer: LevelConsumer,
    window: MeterWindow,
}

impl InputMeter for CpalMeter {
    fn update_meters(&mut self) -> Sample {
        self.consumer.drain_into(&mut self.window);
        self.window.take_reading()
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                log::warn!("[CpalInput] Pause before close failed: {}", err);
            }
            drop(stream);
            log::info!(
                "[CpalInput] Input released ({} samples dropped)",
                self.consumer.dropped_samples()
            );
        }
    }
}

impl Drop for CpalMeter {
    fn drop(&mut self) {
        self.close();
    }
}
