//! WAV fixture input: replays a recording through the meter at the
//! detector's tick rate, so fixtures produce the same readings a live
//! microphone would.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hound::{SampleFormat, WavReader};

use crate::audio::{MeterWindow, Sample};
use crate::config::AudioSessionConfig;
use crate::error::AudioError;

use super::{AudioInput, InputMeter};

pub struct WavInput {
    path: PathBuf,
    tick: Duration,
}

impl WavInput {
    /// `tick` must match the detector's sampling interval.
    pub fn new(path: impl Into<PathBuf>, tick: Duration) -> Self {
        Self {
            path: path.into(),
            tick,
        }
    }
}

fn fixture_error(path: &Path, err: impl std::fmt::Display) -> AudioError {
    AudioError::FixtureLoad {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Playback length of a WAV file.
pub fn wav_duration(path: impl AsRef<Path>) -> Result<Duration, AudioError> {
    let path = path.as_ref();
    let reader = WavReader::open(path).map_err(|e| fixture_error(path, e))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(fixture_error(path, "sample rate is 0"));
    }
    Ok(Duration::from_secs_f64(
        reader.duration() as f64 / spec.sample_rate as f64,
    ))
}

/// Decode the first channel of a WAV file into normalized f32 samples.
fn read_mono(path: &Path) -> Result<(Vec<f32>, u32), AudioError> {
    let mut reader = WavReader::open(path).map_err(|e| fixture_error(path, e))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| fixture_error(path, e))?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| fixture_error(path, e))?
        }
    };

    let mono = interleaved.chunks(channels).map(|frame| frame[0]).collect();
    Ok((mono, spec.sample_rate))
}

impl AudioInput for WavInput {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn open(&self, session: &AudioSessionConfig) -> Result<Box<dyn InputMeter>, AudioError> {
        let (samples, sample_rate) = read_mono(&self.path)?;
        if sample_rate != session.sample_rate {
            log::debug!(
                "[WavInput] Fixture rate {} Hz differs from session rate {} Hz; using fixture rate",
                sample_rate,
                session.sample_rate
            );
        }

        let frames_per_tick =
            ((sample_rate as u128 * self.tick.as_millis()) / 1000).max(1) as usize;
        log::info!(
            "[WavInput] Replaying {:?}: {} frames, {} per tick",
            self.path,
            samples.len(),
            frames_per_tick
        );

        Ok(Box::new(WavMeter {
            samples,
            position: 0,
            frames_per_tick,
            window: MeterWindow::new(),
        }))
    }
}

struct WavMeter {
    samples: Vec<f32>,
    position: usize,
    frames_per_tick: usize,
    window: MeterWindow,
}

impl InputMeter for WavMeter {
    fn update_meters(&mut self) -> Sample {
        let end = (self.position + self.frames_per_tick).min(self.samples.len());
        self.window.extend(&self.samples[self.position..end]);
        self.position = end;
        self.window.take_reading()
    }

    fn close(&mut self) {
        self.position = self.samples.len();
    }
}
