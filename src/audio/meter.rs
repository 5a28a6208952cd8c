//! Level metering: PCM frames in, dBFS average/peak readings out.
//!
//! A [`MeterWindow`] accumulates every frame captured between two sampling
//! ticks and collapses them into one [`Sample`] when the tick reads it,
//! mirroring the "update meters, then read average/peak" model of mobile
//! recorder APIs.

use serde::{Deserialize, Serialize};

/// Lowest reading reported by the meter; silence and empty windows read this.
pub const METER_FLOOR_DB: f32 = -160.0;

/// Highest reading reported by the meter (full scale).
pub const METER_CEILING_DB: f32 = 0.0;

/// One amplitude reading taken on a sampling tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// RMS power of the window in dBFS
    pub average_power: f32,
    /// Peak absolute amplitude of the window in dBFS
    pub peak_power: f32,
}

impl Sample {
    pub const SILENCE: Sample = Sample {
        average_power: METER_FLOOR_DB,
        peak_power: METER_FLOOR_DB,
    };

    pub fn new(average_power: f32, peak_power: f32) -> Self {
        Self {
            average_power,
            peak_power,
        }
    }
}

/// Convert a linear amplitude (1.0 = full scale) to dBFS.
///
/// Clamped to `[METER_FLOOR_DB, METER_CEILING_DB]`; zero, negative and NaN
/// amplitudes read as the floor.
pub fn amplitude_to_dbfs(amplitude: f32) -> f32 {
    if amplitude.is_nan() || amplitude <= 0.0 {
        return METER_FLOOR_DB;
    }
    (20.0 * amplitude.log10()).clamp(METER_FLOOR_DB, METER_CEILING_DB)
}

/// Running accumulator for one metering window.
#[derive(Debug, Default, Clone)]
pub struct MeterWindow {
    sum_squares: f64,
    peak: f32,
    count: usize,
}

impl MeterWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: f32) {
        let sample = if sample.is_finite() { sample } else { 0.0 };
        self.sum_squares += f64::from(sample) * f64::from(sample);
        self.peak = self.peak.max(sample.abs());
        self.count += 1;
    }

    pub fn extend(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.push(sample);
        }
    }

    /// Number of frames accumulated since the last reading
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Collapse the window into a reading and start a new window.
    pub fn take_reading(&mut self) -> Sample {
        if self.count == 0 {
            return Sample::SILENCE;
        }

        let rms = (self.sum_squares / self.count as f64).sqrt() as f32;
        let reading = Sample {
            average_power: amplitude_to_dbfs(rms),
            peak_power: amplitude_to_dbfs(self.peak),
        };
        *self = Self::default();
        reading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_scale_square_wave_reads_zero() {
        let mut window = MeterWindow::new();
        let square: Vec<f32> = (0..480)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        window.extend(&square);

        let reading = window.take_reading();
        assert!(reading.average_power.abs() < 1e-4);
        assert!(reading.peak_power.abs() < 1e-4);
    }

    #[test]
    fn test_silence_and_empty_window_read_floor() {
        let mut window = MeterWindow::new();
        assert_eq!(window.take_reading(), Sample::SILENCE);

        window.extend(&[0.0; 256]);
        assert_eq!(window.take_reading(), Sample::SILENCE);
    }

    #[test]
    fn test_half_scale_sine_levels() {
        let mut window = MeterWindow::new();
        let sine: Vec<f32> = (0..44_100)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44_100.0).sin())
            .collect();
        window.extend(&sine);

        let reading = window.take_reading();
        // RMS of a 0.5 sine is 0.3536 -> about -9.03 dBFS; peak 0.5 -> -6.02 dBFS
        assert!((reading.average_power - -9.03).abs() < 0.05);
        assert!((reading.peak_power - -6.02).abs() < 0.05);
    }

    #[test]
    fn test_reading_resets_window() {
        let mut window = MeterWindow::new();
        window.extend(&[0.5, -0.5]);
        assert_eq!(window.len(), 2);

        let _ = window.take_reading();
        assert!(window.is_empty());
        assert_eq!(window.take_reading(), Sample::SILENCE);
    }

    #[test]
    fn test_over_range_and_nan_are_clamped() {
        assert_eq!(amplitude_to_dbfs(4.0), METER_CEILING_DB);
        assert_eq!(amplitude_to_dbfs(f32::NAN), METER_FLOOR_DB);
        assert_eq!(amplitude_to_dbfs(1e-12), METER_FLOOR_DB);

        let mut window = MeterWindow::new();
        window.extend(&[f32::NAN, f32::INFINITY]);
        assert_eq!(window.take_reading(), Sample::SILENCE);
    }
}
