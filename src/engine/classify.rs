//! Threshold classification of metering readings.
//!
//! Each reading is judged on its own: there is no smoothing or hysteresis
//! across ticks, so marginal input can toggle `is_blowing` from one tick to
//! the next.

use serde::{Deserialize, Serialize};

use crate::audio::Sample;
use crate::config::DetectorConfig;
use crate::error::DetectorError;

/// Blow thresholds in dBFS, validated at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    blow_threshold: f32,
    peak_threshold: f32,
}

impl Thresholds {
    /// # Errors
    /// `InvalidThresholdConfiguration` if `blow_threshold` is 0 (the
    /// intensity formula divides by it) or either threshold is not finite.
    pub fn new(blow_threshold: f32, peak_threshold: f32) -> Result<Self, DetectorError> {
        if blow_threshold == 0.0 || !blow_threshold.is_finite() || !peak_threshold.is_finite() {
            return Err(DetectorError::InvalidThresholdConfiguration {
                blow_threshold,
                peak_threshold,
            });
        }
        if blow_threshold > 0.0 {
            log::warn!(
                "[Thresholds] Positive blow threshold {} dB can never be exceeded by a dBFS meter",
                blow_threshold
            );
        }
        Ok(Self {
            blow_threshold,
            peak_threshold,
        })
    }

    pub fn from_config(config: &DetectorConfig) -> Result<Self, DetectorError> {
        Self::new(config.blow_threshold, config.peak_threshold)
    }

    pub fn blow_threshold(&self) -> f32 {
        self.blow_threshold
    }

    pub fn peak_threshold(&self) -> f32 {
        self.peak_threshold
    }

    /// Classify one reading.
    pub fn classify(&self, sample: &Sample) -> BlowSample {
        let is_blowing = sample.average_power > self.blow_threshold
            && sample.peak_power > self.peak_threshold;
        if !is_blowing {
            return BlowSample::IDLE;
        }

        let normalized = (sample.average_power - self.blow_threshold) / -self.blow_threshold;
        BlowSample {
            is_blowing: true,
            intensity: normalized.clamp(0.0, 1.0),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            blow_threshold: -20.0,
            peak_threshold: -10.0,
        }
    }
}

/// Event emitted to the listener on every sampling tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlowSample {
    pub is_blowing: bool,
    /// Normalized strength in [0, 1]; always 0 when not blowing
    pub intensity: f32,
}

impl BlowSample {
    pub const IDLE: BlowSample = BlowSample {
        is_blowing: false,
        intensity: 0.0,
    };
}

/// Published detector state, read by the presentation layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorState {
    pub is_active: bool,
    pub is_blowing: bool,
    pub intensity: f32,
}

impl DetectorState {
    pub(crate) fn record(&mut self, sample: BlowSample) {
        self.is_blowing = sample.is_blowing;
        self.intensity = sample.intensity;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds::new(-20.0, -10.0).unwrap()
    }

    #[test]
    fn test_quarter_intensity_scenario() {
        let blow = thresholds().classify(&Sample::new(-15.0, -5.0));
        assert!(blow.is_blowing);
        assert!((blow.intensity - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_average_below_threshold_despite_high_peak() {
        let blow = thresholds().classify(&Sample::new(-25.0, -5.0));
        assert_eq!(blow, BlowSample::IDLE);
    }

    #[test]
    fn test_peak_below_threshold() {
        let blow = thresholds().classify(&Sample::new(-5.0, -12.0));
        assert_eq!(blow, BlowSample::IDLE);
    }

    #[test]
    fn test_full_scale_clamps_to_one() {
        let blow = thresholds().classify(&Sample::new(0.0, 0.0));
        assert!(blow.is_blowing);
        assert_eq!(blow.intensity, 1.0);

        // Over-range readings still clamp
        let blow = thresholds().classify(&Sample::new(6.0, 6.0));
        assert_eq!(blow.intensity, 1.0);
    }

    #[test]
    fn test_boundaries_are_exclusive() {
        let t = thresholds();
        assert!(!t.classify(&Sample::new(-20.0, -5.0)).is_blowing);
        assert!(!t.classify(&Sample::new(-15.0, -10.0)).is_blowing);
    }

    #[test]
    fn test_not_blowing_always_zero_intensity() {
        let t = thresholds();
        let mut average = -160.0_f32;
        while average <= 0.0 {
            for peak in [-160.0_f32, -30.0, -10.0, -9.99, 0.0] {
                let blow = t.classify(&Sample::new(average, peak));
                if !blow.is_blowing {
                    assert_eq!(blow.intensity, 0.0);
                } else {
                    let expected = ((average + 20.0) / 20.0).clamp(0.0, 1.0);
                    assert!((blow.intensity - expected).abs() < 1e-6);
                }
            }
            average += 0.5;
        }
    }

    #[test]
    fn test_intensity_monotonic_in_average_power() {
        let t = thresholds();
        let mut previous = 0.0;
        let mut average = -19.9_f32;
        while average <= 0.0 {
            let blow = t.classify(&Sample::new(average, -1.0));
            assert!(blow.is_blowing);
            assert!(blow.intensity >= previous);
            previous = blow.intensity;
            average += 0.1;
        }
    }

    #[test]
    fn test_nan_reading_is_not_blowing() {
        let blow = thresholds().classify(&Sample::new(f32::NAN, 0.0));
        assert_eq!(blow, BlowSample::IDLE);
    }

    #[test]
    fn test_zero_blow_threshold_rejected() {
        match Thresholds::new(0.0, -10.0) {
            Err(DetectorError::InvalidThresholdConfiguration { blow_threshold, .. }) => {
                assert_eq!(blow_threshold, 0.0);
            }
            other => panic!("Expected InvalidThresholdConfiguration, got {:?}", other),
        }
        assert!(Thresholds::new(-0.0, -10.0).is_err());
        assert!(Thresholds::new(f32::NAN, -10.0).is_err());
        assert!(Thresholds::new(-20.0, f32::INFINITY).is_err());
    }

    #[test]
    fn test_state_records_and_resets() {
        let mut state = DetectorState {
            is_active: true,
            ..DetectorState::default()
        };
        state.record(BlowSample {
            is_blowing: true,
            intensity: 0.4,
        });
        assert!(state.is_blowing);
        assert_eq!(state.intensity, 0.4);

        state.record(BlowSample::IDLE);
        assert_eq!(state.intensity, 0.0);

        state.reset();
        assert_eq!(state, DetectorState::default());
    }
}
