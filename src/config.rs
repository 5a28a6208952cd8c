//! Configuration management for dynamic parameter tuning
//!
//! This module provides runtime configuration loading from JSON files so the
//! blow thresholds and reveal pacing can be tuned against real microphones
//! without recompiling.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub session: AudioSessionConfig,
    #[serde(default)]
    pub reveal: RevealConfig,
}

/// Blow detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Average power (dBFS) a reading must exceed to count as blowing
    pub blow_threshold: f32,
    /// Peak power (dBFS) a reading must exceed to count as blowing
    pub peak_threshold: f32,
    /// Sampling period in milliseconds
    pub sample_interval_ms: u64,
    /// Capacity of the listener channel
    pub listener_capacity: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            blow_threshold: -20.0,
            peak_threshold: -10.0,
            sample_interval_ms: 50,
            // ~3 seconds of ticks at 50 ms
            listener_capacity: 64,
        }
    }
}

/// Session mode requested from the platform audio stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Metering only: no processing, nothing recorded
    Measurement,
}

/// Audio session configuration, injected into each detector at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSessionConfig {
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Channel count; metering is always mono
    pub channels: u16,
    pub mode: SessionMode,
    /// Capacity of the callback -> sampler ring in samples
    pub ring_capacity: usize,
}

impl Default for AudioSessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            mode: SessionMode::Measurement,
            ring_capacity: crate::audio::DEFAULT_RING_CAPACITY,
        }
    }
}

/// Reveal pacing for the blur-clearing consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Blur radius when the portrait first appears
    pub initial_blur_radius: f32,
    /// Blur removed per unit of blow intensity on each sample
    pub blur_per_intensity: f32,
    /// Blur removed by a tap on the portrait
    pub tap_reduction: f32,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            initial_blur_radius: 40.0,
            blur_per_intensity: 1.5,
            tap_reduction: 10.0,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Falls back to defaults if the file is missing or the JSON is invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration on Android
    ///
    /// Assets live inside the APK and are not reachable through the
    /// filesystem, so Android runs with defaults.
    #[cfg(target_os = "android")]
    pub fn load() -> Self {
        log::info!("[Config] Using default configuration on Android");
        Self::default()
    }

    /// Load configuration for non-Android platforms
    #[cfg(not(target_os = "android"))]
    pub fn load() -> Self {
        Self::load_from_file("assets/blow_config.json")
    }
}
