// Blow detector error types and constants

use crate::error::{AudioError, ErrorCode};
use flutter_rust_bridge::frb;
use log::error;
use std::fmt;

/// Detector error code constants exposed to Dart via FFI
///
/// Error code range: 3001-3009
#[frb(unignore)]
pub struct DetectorErrorCodes {}

#[frb]
impl DetectorErrorCodes {
    /// Blow threshold is zero or a threshold is not finite
    pub const INVALID_THRESHOLD_CONFIGURATION: i32 = 3001;

    /// Microphone permission denied by the user
    pub const PERMISSION_DENIED: i32 = 3002;

    /// Audio session could not be configured
    pub const AUDIO_SESSION_CONFIGURATION_FAILURE: i32 = 3003;

    /// Activation was already requested on this detector
    pub const ALREADY_ACTIVATED: i32 = 3004;

    /// Detector was deactivated and cannot be restarted
    pub const ALREADY_STOPPED: i32 = 3005;

    /// A listener is already registered
    pub const LISTENER_ALREADY_REGISTERED: i32 = 3006;

    /// Sampling interval must be greater than zero
    pub const INVALID_SAMPLING_INTERVAL: i32 = 3007;

    /// Detector state lock was poisoned
    pub const STATE_POISONED: i32 = 3008;

    /// No reveal session is open
    pub const NO_ACTIVE_SESSION: i32 = 3009;

    /// Get INVALID_THRESHOLD_CONFIGURATION error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn invalid_threshold_configuration() -> i32 {
        Self::INVALID_THRESHOLD_CONFIGURATION
    }

    /// Get PERMISSION_DENIED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn permission_denied() -> i32 {
        Self::PERMISSION_DENIED
    }

    /// Get AUDIO_SESSION_CONFIGURATION_FAILURE error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn audio_session_configuration_failure() -> i32 {
        Self::AUDIO_SESSION_CONFIGURATION_FAILURE
    }

    /// Get ALREADY_ACTIVATED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn already_activated() -> i32 {
        Self::ALREADY_ACTIVATED
    }

    /// Get ALREADY_STOPPED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn already_stopped() -> i32 {
        Self::ALREADY_STOPPED
    }

    /// Get LISTENER_ALREADY_REGISTERED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn listener_already_registered() -> i32 {
        Self::LISTENER_ALREADY_REGISTERED
    }

    /// Get INVALID_SAMPLING_INTERVAL error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn invalid_sampling_interval() -> i32 {
        Self::INVALID_SAMPLING_INTERVAL
    }

    /// Get STATE_POISONED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn state_poisoned() -> i32 {
        Self::STATE_POISONED
    }

    /// Get NO_ACTIVE_SESSION error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn no_active_session() -> i32 {
        Self::NO_ACTIVE_SESSION
    }
}

/// Log a detector error with structured context
pub fn log_detector_error(err: &DetectorError, context: &str) {
    error!(
        "Detector error in {}: code={}, component=BlowIntensityDetector, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Blow detector errors
///
/// All of these are local to one detector instance; none of them is fatal
/// to the hosting process.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorError {
    /// Blow threshold is zero or a threshold is not finite
    InvalidThresholdConfiguration {
        blow_threshold: f32,
        peak_threshold: f32,
    },

    /// Microphone permission denied by the user
    PermissionDenied,

    /// Audio session could not be configured
    AudioSessionConfigurationFailure { reason: String },

    /// Activation was already requested on this detector
    AlreadyActivated,

    /// Detector was deactivated and cannot be restarted
    AlreadyStopped,

    /// A listener is already registered
    ListenerAlreadyRegistered,

    /// Sampling interval must be greater than zero
    InvalidSamplingInterval { interval_ms: u64 },

    /// Detector state lock was poisoned
    StatePoisoned,

    /// No reveal session is open
    NoActiveSession,
}

impl ErrorCode for DetectorError {
    fn code(&self) -> i32 {
        match self {
            DetectorError::InvalidThresholdConfiguration { .. } => {
                DetectorErrorCodes::INVALID_THRESHOLD_CONFIGURATION
            }
            DetectorError::PermissionDenied => DetectorErrorCodes::PERMISSION_DENIED,
            DetectorError::AudioSessionConfigurationFailure { .. } => {
                DetectorErrorCodes::AUDIO_SESSION_CONFIGURATION_FAILURE
            }
            DetectorError::AlreadyActivated => DetectorErrorCodes::ALREADY_ACTIVATED,
            DetectorError::AlreadyStopped => DetectorErrorCodes::ALREADY_STOPPED,
            DetectorError::ListenerAlreadyRegistered => {
                DetectorErrorCodes::LISTENER_ALREADY_REGISTERED
            }
            DetectorError::InvalidSamplingInterval { .. } => {
                DetectorErrorCodes::INVALID_SAMPLING_INTERVAL
            }
            DetectorError::StatePoisoned => DetectorErrorCodes::STATE_POISONED,
            DetectorError::NoActiveSession => DetectorErrorCodes::NO_ACTIVE_SESSION,
        }
    }

    fn message(&self) -> String {
        match self {
            DetectorError::InvalidThresholdConfiguration {
                blow_threshold,
                peak_threshold,
            } => format!(
                "Invalid thresholds (blow={}, peak={}): blow threshold must be non-zero and both must be finite",
                blow_threshold, peak_threshold
            ),
            DetectorError::PermissionDenied => {
                "Microphone permission denied. Please grant microphone access in settings."
                    .to_string()
            }
            DetectorError::AudioSessionConfigurationFailure { reason } => {
                format!("Audio session configuration failed: {}", reason)
            }
            DetectorError::AlreadyActivated => "Detector activation already requested".to_string(),
            DetectorError::AlreadyStopped => {
                "Detector already stopped; create a new detector for a new session".to_string()
            }
            DetectorError::ListenerAlreadyRegistered => {
                "A blow listener is already registered on this detector".to_string()
            }
            DetectorError::InvalidSamplingInterval { interval_ms } => {
                format!(
                    "Sampling interval must be greater than 0 ms (got {})",
                    interval_ms
                )
            }
            DetectorError::StatePoisoned => "Detector state lock poisoned".to_string(),
            DetectorError::NoActiveSession => {
                "No reveal session is open; call open_reveal_session first".to_string()
            }
        }
    }
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DetectorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DetectorError {}

impl From<AudioError> for DetectorError {
    fn from(err: AudioError) -> Self {
        DetectorError::AudioSessionConfigurationFailure {
            reason: err.message(),
        }
    }
}
