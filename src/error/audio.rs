// Audio input error types and constants

use crate::error::ErrorCode;
use flutter_rust_bridge::frb;
use log::error;
use std::fmt;

/// Audio error code constants exposed to Dart via FFI
///
/// These constants provide a single source of truth for error codes
/// shared between Rust and Dart.
///
/// Error code range: 1001-1008. 1004 is retired and never reused.
#[frb(unignore)]
pub struct AudioErrorCodes {}

#[frb]
impl AudioErrorCodes {
    /// No input device is available
    pub const NO_INPUT_DEVICE: i32 = 1001;

    /// Hardware error occurred
    pub const HARDWARE_ERROR: i32 = 1002;

    /// Failed to open audio input stream
    pub const STREAM_OPEN_FAILED: i32 = 1003;

    /// Android context was not initialized before the stream was opened
    pub const CONTEXT_NOT_INITIALIZED: i32 = 1005;

    /// Audio stream disconnected or channel closed unexpectedly
    pub const STREAM_FAILURE: i32 = 1006;

    /// WAV fixture could not be read
    pub const FIXTURE_LOAD: i32 = 1007;

    /// Session settings rejected before opening the stream
    pub const UNSUPPORTED_SESSION: i32 = 1008;

    /// Get NO_INPUT_DEVICE error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn no_input_device() -> i32 {
        Self::NO_INPUT_DEVICE
    }

    /// Get HARDWARE_ERROR error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn hardware_error() -> i32 {
        Self::HARDWARE_ERROR
    }

    /// Get STREAM_OPEN_FAILED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn stream_open_failed() -> i32 {
        Self::STREAM_OPEN_FAILED
    }

    /// Get CONTEXT_NOT_INITIALIZED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn context_not_initialized() -> i32 {
        Self::CONTEXT_NOT_INITIALIZED
    }

    /// Get STREAM_FAILURE error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn stream_failure() -> i32 {
        Self::STREAM_FAILURE
    }

    /// Get FIXTURE_LOAD error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn fixture_load() -> i32 {
        Self::FIXTURE_LOAD
    }

    /// Get UNSUPPORTED_SESSION error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn unsupported_session() -> i32 {
        Self::UNSUPPORTED_SESSION
    }
}

/// Log an audio error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioInput, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio input errors
///
/// These errors cover opening, reading and closing the measurement-only
/// input stream behind the blow detector.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// No default input device found
    NoInputDevice,

    /// Hardware error occurred
    HardwareError { details: String },

    /// Failed to open audio input stream
    StreamOpenFailed { reason: String },

    /// Android context was not initialized before the stream was opened
    ContextNotInitialized,

    /// Stream channel disconnected unexpectedly
    StreamFailure { reason: String },

    /// WAV fixture could not be read
    FixtureLoad { path: String, reason: String },

    /// Session settings rejected before opening the stream
    UnsupportedSession { reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::NoInputDevice => AudioErrorCodes::NO_INPUT_DEVICE,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::ContextNotInitialized => AudioErrorCodes::CONTEXT_NOT_INITIALIZED,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
            AudioError::FixtureLoad { .. } => AudioErrorCodes::FIXTURE_LOAD,
            AudioError::UnsupportedSession { .. } => AudioErrorCodes::UNSUPPORTED_SESSION,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::NoInputDevice => "No default input device found".to_string(),
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio input: {}", reason)
            }
            AudioError::ContextNotInitialized => {
                "Android context not initialized before opening the microphone".to_string()
            }
            AudioError::StreamFailure { reason } => {
                format!("Audio stream failed: {}", reason)
            }
            AudioError::FixtureLoad { path, reason } => {
                format!("Failed to load fixture {}: {}", path, reason)
            }
            AudioError::UnsupportedSession { reason } => {
                format!("Unsupported audio session: {}", reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::NoInputDevice.code(),
            AudioErrorCodes::NO_INPUT_DEVICE
        );
        assert_eq!(
            AudioError::StreamOpenFailed {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::STREAM_OPEN_FAILED
        );
        assert_eq!(
            AudioError::ContextNotInitialized.code(),
            AudioErrorCodes::CONTEXT_NOT_INITIALIZED
        );
        assert_eq!(
            AudioError::FixtureLoad {
                path: "a.wav".to_string(),
                reason: "missing".to_string()
            }
            .code(),
            1007
        );
    }

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::HardwareError {
            details: "test error".to_string(),
        };
        assert_eq!(err.message(), "Hardware error: test error");

        let err = AudioError::FixtureLoad {
            path: "blow.wav".to_string(),
            reason: "not found".to_string(),
        };
        assert!(err.message().contains("blow.wav"));
        assert!(err.message().contains("not found"));
    }

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::NoInputDevice;
        let display = format!("{}", err);
        assert!(display.contains("AudioError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("test io error");
        let audio_err: AudioError = io_err.into();
        match audio_err {
            AudioError::HardwareError { details } => {
                assert!(details.contains("test io error"));
            }
            _ => panic!("Expected HardwareError"),
        }
    }

    #[test]
    fn test_error_code_getters() {
        assert_eq!(AudioErrorCodes::no_input_device(), 1001);
        assert_eq!(AudioErrorCodes::hardware_error(), 1002);
        assert_eq!(AudioErrorCodes::stream_open_failed(), 1003);
        assert_eq!(AudioErrorCodes::context_not_initialized(), 1005);
        assert_eq!(AudioErrorCodes::stream_failure(), 1006);
        assert_eq!(AudioErrorCodes::fixture_load(), 1007);
        assert_eq!(AudioErrorCodes::unsupported_session(), 1008);
    }
}
