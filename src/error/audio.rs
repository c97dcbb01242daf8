// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// These constants provide a single source of truth for error codes
/// shared with whatever host embeds the meter.
///
/// Error code range: 1001-1007
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Session is already recording
    pub const ALREADY_RUNNING: i32 = 1001;

    /// Session is not recording
    pub const NOT_RUNNING: i32 = 1002;

    /// Input device access was refused
    pub const PERMISSION_DENIED: i32 = 1003;

    /// Failed to open the input stream
    pub const STREAM_OPEN_FAILED: i32 = 1004;

    /// Hardware error occurred
    pub const HARDWARE_ERROR: i32 = 1005;

    /// A metric was requested over an empty sample buffer
    pub const EMPTY_BUFFER: i32 = 1006;

    /// The sample source has no more data to deliver
    pub const SOURCE_EXHAUSTED: i32 = 1007;
}

/// Log an audio error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=SessionController, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These cover sample source acquisition, stream management and the
/// precondition that metric functions never see an empty buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Session is already recording
    AlreadyRunning,

    /// Session is not recording
    NotRunning,

    /// Microphone permission denied
    PermissionDenied,

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Hardware error occurred
    HardwareError { details: String },

    /// Sample buffer was empty
    EmptyBuffer,

    /// Finite source (file, script) ran out of frames
    SourceExhausted,
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::AlreadyRunning => AudioErrorCodes::ALREADY_RUNNING,
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
            AudioError::PermissionDenied => AudioErrorCodes::PERMISSION_DENIED,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::EmptyBuffer => AudioErrorCodes::EMPTY_BUFFER,
            AudioError::SourceExhausted => AudioErrorCodes::SOURCE_EXHAUSTED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::AlreadyRunning => {
                "Metering already running. Call stop() first.".to_string()
            }
            AudioError::NotRunning => "Metering not running. Call start() first.".to_string(),
            AudioError::PermissionDenied => "Microphone permission denied".to_string(),
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::HardwareError { details } => format!("Hardware error: {}", details),
            AudioError::EmptyBuffer => "Sample buffer is empty".to_string(),
            AudioError::SourceExhausted => "Sample source has no more frames".to_string(),
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
