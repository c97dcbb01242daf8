// Calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001-2005
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Calibration can only start while the session is recording
    pub const NOT_RECORDING: i32 = 2001;

    /// Calibration completion requested without an active calibration
    pub const NOT_IN_PROGRESS: i32 = 2002;

    /// Calibration already in progress
    pub const ALREADY_IN_PROGRESS: i32 = 2003;

    /// Console level was silent, nothing to measure against
    pub const SILENT_REFERENCE: i32 = 2004;

    /// Measured offset could not be persisted
    pub const STORAGE: i32 = 2005;
}

/// Log a calibration error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=CalibrationSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// The session state is left untouched when one is returned: a failed
/// `Storage` write keeps the calibration active so it can be completed
/// again.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Session controller is in standby
    NotRecording,

    /// complete() called from Idle
    NotInProgress,

    /// start() called while already calibrating
    AlreadyInProgress,

    /// Console reading was the silence sentinel
    SilentReference,

    /// Writing the measured offset failed
    Storage { details: String },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::NotRecording => CalibrationErrorCodes::NOT_RECORDING,
            CalibrationError::NotInProgress => CalibrationErrorCodes::NOT_IN_PROGRESS,
            CalibrationError::AlreadyInProgress => CalibrationErrorCodes::ALREADY_IN_PROGRESS,
            CalibrationError::SilentReference => CalibrationErrorCodes::SILENT_REFERENCE,
            CalibrationError::Storage { .. } => CalibrationErrorCodes::STORAGE,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::NotRecording => {
                "Start metering before calibrating".to_string()
            }
            CalibrationError::NotInProgress => "No calibration in progress".to_string(),
            CalibrationError::AlreadyInProgress => "Calibration already in progress".to_string(),
            CalibrationError::SilentReference => {
                "Console level is silent; play reference material first".to_string()
            }
            CalibrationError::Storage { details } => {
                format!("Failed to store measured offset: {}", details)
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_error_codes() {
        assert_eq!(
            CalibrationError::NotRecording.code(),
            CalibrationErrorCodes::NOT_RECORDING
        );
        assert_eq!(
            CalibrationError::NotInProgress.code(),
            CalibrationErrorCodes::NOT_IN_PROGRESS
        );
        assert_eq!(
            CalibrationError::AlreadyInProgress.code(),
            CalibrationErrorCodes::ALREADY_IN_PROGRESS
        );
        assert_eq!(
            CalibrationError::SilentReference.code(),
            CalibrationErrorCodes::SILENT_REFERENCE
        );
        assert_eq!(
            CalibrationError::Storage {
                details: "read-only".to_string()
            }
            .code(),
            CalibrationErrorCodes::STORAGE
        );
    }

    #[test]
    fn test_calibration_error_messages() {
        assert!(CalibrationError::NotRecording.message().contains("metering"));
        assert!(CalibrationError::NotInProgress.message().contains("No calibration"));
        assert!(CalibrationError::AlreadyInProgress
            .message()
            .contains("already in progress"));
    }

    #[test]
    fn test_calibration_error_display() {
        let err = CalibrationError::NotInProgress;
        let display = format!("{}", err);
        assert!(display.contains("CalibrationError"));
        assert!(display.contains(&err.code().to_string()));
    }
}
