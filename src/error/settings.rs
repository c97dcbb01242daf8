// Settings error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Settings error code constants
///
/// Error code range: 4001-4002
pub struct SettingsErrorCodes {}

impl SettingsErrorCodes {
    /// FOH offset was NaN or infinite
    pub const INVALID_OFFSET: i32 = 4001;

    /// Backing store rejected the write
    pub const STORAGE: i32 = 4002;
}

/// Log a settings error with structured context
pub fn log_settings_error(err: &SettingsError, context: &str) {
    error!(
        "Settings error in {}: code={}, component=SessionController, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Settings errors
///
/// The in-memory settings are only replaced once the new values have been
/// written, so any of these leaves them as they were.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsError {
    /// Offset not a finite number
    InvalidOffset { value: f32 },

    /// Persisting the settings failed
    Storage { details: String },
}

impl ErrorCode for SettingsError {
    fn code(&self) -> i32 {
        match self {
            SettingsError::InvalidOffset { .. } => SettingsErrorCodes::INVALID_OFFSET,
            SettingsError::Storage { .. } => SettingsErrorCodes::STORAGE,
        }
    }

    fn message(&self) -> String {
        match self {
            SettingsError::InvalidOffset { value } => {
                format!("FOH offset must be a finite number, got {}", value)
            }
            SettingsError::Storage { details } => format!("Failed to store settings: {}", details),
        }
    }
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SettingsError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SettingsError {}
