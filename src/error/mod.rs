// Error types for the FOH meter core
//
// Each domain (audio capture, calibration, venue profiles, settings) has its own error
// enum carrying a stable numeric code, so hosts can branch on failures
// without parsing messages. None of these errors is fatal: every one is
// recoverable by retrying the action that triggered it.

mod audio;
mod calibration;
mod profile;
mod settings;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use profile::{log_profile_error, ProfileError, ProfileErrorCodes};
pub use settings::{log_settings_error, SettingsError, SettingsErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the host boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_trait_objects() {
        let errors: Vec<Box<dyn ErrorCode>> = vec![
            Box::new(AudioError::EmptyBuffer),
            Box::new(CalibrationError::NotInProgress),
            Box::new(ProfileError::EmptyName),
            Box::new(SettingsError::InvalidOffset { value: f32::NAN }),
        ];
        let codes: Vec<i32> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes, vec![1006, 2002, 3001, 4001]);
    }

    #[test]
    fn test_error_code_ranges_do_not_overlap() {
        assert!(AudioErrorCodes::SOURCE_EXHAUSTED < CalibrationErrorCodes::NOT_RECORDING);
        assert!(CalibrationErrorCodes::STORAGE < ProfileErrorCodes::EMPTY_NAME);
        assert!(ProfileErrorCodes::STORAGE < SettingsErrorCodes::INVALID_OFFSET);
    }
}
