// Venue profile error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Venue profile error code constants
///
/// Error code range: 3001-3003
pub struct ProfileErrorCodes {}

impl ProfileErrorCodes {
    /// Profile name was empty or whitespace
    pub const EMPTY_NAME: i32 = 3001;

    /// Distance or elevation was negative or not finite
    pub const INVALID_PLACEMENT: i32 = 3002;

    /// Backing store rejected the write
    pub const STORAGE: i32 = 3003;
}

/// Log a profile error with structured context
pub fn log_profile_error(err: &ProfileError, context: &str) {
    error!(
        "Profile error in {}: code={}, component=ProfileStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Venue profile errors
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileError {
    /// Name missing
    EmptyName,

    /// Placement values out of range
    InvalidPlacement { reason: String },

    /// Persisting the collection failed
    Storage { details: String },
}

impl ErrorCode for ProfileError {
    fn code(&self) -> i32 {
        match self {
            ProfileError::EmptyName => ProfileErrorCodes::EMPTY_NAME,
            ProfileError::InvalidPlacement { .. } => ProfileErrorCodes::INVALID_PLACEMENT,
            ProfileError::Storage { .. } => ProfileErrorCodes::STORAGE,
        }
    }

    fn message(&self) -> String {
        match self {
            ProfileError::EmptyName => "Venue name must not be empty".to_string(),
            ProfileError::InvalidPlacement { reason } => {
                format!("Invalid venue placement: {}", reason)
            }
            ProfileError::Storage { details } => format!("Failed to store profiles: {}", details),
        }
    }
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProfileError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ProfileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_error_codes() {
        assert_eq!(ProfileError::EmptyName.code(), 3001);
        assert_eq!(
            ProfileError::InvalidPlacement {
                reason: "negative".to_string()
            }
            .code(),
            3002
        );
        assert_eq!(
            ProfileError::Storage {
                details: "disk full".to_string()
            }
            .code(),
            3003
        );
    }

    #[test]
    fn test_profile_error_messages() {
        let err = ProfileError::InvalidPlacement {
            reason: "distance -1 m".to_string(),
        };
        assert_eq!(err.message(), "Invalid venue placement: distance -1 m");
        assert!(ProfileError::EmptyName.message().contains("empty"));
    }
}
