// FOH Meter Core - loudness metering and front-of-house compensation
// Per-tick level metrics, rolling statistics and a venue model that predicts
// audience-position loudness from the console reading

// Module declarations
pub mod analysis;
pub mod audio;
pub mod calibration;
pub mod config;
pub mod error;
pub mod session;
pub mod settings;
pub mod storage;
pub mod venue;

// Re-exports for convenience
pub use config::AppConfig;
pub use error::{AudioError, CalibrationError, ErrorCode, ProfileError, SettingsError};
pub use session::{MeterDriver, MeterReading, SessionController, SessionState};
pub use settings::Settings;
