// Calibration module - empirical measurement of the FOH offset
//
// The session controller owns one CalibrationSession and writes the
// measured offset into the persisted settings on completion.

pub mod session;

pub use session::{CalibrationPhase, CalibrationSession};
