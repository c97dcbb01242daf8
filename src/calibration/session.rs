// CalibrationSession - empirical FOH offset measurement
//
// The engineer notes the console level while standing at the console
// (start), walks to the audience position and notes the level again
// (complete). The difference is the measured offset.
//
// States: Idle -> Calibrating { reference_level_db } -> Idle
// Every error is a precondition violation and leaves the state untouched.

use crate::error::{log_calibration_error, CalibrationError};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CalibrationPhase {
    #[default]
    Idle,
    Calibrating { reference_level_db: f32 },
}

#[derive(Debug, Clone, Default)]
pub struct CalibrationSession {
    phase: CalibrationPhase,
}

impl CalibrationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the console reading as the reference level
    ///
    /// # Errors
    /// - `NotRecording` when the meter is in standby
    /// - `AlreadyInProgress` when a calibration is already running
    /// - `SilentReference` when `console_db` is the silence sentinel
    pub fn start(&mut self, is_recording: bool, console_db: f32) -> Result<(), CalibrationError> {
        let result = if !is_recording {
            Err(CalibrationError::NotRecording)
        } else if self.is_active() {
            Err(CalibrationError::AlreadyInProgress)
        } else if !console_db.is_finite() {
            Err(CalibrationError::SilentReference)
        } else {
            Ok(())
        };
        if let Err(err) = &result {
            log_calibration_error(err, "start_calibration");
            return result;
        }

        self.phase = CalibrationPhase::Calibrating {
            reference_level_db: console_db,
        };
        tracing::info!(reference_db = console_db, "calibration started");
        Ok(())
    }

    /// Offset the session would measure at `console_db`, without finishing
    ///
    /// # Errors
    /// - `NotInProgress` from Idle
    /// - `SilentReference` when `console_db` is the silence sentinel
    pub fn measure(&self, console_db: f32) -> Result<f32, CalibrationError> {
        let CalibrationPhase::Calibrating { reference_level_db } = self.phase else {
            let err = CalibrationError::NotInProgress;
            log_calibration_error(&err, "complete_calibration");
            return Err(err);
        };
        if !console_db.is_finite() {
            let err = CalibrationError::SilentReference;
            log_calibration_error(&err, "complete_calibration");
            return Err(err);
        }
        Ok(console_db - reference_level_db)
    }

    /// Finish and return `console_db - reference_level_db`
    pub fn complete(&mut self, console_db: f32) -> Result<f32, CalibrationError> {
        let measured = self.measure(console_db)?;
        self.phase = CalibrationPhase::Idle;
        tracing::info!(measured_offset_db = measured, "calibration complete");
        Ok(measured)
    }

    /// Discard an active calibration; returns whether one was active
    pub fn cancel(&mut self) -> bool {
        let was_active = self.is_active();
        if was_active {
            tracing::info!("calibration cancelled");
        }
        self.phase = CalibrationPhase::Idle;
        was_active
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, CalibrationPhase::Calibrating { .. })
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn reference_level_db(&self) -> Option<f32> {
        match self.phase {
            CalibrationPhase::Calibrating { reference_level_db } => Some(reference_level_db),
            CalibrationPhase::Idle => None,
        }
    }
}
