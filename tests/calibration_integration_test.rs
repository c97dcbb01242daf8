//! Integration tests for the calibration workflow
//!
//! These validate calibration through the session controller:
//! - Reference taken at the console, completion at the audience position
//! - Precondition errors leave settings and state untouched
//! - Stopping the meter cancels an active calibration
//! - The measured offset is persisted

use std::sync::Arc;

use foh_meter::audio::ScriptedSource;
use foh_meter::calibration::CalibrationSession;
use foh_meter::config::MeterConfig;
use foh_meter::error::CalibrationError;
use foh_meter::session::SessionController;
use foh_meter::storage::{KeyValueStore, MemoryStore, KEY_FOH_OFFSET};

fn amp(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

fn controller(
    levels: &[f32],
    store: Arc<dyn KeyValueStore>,
) -> SessionController<ScriptedSource> {
    SessionController::new(
        ScriptedSource::from_levels(levels, 256),
        store,
        &MeterConfig::default(),
    )
}

#[test]
fn test_session_measures_five_db() {
    let mut session = CalibrationSession::new();
    session.start(true, -20.0).unwrap();
    assert_eq!(session.complete(-15.0), Ok(5.0));
}

#[test]
fn test_full_calibration_workflow() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let mut controller = controller(&[amp(-20.0), amp(-15.0)], Arc::clone(&store));

    controller.start().unwrap();
    controller.tick(0).unwrap();
    controller.start_calibration().unwrap();
    assert!(controller.calibration().is_active());

    // Second start is rejected and keeps the first reference
    assert_eq!(
        controller.start_calibration(),
        Err(CalibrationError::AlreadyInProgress)
    );

    controller.tick(5_000).unwrap();
    let measured = controller.complete_calibration().unwrap();
    assert!((measured - 5.0).abs() < 1e-3, "measured {}", measured);
    assert!(!controller.calibration().is_active());
    assert_eq!(controller.settings().foh_offset_db, measured);

    let persisted: f32 = serde_json::from_str(&store.get(KEY_FOH_OFFSET).unwrap()).unwrap();
    assert_eq!(persisted, measured);
}

#[test]
fn test_complete_without_start_changes_nothing() {
    let mut controller = controller(&[amp(-15.0)], Arc::new(MemoryStore::new()));
    controller.set_foh_offset(3.0).unwrap();
    controller.start().unwrap();
    controller.tick(0).unwrap();

    assert_eq!(
        controller.complete_calibration(),
        Err(CalibrationError::NotInProgress)
    );
    assert_eq!(controller.settings().foh_offset_db, 3.0);
    assert!(!controller.calibration().is_active());
}

#[test]
fn test_calibration_requires_recording() {
    let mut controller = controller(&[amp(-20.0)], Arc::new(MemoryStore::new()));
    assert_eq!(
        controller.start_calibration(),
        Err(CalibrationError::NotRecording)
    );
}

#[test]
fn test_silent_console_rejected() {
    let mut controller = controller(&[0.0], Arc::new(MemoryStore::new()));
    controller.start().unwrap();

    // No reading yet
    assert_eq!(
        controller.start_calibration(),
        Err(CalibrationError::SilentReference)
    );

    controller.tick(0).unwrap();
    assert_eq!(
        controller.start_calibration(),
        Err(CalibrationError::SilentReference)
    );
    assert!(!controller.calibration().is_active());
}

#[test]
fn test_stop_cancels_calibration() {
    let mut controller = controller(&[amp(-20.0), amp(-15.0)], Arc::new(MemoryStore::new()));
    controller.start().unwrap();
    controller.tick(0).unwrap();
    controller.start_calibration().unwrap();

    controller.stop();
    assert!(!controller.calibration().is_active());

    controller.start().unwrap();
    controller.tick(16).unwrap();
    assert_eq!(
        controller.complete_calibration(),
        Err(CalibrationError::NotInProgress)
    );
    assert_eq!(controller.settings().foh_offset_db, 0.0);
}

#[test]
fn test_cancel_discards_reference() {
    let mut controller = controller(&[amp(-20.0)], Arc::new(MemoryStore::new()));
    controller.start().unwrap();
    controller.tick(0).unwrap();
    controller.start_calibration().unwrap();

    assert!(controller.cancel_calibration());
    assert!(!controller.cancel_calibration());
    assert_eq!(
        controller.complete_calibration(),
        Err(CalibrationError::NotInProgress)
    );
}
