// SessionController: Standby/Recording state machine for the meter
//
// Owns the sample source, the rolling statistics, the live venue placement,
// the calibration session, the persisted settings and the profile store.
// Driven from a single task: every method takes `&mut self` and the tick
// runs to completion before any other operation is observed.

use std::sync::Arc;

use serde::Serialize;

use crate::analysis::{analyze_frame, MeterStatistics, MetricsSnapshot, SILENCE_DB};
use crate::audio::SampleSource;
use crate::calibration::CalibrationSession;
use crate::config::MeterConfig;
use crate::error::{
    log_audio_error, log_profile_error, log_settings_error, AudioError, CalibrationError,
    ErrorCode, ProfileError, SettingsError,
};
use crate::settings::{ScaleMode, Settings, ViewMode};
use crate::storage::KeyValueStore;
use crate::venue::{
    estimate_spl_from_dbfs, predict_audience_level, ProfileStore, TargetZone, VenuePlacement,
    VenuePreset, VenueProfile,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Standby,
    Recording,
}

/// Consolidated per-tick output for the presentation layer
///
/// dB fields use `f32::NEG_INFINITY` for silence, which serializes as
/// `null` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterReading {
    pub timestamp_ms: u64,
    pub rms_db: f32,
    pub peak_db: f32,
    /// Sample peak; no oversampling is performed
    pub true_peak_db: f32,
    pub rms_db_left: f32,
    pub rms_db_right: f32,
    pub peak_db_left: f32,
    pub peak_db_right: f32,
    pub held_rms_db: f32,
    pub held_peak_db: f32,
    pub max_rms_db: f32,
    pub max_peak_db: f32,
    pub average_rms_db: f32,
    pub dynamic_range_db: f32,
    pub crest_factor_db: f32,
    pub clip_count: u64,
    pub correlation: f32,
    pub foh_offset_db: f32,
    pub audience_rms_db: f32,
    pub audience_peak_db: f32,
    pub audience_spl_db: f32,
    pub target_zone: TargetZone,
    pub in_target_zone: bool,
}

impl MeterReading {
    fn compose(
        snapshot: &MetricsSnapshot,
        stats: &MeterStatistics,
        settings: &Settings,
        timestamp_ms: u64,
    ) -> Self {
        let offset = settings.foh_offset_db;
        let audience_rms_db = predict_audience_level(snapshot.rms_db, offset);
        Self {
            timestamp_ms,
            rms_db: snapshot.rms_db,
            peak_db: snapshot.peak_db,
            true_peak_db: snapshot.true_peak_db,
            rms_db_left: snapshot.rms_db_left,
            rms_db_right: snapshot.rms_db_right,
            peak_db_left: snapshot.peak_db_left,
            peak_db_right: snapshot.peak_db_right,
            held_rms_db: stats.rms_hold.held_db(),
            held_peak_db: stats.peak_hold.held_db(),
            max_rms_db: stats.session.rms_max,
            max_peak_db: stats.session.peak_max,
            average_rms_db: stats.history.average(),
            dynamic_range_db: stats.history.dynamic_range(),
            crest_factor_db: stats.crest.value_db(),
            clip_count: stats.session.clipping_count,
            correlation: snapshot.correlation,
            foh_offset_db: offset,
            audience_rms_db,
            audience_peak_db: predict_audience_level(snapshot.peak_db, offset),
            audience_spl_db: estimate_spl_from_dbfs(audience_rms_db),
            target_zone: settings.target_zone,
            in_target_zone: settings.target_zone.contains(snapshot.rms_db, offset),
        }
    }
}

/// Orchestrates metering for one sample source
///
/// # Example
/// ```ignore
/// let mut controller = SessionController::new(source, store, &config.meter);
/// controller.start()?;
/// if let Some(reading) = controller.tick(now_ms)? {
///     println!("{}", format_db(reading.rms_db));
/// }
/// controller.stop();
/// ```
pub struct SessionController<S: SampleSource> {
    source: S,
    store: Arc<dyn KeyValueStore>,
    state: SessionState,
    stats: MeterStatistics,
    settings: Settings,
    profiles: ProfileStore,
    placement: VenuePlacement,
    calibration: CalibrationSession,
    last_reading: Option<MeterReading>,
}

impl<S: SampleSource> SessionController<S> {
    /// Create a controller in Standby, loading settings and profiles
    ///
    /// The live placement starts from the selected profile when one is
    /// stored, otherwise from the medium venue preset.
    pub fn new(source: S, store: Arc<dyn KeyValueStore>, config: &MeterConfig) -> Self {
        let mut settings = Settings::load(store.as_ref());
        let profiles = ProfileStore::open(Arc::clone(&store));

        let placement = match settings.selected_profile.and_then(|id| profiles.get(id)) {
            Some(profile) => profile.placement(),
            None => {
                settings.selected_profile = None;
                VenuePlacement::default()
            }
        };

        Self {
            source,
            store,
            state: SessionState::Standby,
            stats: MeterStatistics::new(config),
            settings,
            profiles,
            placement,
            calibration: CalibrationSession::new(),
            last_reading: None,
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Acquire the source and begin recording
    ///
    /// # Errors
    /// - `AudioError::AlreadyRunning` if already recording
    /// - Whatever the source reports when acquisition is refused; the
    ///   controller stays in Standby
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.state == SessionState::Recording {
            let err = AudioError::AlreadyRunning;
            log_audio_error(&err, "start");
            return Err(err);
        }

        self.source.acquire().inspect_err(|err| {
            log_audio_error(err, "start");
        })?;

        self.state = SessionState::Recording;
        tracing::info!("metering started");
        Ok(())
    }

    /// Release the source and return to Standby
    ///
    /// Safe to call repeatedly. Statistics are kept; an active calibration
    /// is cancelled.
    pub fn stop(&mut self) {
        self.calibration.cancel();
        if self.state == SessionState::Standby {
            return;
        }
        self.source.release();
        self.state = SessionState::Standby;
        tracing::info!("metering stopped");
    }

    /// Clear holds, history, crest factor and session maxima
    pub fn reset(&mut self) {
        self.stats.reset();
        tracing::info!("meter statistics reset");
    }

    /// Run one metering pass
    ///
    /// Returns `Ok(None)` in Standby. Source and empty-buffer errors are
    /// logged and returned; statistics are left as they were.
    pub fn tick(&mut self, now_ms: u64) -> Result<Option<MeterReading>, AudioError> {
        if self.state == SessionState::Standby {
            return Ok(None);
        }

        let frame = self.source.read_frame().inspect_err(|err| {
            log_audio_error(err, "tick");
        })?;
        let snapshot = analyze_frame(&frame).inspect_err(|err| {
            log_audio_error(err, "tick");
        })?;

        self.stats.update(&snapshot, now_ms);
        let reading = MeterReading::compose(&snapshot, &self.stats, &self.settings, now_ms);
        self.last_reading = Some(reading.clone());
        Ok(Some(reading))
    }

    // ========================================================================
    // CALIBRATION
    // ========================================================================

    /// Begin calibration at the most recent console RMS level
    pub fn start_calibration(&mut self) -> Result<(), CalibrationError> {
        let console_db = self.console_level_db();
        self.calibration.start(self.is_recording(), console_db)
    }

    /// Finish calibration, store and persist the measured offset
    ///
    /// A failed write returns `CalibrationError::Storage` and keeps the
    /// calibration active with the previous offset in place.
    pub fn complete_calibration(&mut self) -> Result<f32, CalibrationError> {
        let console_db = self.console_level_db();
        let measured = self.calibration.measure(console_db)?;
        self.update_settings("complete_calibration", |settings| {
            settings.foh_offset_db = measured;
        })
        .map_err(|err| CalibrationError::Storage {
            details: err.message(),
        })?;
        self.calibration.complete(console_db)
    }

    pub fn cancel_calibration(&mut self) -> bool {
        self.calibration.cancel()
    }

    // ========================================================================
    // SETTINGS AND PLACEMENT
    // ========================================================================
    //
    // Every setter persists before committing: on error the in-memory
    // settings and placement are unchanged.

    /// Set and persist the FOH offset
    ///
    /// # Errors
    /// - `SettingsError::InvalidOffset` for NaN or infinite values
    /// - `SettingsError::Storage` if the write fails
    pub fn set_foh_offset(&mut self, offset_db: f32) -> Result<(), SettingsError> {
        if !offset_db.is_finite() {
            let err = SettingsError::InvalidOffset { value: offset_db };
            log_settings_error(&err, "set_foh_offset");
            return Err(err);
        }
        self.update_settings("set_foh_offset", |settings| {
            settings.foh_offset_db = offset_db;
        })
    }

    pub fn set_target_zone(&mut self, zone: TargetZone) -> Result<(), SettingsError> {
        self.update_settings("set_target_zone", |settings| settings.target_zone = zone)
    }

    pub fn set_scale_mode(&mut self, mode: ScaleMode) -> Result<(), SettingsError> {
        self.update_settings("set_scale_mode", |settings| {
            settings.display.scale_mode = mode;
        })
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) -> Result<(), SettingsError> {
        self.update_settings("set_view_mode", |settings| {
            settings.display.view_mode = mode;
        })
    }

    /// Replace the live placement without touching the offset
    pub fn set_placement(&mut self, distance_m: f32, elevation_m: f32) -> Result<(), ProfileError> {
        let valid = |value: f32| value.is_finite() && value >= 0.0;
        if !valid(distance_m) || !valid(elevation_m) {
            let err = ProfileError::InvalidPlacement {
                reason: format!("distance {} m, elevation {} m", distance_m, elevation_m),
            };
            log_profile_error(&err, "set_placement");
            return Err(err);
        }
        self.placement = VenuePlacement::new(distance_m, elevation_m);
        Ok(())
    }

    /// Copy the offset estimated from the live placement into the settings
    pub fn apply_estimated_offset(&mut self) -> Result<f32, SettingsError> {
        let offset = self.placement.estimated_offset();
        self.update_settings("apply_estimated_offset", |settings| {
            settings.foh_offset_db = offset;
        })?;
        Ok(offset)
    }

    /// Apply a preset's placement and rounded offset
    ///
    /// No profile is created and any profile selection is cleared.
    pub fn apply_preset(&mut self, preset: VenuePreset) -> Result<(), SettingsError> {
        self.update_settings("apply_preset", |settings| {
            settings.foh_offset_db = preset.offset_db();
            settings.selected_profile = None;
        })?;
        self.placement = preset.placement();
        tracing::info!(?preset, offset_db = preset.offset_db(), "venue preset applied");
        Ok(())
    }

    // ========================================================================
    // PROFILES
    // ========================================================================

    pub fn create_profile(
        &mut self,
        name: &str,
        distance_m: f32,
        elevation_m: f32,
        offset_db: f32,
    ) -> Result<VenueProfile, ProfileError> {
        self.profiles.create(name, distance_m, elevation_m, offset_db)
    }

    /// Save the live placement and current offset under `name`
    pub fn save_current_as_profile(&mut self, name: &str) -> Result<VenueProfile, ProfileError> {
        let VenuePlacement {
            distance_m,
            elevation_m,
        } = self.placement;
        self.profiles
            .create(name, distance_m, elevation_m, self.settings.foh_offset_db)
    }

    /// Delete a profile, clearing the selection if it pointed at it
    ///
    /// A failure to persist the cleared selection is reported as
    /// `ProfileError::Storage`; the profile itself is already gone then.
    pub fn delete_profile(&mut self, id: u64) -> Result<bool, ProfileError> {
        let removed = self.profiles.delete(id)?;
        if removed && self.settings.selected_profile == Some(id) {
            self.update_settings("delete_profile", |settings| {
                settings.selected_profile = None;
            })
            .map_err(|err| ProfileError::Storage {
                details: err.message(),
            })?;
        }
        Ok(removed)
    }

    /// Apply a profile's placement and offset and mark it selected
    ///
    /// Returns `Ok(None)` (and changes nothing) when no profile has `id`.
    pub fn select_profile(&mut self, id: u64) -> Result<Option<VenueProfile>, SettingsError> {
        let Some(profile) = self.profiles.get(id).cloned() else {
            return Ok(None);
        };
        self.update_settings("select_profile", |settings| {
            settings.foh_offset_db = profile.offset_db;
            settings.selected_profile = Some(profile.id);
        })?;
        self.placement = profile.placement();
        tracing::info!(id = profile.id, name = %profile.name, "venue profile selected");
        Ok(Some(profile))
    }

    pub fn clear_selection(&mut self) -> Result<(), SettingsError> {
        if self.settings.selected_profile.is_none() {
            return Ok(());
        }
        self.update_settings("clear_selection", |settings| {
            settings.selected_profile = None;
        })
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn placement(&self) -> VenuePlacement {
        self.placement
    }

    pub fn statistics(&self) -> &MeterStatistics {
        &self.stats
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn calibration(&self) -> &CalibrationSession {
        &self.calibration
    }

    pub fn last_reading(&self) -> Option<&MeterReading> {
        self.last_reading.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    // ========================================================================
    // PRIVATE HELPER METHODS
    // ========================================================================

    fn console_level_db(&self) -> f32 {
        self.last_reading
            .as_ref()
            .map_or(SILENCE_DB, |reading| reading.rms_db)
    }

    /// Apply `change` to a copy of the settings, persist it, then commit
    fn update_settings(
        &mut self,
        context: &str,
        change: impl FnOnce(&mut Settings),
    ) -> Result<(), SettingsError> {
        let mut updated = self.settings.clone();
        change(&mut updated);
        if let Err(e) = updated.save(self.store.as_ref()) {
            let err = SettingsError::Storage {
                details: e.to_string(),
            };
            log_settings_error(&err, context);
            return Err(err);
        }
        self.settings = updated;
        Ok(())
    }
}

impl<S: SampleSource> Drop for SessionController<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
