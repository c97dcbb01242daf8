// Rolling module - statistics that persist across ticks
//
// Peak hold with delayed release, a bounded RMS history for average and
// dynamic range, crest factor and session maxima with clip counting. All
// state is plain owned data mutated in place once per tick.

use std::collections::VecDeque;

use crate::analysis::levels::{MetricsSnapshot, SILENCE_DB};
use crate::config::{DecayMode, MeterConfig};

/// Held dB value that snaps up instantly and releases after a plateau
///
/// Invariant: after every `update`, `held_db() >= current_db`.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakHoldState {
    held_db: f32,
    last_rise_ms: u64,
    last_update_ms: Option<u64>,
    hold_time_ms: u64,
    decay_db: f32,
    decay_mode: DecayMode,
    nominal_tick_hz: u32,
}

impl PeakHoldState {
    pub fn new(config: &MeterConfig) -> Self {
        Self {
            held_db: SILENCE_DB,
            last_rise_ms: 0,
            last_update_ms: None,
            hold_time_ms: config.hold_time_ms,
            decay_db: config.hold_decay_db,
            decay_mode: config.decay_mode,
            nominal_tick_hz: config.nominal_tick_hz,
        }
    }

    /// Feed the current reading and return the held value
    ///
    /// A reading above the held value is caught immediately. Otherwise, once
    /// `hold_time_ms` has passed since the last rise, the held value drops by
    /// one release step but never below the current reading.
    pub fn update(&mut self, current_db: f32, now_ms: u64) -> f32 {
        if current_db > self.held_db {
            self.held_db = current_db;
            self.last_rise_ms = now_ms;
        } else if now_ms.saturating_sub(self.last_rise_ms) > self.hold_time_ms {
            let step = self.release_step(now_ms);
            self.held_db = (self.held_db - step).max(current_db);
        }
        self.last_update_ms = Some(now_ms);
        self.held_db
    }

    fn release_step(&self, now_ms: u64) -> f32 {
        match self.decay_mode {
            DecayMode::PerTick => self.decay_db,
            DecayMode::PerSecond => {
                let elapsed_ms = self
                    .last_update_ms
                    .map_or(0, |last| now_ms.saturating_sub(last));
                self.decay_db * self.nominal_tick_hz as f32 * elapsed_ms as f32 / 1000.0
            }
        }
    }

    pub fn held_db(&self) -> f32 {
        self.held_db
    }

    pub fn last_rise_ms(&self) -> u64 {
        self.last_rise_ms
    }

    /// Return to the silence sentinel
    pub fn reset(&mut self) {
        self.held_db = SILENCE_DB;
        self.last_rise_ms = 0;
        self.last_update_ms = None;
    }
}

/// Bounded FIFO of recent RMS dB readings
///
/// Silence sentinels occupy slots but are skipped by every statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingHistory {
    values: VecDeque<f32>,
    capacity: usize,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest beyond capacity
    pub fn push(&mut self, rms_db: f32) {
        self.values.push_back(rms_db);
        if self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    fn valid(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().copied().filter(|v| v.is_finite())
    }

    pub fn min(&self) -> Option<f32> {
        self.valid().reduce(f32::min)
    }

    pub fn max(&self) -> Option<f32> {
        self.valid().reduce(f32::max)
    }

    /// Spread between loudest and quietest valid reading, 0 when empty
    pub fn dynamic_range(&self) -> f32 {
        match (self.min(), self.max()) {
            (Some(min), Some(max)) => max - min,
            _ => 0.0,
        }
    }

    /// Mean of valid readings in the dB domain, sentinel when empty
    pub fn average(&self) -> f32 {
        let (sum, count) = self
            .valid()
            .fold((0.0f64, 0usize), |(sum, count), v| (sum + v as f64, count + 1));
        if count == 0 {
            SILENCE_DB
        } else {
            (sum / count as f64) as f32
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Peak-to-RMS ratio in dB that holds its last value through silence
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CrestFactor {
    value_db: f32,
}

impl CrestFactor {
    /// Update from linear amplitudes; ignored unless both are positive
    pub fn update(&mut self, peak_amplitude: f32, rms_amplitude: f32) -> f32 {
        if peak_amplitude > 0.0 && rms_amplitude > 0.0 {
            self.value_db = 20.0 * (peak_amplitude / rms_amplitude).log10();
        }
        self.value_db
    }

    pub fn value_db(&self) -> f32 {
        self.value_db
    }

    pub fn reset(&mut self) {
        self.value_db = 0.0;
    }
}

/// Session maxima and clip counter
///
/// Only `reset()` clears these; stopping and restarting a session does not.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    pub rms_max: f32,
    pub peak_max: f32,
    pub clipping_count: u64,
    clip_threshold_db: f32,
}

impl SessionStats {
    pub fn new(clip_threshold_db: f32) -> Self {
        Self {
            rms_max: SILENCE_DB,
            peak_max: SILENCE_DB,
            clipping_count: 0,
            clip_threshold_db,
        }
    }

    pub fn update_max(&mut self, rms_db: f32, peak_db: f32) {
        self.rms_max = self.rms_max.max(rms_db);
        self.peak_max = self.peak_max.max(peak_db);
    }

    /// Count one over-threshold event; returns whether it counted
    ///
    /// This is a per-tick event counter, not a sample-accurate clip detector.
    pub fn record_clip(&mut self, peak_db: f32) -> bool {
        if peak_db > self.clip_threshold_db {
            self.clipping_count += 1;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.rms_max = SILENCE_DB;
        self.peak_max = SILENCE_DB;
        self.clipping_count = 0;
    }
}

/// Everything the tick updates from a `MetricsSnapshot`
#[derive(Debug, Clone)]
pub struct MeterStatistics {
    pub rms_hold: PeakHoldState,
    pub peak_hold: PeakHoldState,
    pub history: RollingHistory,
    pub crest: CrestFactor,
    pub session: SessionStats,
}

impl MeterStatistics {
    pub fn new(config: &MeterConfig) -> Self {
        Self {
            rms_hold: PeakHoldState::new(config),
            peak_hold: PeakHoldState::new(config),
            history: RollingHistory::new(config.history_len),
            crest: CrestFactor::default(),
            session: SessionStats::new(config.clip_threshold_db),
        }
    }

    pub fn update(&mut self, snapshot: &MetricsSnapshot, now_ms: u64) {
        self.rms_hold.update(snapshot.rms_db, now_ms);
        self.peak_hold.update(snapshot.peak_db, now_ms);
        self.history.push(snapshot.rms_db);
        self.crest.update(snapshot.peak, snapshot.rms);
        self.session.update_max(snapshot.rms_db, snapshot.peak_db);
        self.session.record_clip(snapshot.peak_db);
    }

    pub fn reset(&mut self) {
        self.rms_hold.reset();
        self.peak_hold.reset();
        self.history.clear();
        self.crest.reset();
        self.session.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hold() -> PeakHoldState {
        PeakHoldState::new(&MeterConfig::default())
    }

    #[test]
    fn test_hold_catches_new_peak() {
        let mut state = hold();
        assert_eq!(state.update(-20.0, 100), -20.0);
        assert_eq!(state.last_rise_ms(), 100);
        assert_eq!(state.update(-10.0, 200), -10.0);
        assert_eq!(state.last_rise_ms(), 200);
    }

    #[test]
    fn test_hold_plateau_before_release() {
        let mut state = hold();
        state.update(-10.0, 0);
        assert_eq!(state.update(-30.0, 1000), -10.0);
        assert_eq!(state.update(-30.0, 2000), -10.0);
        assert_eq!(state.update(-30.0, 2001), -10.5);
        assert_eq!(state.update(-30.0, 2017), -11.0);
    }

    #[test]
    fn test_hold_release_floors_at_current() {
        let mut state = hold();
        state.update(-10.0, 0);
        assert_eq!(state.update(-10.2, 5000), -10.2);
    }

    #[test]
    fn test_hold_never_below_current() {
        let mut state = hold();
        let script = [
            (-40.0, 0),
            (-5.0, 16),
            (-60.0, 2100),
            (-4.0, 2200),
            (-4.1, 4300),
            (f32::NEG_INFINITY, 4400),
            (-12.0, 9000),
            (-11.9, 9016),
            (-80.0, 20000),
        ];
        for (current, now) in script {
            let held = state.update(current, now);
            assert!(held >= current, "held {} < current {} at {}", held, current, now);
        }
    }

    #[test]
    fn test_hold_per_second_decay_scales_with_elapsed_time() {
        let config = MeterConfig {
            decay_mode: DecayMode::PerSecond,
            ..MeterConfig::default()
        };
        let mut state = PeakHoldState::new(&config);
        state.update(-10.0, 0);
        state.update(-50.0, 2000);
        // 100 ms at 0.5 dB per nominal 60 Hz tick = 3 dB
        let held = state.update(-50.0, 2100);
        assert!((held - (-13.0)).abs() < 1e-4, "got {}", held);
    }

    #[test]
    fn test_hold_reset() {
        let mut state = hold();
        state.update(-3.0, 10);
        state.reset();
        assert_eq!(state.held_db(), f32::NEG_INFINITY);
        assert_eq!(state.last_rise_ms(), 0);
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut history = RollingHistory::new(100);
        for i in 0..101 {
            history.push(-(i as f32));
        }
        assert_eq!(history.len(), 100);
        // 0.0 was evicted, remaining span -1 ..= -100
        assert_eq!(history.max(), Some(-1.0));
        assert_eq!(history.min(), Some(-100.0));
        assert_eq!(history.dynamic_range(), 99.0);
    }

    #[test]
    fn test_history_skips_sentinels() {
        let mut history = RollingHistory::new(100);
        history.push(f32::NEG_INFINITY);
        assert_eq!(history.dynamic_range(), 0.0);
        assert_eq!(history.average(), f32::NEG_INFINITY);

        history.push(-20.0);
        history.push(f32::NEG_INFINITY);
        history.push(-10.0);
        assert_eq!(history.len(), 4);
        assert_eq!(history.dynamic_range(), 10.0);
        assert_eq!(history.average(), -15.0);
    }

    #[test]
    fn test_history_single_entry_has_no_range() {
        let mut history = RollingHistory::new(100);
        history.push(-18.0);
        assert_eq!(history.dynamic_range(), 0.0);
    }

    #[test]
    fn test_crest_factor_holds_through_silence() {
        let mut crest = CrestFactor::default();
        let value = crest.update(1.0, 0.5);
        assert!((value - 6.0206).abs() < 0.001);
        assert_eq!(crest.update(0.0, 0.0), value);
        assert_eq!(crest.update(0.5, 0.0), value);
    }

    #[test]
    fn test_record_clip_script() {
        let mut stats = SessionStats::new(-0.5);
        let peaks = [-12.0, -0.4, -0.5, 0.0, -0.6, f32::NEG_INFINITY, -0.49];
        let counted: Vec<bool> = peaks.iter().map(|&p| stats.record_clip(p)).collect();
        assert_eq!(counted, vec![false, true, false, true, false, false, true]);
        assert_eq!(stats.clipping_count, 3);
    }

    #[test]
    fn test_session_max_tracks_loudest() {
        let mut stats = SessionStats::new(-0.5);
        stats.update_max(-20.0, -6.0);
        stats.update_max(-25.0, -3.0);
        stats.update_max(f32::NEG_INFINITY, f32::NEG_INFINITY);
        assert_eq!(stats.rms_max, -20.0);
        assert_eq!(stats.peak_max, -3.0);
    }

    #[test]
    fn test_meter_statistics_reset() {
        let mut statistics = MeterStatistics::new(&MeterConfig::default());
        let snapshot = MetricsSnapshot {
            rms: 0.5,
            peak: 1.0,
            rms_db: -6.0,
            peak_db: 0.0,
            true_peak_db: 0.0,
            ..MetricsSnapshot::silent()
        };
        statistics.update(&snapshot, 16);
        assert_eq!(statistics.session.clipping_count, 1);
        assert_eq!(statistics.history.len(), 1);

        statistics.reset();
        assert_eq!(statistics.session.clipping_count, 0);
        assert!(statistics.history.is_empty());
        assert_eq!(statistics.rms_hold.held_db(), f32::NEG_INFINITY);
        assert_eq!(statistics.peak_hold.held_db(), f32::NEG_INFINITY);
        assert_eq!(statistics.crest.value_db(), 0.0);
    }
}
