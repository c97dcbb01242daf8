//! Configuration management for meter tuning
//!
//! This module provides runtime configuration loading from JSON files, so
//! meter ballistics and capture sizes can be adjusted without
//! recompilation. Missing or malformed files fall back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub meter: MeterConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

/// How the peak hold releases once the hold time has elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayMode {
    /// Fixed step per update; release speed follows the tick rate
    PerTick,
    /// Step scaled by elapsed time, normalized to `nominal_tick_hz`
    PerSecond,
}

/// Peak hold, history and clip detection parameters
///
/// Fields missing from the JSON take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Number of RMS readings kept for average and dynamic range
    pub history_len: usize,
    /// Plateau before the held value starts to release (ms)
    pub hold_time_ms: u64,
    /// Release step in dB (per tick, or per nominal tick in PerSecond mode)
    pub hold_decay_db: f32,
    pub decay_mode: DecayMode,
    /// Peak readings above this count as a clip event (dBFS)
    pub clip_threshold_db: f32,
    /// Display refresh rate the tick trigger aims for
    pub nominal_tick_hz: u32,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            history_len: 100,
            hold_time_ms: 2000,
            hold_decay_db: 0.5,
            decay_mode: DecayMode::PerTick,
            clip_threshold_db: -0.5,
            nominal_tick_hz: 60,
        }
    }
}

/// Capture parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Samples per channel delivered to each tick
    pub window_size: usize,
    /// Stereo frames buffered between the capture callback and the tick
    pub ring_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            ring_capacity: 16384,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file doesn't exist
    /// or its JSON is invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file("assets/meter_config.json")
    }
}
