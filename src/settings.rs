//! Process-wide meter settings persisted through a [`KeyValueStore`].
//!
//! Each field lives under its own key so a corrupt value only resets that
//! field. Loading never fails: missing or malformed values fall back to
//! their defaults (logged by the storage layer).

use std::io;

use serde::{Deserialize, Serialize};

use crate::storage::{
    read_json, write_json, KeyValueStore, KEY_DISPLAY, KEY_FOH_OFFSET, KEY_SELECTED_PROFILE,
    KEY_TARGET_ZONE,
};
use crate::venue::TargetZone;

/// Which scale the presentation layer labels levels with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    #[default]
    Dbfs,
    SplEstimate,
}

/// Which readings the presentation layer shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    Console,
    Audience,
    #[default]
    Split,
}

/// Scale and view mode, stored together under one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default)]
    pub scale_mode: ScaleMode,
    #[serde(default)]
    pub view_mode: ViewMode,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    /// Console-to-audience level offset in dB
    pub foh_offset_db: f32,
    pub target_zone: TargetZone,
    pub display: DisplaySettings,
    /// Id of the selected venue profile, if any
    pub selected_profile: Option<u64>,
}

impl Settings {
    /// Load every field, substituting defaults for missing or corrupt values
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();
        Self {
            foh_offset_db: read_json::<f32>(store, KEY_FOH_OFFSET)
                .filter(|offset| offset.is_finite())
                .unwrap_or(defaults.foh_offset_db),
            target_zone: read_json(store, KEY_TARGET_ZONE).unwrap_or(defaults.target_zone),
            display: read_json(store, KEY_DISPLAY).unwrap_or(defaults.display),
            selected_profile: read_json::<Option<u64>>(store, KEY_SELECTED_PROFILE)
                .flatten(),
        }
    }

    /// Write every field
    pub fn save(&self, store: &dyn KeyValueStore) -> io::Result<()> {
        write_json(store, KEY_FOH_OFFSET, &self.foh_offset_db)?;
        write_json(store, KEY_TARGET_ZONE, &self.target_zone)?;
        write_json(store, KEY_DISPLAY, &self.display)?;
        write_json(store, KEY_SELECTED_PROFILE, &self.selected_profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_defaults_on_empty_store() {
        let settings = Settings::load(&MemoryStore::new());
        assert_eq!(settings.foh_offset_db, 0.0);
        assert_eq!(settings.target_zone, TargetZone::Worship);
        assert_eq!(settings.display.scale_mode, ScaleMode::Dbfs);
        assert_eq!(settings.display.view_mode, ViewMode::Split);
        assert_eq!(settings.selected_profile, None);
    }

    #[test]
    fn test_save_then_load() {
        let store = MemoryStore::new();
        let settings = Settings {
            foh_offset_db: 5.5,
            target_zone: TargetZone::Rock,
            display: DisplaySettings {
                scale_mode: ScaleMode::SplEstimate,
                view_mode: ViewMode::Audience,
            },
            selected_profile: Some(1_700_000_000_000),
        };
        settings.save(&store).unwrap();

        assert_eq!(store.get(KEY_TARGET_ZONE).as_deref(), Some("\"rock\""));
        assert_eq!(
            store.get(KEY_DISPLAY).as_deref(),
            Some(r#"{"scale_mode":"spl_estimate","view_mode":"audience"}"#)
        );
        assert_eq!(Settings::load(&store), settings);
    }

    #[test]
    fn test_corrupt_field_only_resets_that_field() {
        let store = MemoryStore::with_values([
            (KEY_FOH_OFFSET, "4"),
            (KEY_TARGET_ZONE, "\"metal\""),
            (KEY_DISPLAY, "{not json"),
        ]);
        let settings = Settings::load(&store);
        assert_eq!(settings.foh_offset_db, 4.0);
        assert_eq!(settings.target_zone, TargetZone::Worship);
        assert_eq!(settings.display, DisplaySettings::default());
    }

    #[test]
    fn test_cleared_selection_round_trips() {
        let store = MemoryStore::new();
        Settings::default().save(&store).unwrap();
        assert_eq!(store.get(KEY_SELECTED_PROFILE).as_deref(), Some("null"));
        assert_eq!(Settings::load(&store).selected_profile, None);
    }
}
