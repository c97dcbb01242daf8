// ProfileStore - saved venue placements
//
// Venue profiles are kept as one JSON list under a single store key and
// rewritten in full on every change. A missing or corrupt list loads as
// empty; it never fails startup.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::model::{classify_venue_type, VenuePlacement, VenueType};
use crate::error::{log_profile_error, ProfileError};
use crate::storage::{read_json, write_json, KeyValueStore, KEY_VENUE_PROFILES};

/// A saved distance/elevation/offset record for one physical venue
///
/// `venue_type` is computed from the distance when the profile is created
/// and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueProfile {
    pub id: u64,
    pub name: String,
    pub distance_m: f32,
    pub elevation_m: f32,
    pub offset_db: f32,
    pub venue_type: VenueType,
    /// Creation time, milliseconds since the Unix epoch
    pub created_at: u64,
}

impl VenueProfile {
    pub fn placement(&self) -> VenuePlacement {
        VenuePlacement::new(self.distance_m, self.elevation_m)
    }
}

/// CRUD over venue profiles backed by a [`KeyValueStore`]
pub struct ProfileStore {
    store: Arc<dyn KeyValueStore>,
    profiles: Vec<VenueProfile>,
    last_id: u64,
}

impl ProfileStore {
    /// Open the store and load the persisted collection
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let mut profiles = Self {
            store,
            profiles: Vec::new(),
            last_id: 0,
        };
        profiles.profiles = profiles.load();
        profiles.last_id = profiles.profiles.iter().map(|p| p.id).max().unwrap_or(0);
        profiles
    }

    /// Read the full collection from the backing store
    ///
    /// Missing or malformed data yields an empty list.
    pub fn load(&self) -> Vec<VenueProfile> {
        read_json(self.store.as_ref(), KEY_VENUE_PROFILES).unwrap_or_default()
    }

    /// Replace the persisted collection
    pub fn save(&self, profiles: &[VenueProfile]) -> Result<(), ProfileError> {
        write_json(self.store.as_ref(), KEY_VENUE_PROFILES, profiles).map_err(|e| {
            let err = ProfileError::Storage {
                details: e.to_string(),
            };
            log_profile_error(&err, "save_profiles");
            err
        })
    }

    /// Create, persist and return a new profile
    ///
    /// # Errors
    /// - `ProfileError::EmptyName` if `name` is blank
    /// - `ProfileError::InvalidPlacement` for negative or non-finite values
    /// - `ProfileError::Storage` if persisting fails; nothing is added then
    pub fn create(
        &mut self,
        name: &str,
        distance_m: f32,
        elevation_m: f32,
        offset_db: f32,
    ) -> Result<VenueProfile, ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            let err = ProfileError::EmptyName;
            log_profile_error(&err, "create_profile");
            return Err(err);
        }
        validate_placement(distance_m, elevation_m, offset_db).inspect_err(|err| {
            log_profile_error(err, "create_profile");
        })?;

        let created_at = epoch_millis();
        let profile = VenueProfile {
            id: created_at.max(self.last_id + 1),
            name: name.to_string(),
            distance_m,
            elevation_m,
            offset_db,
            venue_type: classify_venue_type(distance_m),
            created_at,
        };

        let mut updated = self.profiles.clone();
        updated.push(profile.clone());
        self.save(&updated)?;

        self.last_id = profile.id;
        self.profiles = updated;
        log::info!(
            "[ProfileStore] Created profile {} '{}' ({})",
            profile.id,
            profile.name,
            profile.venue_type
        );
        Ok(profile)
    }

    /// Remove a profile by id; returns whether anything was removed
    pub fn delete(&mut self, id: u64) -> Result<bool, ProfileError> {
        if !self.profiles.iter().any(|p| p.id == id) {
            return Ok(false);
        }
        let updated: Vec<VenueProfile> =
            self.profiles.iter().filter(|p| p.id != id).cloned().collect();
        self.save(&updated)?;
        self.profiles = updated;
        Ok(true)
    }

    pub fn get(&self, id: u64) -> Option<&VenueProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn list(&self) -> &[VenueProfile] {
        &self.profiles
    }
}

fn validate_placement(
    distance_m: f32,
    elevation_m: f32,
    offset_db: f32,
) -> Result<(), ProfileError> {
    if !distance_m.is_finite() || distance_m < 0.0 {
        return Err(ProfileError::InvalidPlacement {
            reason: format!("distance {} m", distance_m),
        });
    }
    if !elevation_m.is_finite() || elevation_m < 0.0 {
        return Err(ProfileError::InvalidPlacement {
            reason: format!("elevation {} m", elevation_m),
        });
    }
    if !offset_db.is_finite() {
        return Err(ProfileError::InvalidPlacement {
            reason: format!("offset {} dB", offset_db),
        });
    }
    Ok(())
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::io;

    fn store() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::new())
    }

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, _key: &str, _value: String) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    #[test]
    fn test_create_classifies_and_persists() {
        let backing = store();
        let mut profiles = ProfileStore::open(Arc::clone(&backing));
        let profile = profiles.create("  Main Hall ", 20.0, 1.5, 4.0).unwrap();

        assert_eq!(profile.name, "Main Hall");
        assert_eq!(profile.venue_type, VenueType::Medium);
        assert!(profile.created_at > 0);

        let reopened = ProfileStore::open(backing);
        assert_eq!(reopened.list(), &[profile]);
    }

    #[test]
    fn test_create_rejects_empty_name() {
        let mut profiles = ProfileStore::open(store());
        assert_eq!(
            profiles.create("   ", 10.0, 1.0, 2.0),
            Err(ProfileError::EmptyName)
        );
        assert!(profiles.list().is_empty());
    }

    #[test]
    fn test_create_rejects_invalid_placement() {
        let mut profiles = ProfileStore::open(store());
        assert!(matches!(
            profiles.create("Club", -1.0, 0.0, 0.0),
            Err(ProfileError::InvalidPlacement { .. })
        ));
        assert!(matches!(
            profiles.create("Club", 5.0, f32::NAN, 0.0),
            Err(ProfileError::InvalidPlacement { .. })
        ));
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let mut profiles = ProfileStore::open(store());
        let ids: Vec<u64> = (0..5)
            .map(|i| profiles.create(&format!("Venue {}", i), 10.0, 1.0, 2.0).unwrap().id)
            .collect();
        assert!(ids.windows(2).all(|pair| pair[1] > pair[0]));
    }

    #[test]
    fn test_venue_type_frozen_at_creation() {
        let mut profiles = ProfileStore::open(store());
        let mut profile = profiles.create("Arena", 40.0, 4.0, 8.0).unwrap();
        profile.distance_m = 5.0;
        assert_eq!(profile.venue_type, VenueType::Large);
    }

    #[test]
    fn test_delete_by_id_and_missing_is_noop() {
        let backing = store();
        let mut profiles = ProfileStore::open(Arc::clone(&backing));
        let a = profiles.create("A", 10.0, 1.0, 2.0).unwrap();
        let b = profiles.create("B", 30.0, 2.0, 6.0).unwrap();

        assert_eq!(profiles.delete(a.id), Ok(true));
        assert_eq!(profiles.delete(a.id), Ok(false));
        assert_eq!(profiles.delete(999), Ok(false));
        assert_eq!(ProfileStore::open(backing).list(), &[b]);
    }

    #[test]
    fn test_corrupt_collection_loads_empty() {
        let backing: Arc<dyn KeyValueStore> =
            Arc::new(MemoryStore::with_values([(KEY_VENUE_PROFILES, "[{broken")]));
        let profiles = ProfileStore::open(backing);
        assert!(profiles.list().is_empty());
    }

    #[test]
    fn test_storage_failure_leaves_collection_unchanged() {
        let mut profiles = ProfileStore::open(Arc::new(ReadOnlyStore));
        let result = profiles.create("Chapel", 8.0, 0.5, 1.5);
        assert!(matches!(result, Err(ProfileError::Storage { .. })));
        assert!(profiles.list().is_empty());
    }
}
