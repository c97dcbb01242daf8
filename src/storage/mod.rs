//! Persistent key-value storage for settings and venue profiles.
//!
//! The core only relies on a `get`/`set` contract over string values.
//! Values are JSON documents; reading a missing or malformed value yields
//! `None` (logged) so callers can fall back to their documented defaults.

use std::io;

use serde::de::DeserializeOwned;
use serde::Serialize;

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Venue profile collection (JSON list)
pub const KEY_VENUE_PROFILES: &str = "foh.venue_profiles";
/// FOH offset in dB (JSON number)
pub const KEY_FOH_OFFSET: &str = "foh.offset_db";
/// Target zone id (JSON string)
pub const KEY_TARGET_ZONE: &str = "foh.target_zone";
/// Scale and view mode (JSON object)
pub const KEY_DISPLAY: &str = "foh.display";
/// Selected venue profile id (JSON number or null)
pub const KEY_SELECTED_PROFILE: &str = "foh.selected_profile";

/// Durable string key-value backend
///
/// Implementations must make each `set` replace the whole value
/// atomically; the core never interleaves two writes to the same key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> io::Result<()>;
}

/// Read and deserialize a JSON value, `None` if missing or malformed
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!(
                "[Storage] Malformed value for '{}': {}. Falling back to default.",
                key,
                err
            );
            None
        }
    }
}

/// Serialize and store a JSON value
pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> io::Result<()> {
    let json = serde_json::to_string(value).map_err(io::Error::other)?;
    store.set(key, json)
}
