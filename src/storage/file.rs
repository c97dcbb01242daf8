use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::KeyValueStore;

/// Key-value store persisted as one JSON object on disk
///
/// The whole map is loaded on open and rewritten on every `set`, via a
/// temporary file and rename so readers never see a partial document. A
/// failed write leaves the in-memory map unchanged. A missing or corrupt
/// file opens as an empty store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = Self::load(&path);
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> BTreeMap<String, String> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(err) => {
                log::warn!("[Storage] Failed to read {:?}: {}. Starting empty.", path, err);
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&contents).unwrap_or_else(|err| {
            log::warn!("[Storage] Corrupt store {:?}: {}. Starting empty.", path, err);
            BTreeMap::new()
        })
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(values).map_err(io::Error::other)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> io::Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| io::Error::other("file store lock poisoned"))?;
        let mut updated = values.clone();
        updated.insert(key.to_string(), value);
        self.persist(&updated)?;
        *values = updated;
        Ok(())
    }
}
