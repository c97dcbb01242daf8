use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use super::KeyValueStore;

/// In-process store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a store, e.g. with deliberately corrupt values
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: Mutex::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl KeyValueStore for MemoryStore {
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
            .map_err(|_| io::Error::other("memory store lock poisoned"))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}
