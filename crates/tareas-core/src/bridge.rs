use tracing::{debug, error};

use crate::datastore::KeyValueStore;

pub const FAVORITES_KEY: &str = "tareasFavoritas";
pub const TRASH_KEY: &str = "tareasPapelera";
pub const THEME_KEY: &str = "darkMode";

/// Typed access to the flag sets kept in local storage.
#[derive(Debug)]
pub struct PersistenceBridge<K> {
    kv: K,
}

impl<K: KeyValueStore> PersistenceBridge<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Missing or unparseable values read as an empty sequence.
    pub fn read_ids(&self, key: &str) -> Vec<u64> {
        let Some(raw) = self.kv.get(key) else {
            return Vec::new();
        };

        match serde_json::from_str::<Vec<u64>>(&raw) {
            Ok(mut ids) => {
                let mut seen = std::collections::BTreeSet::new();
                ids.retain(|id| seen.insert(*id));
                debug!(key, count = ids.len(), "read persisted ids");
                ids
            }
            Err(err) => {
                error!(key, error = %err, "failed parsing persisted ids; treating as empty");
                Vec::new()
            }
        }
    }

    pub fn write_ids(&mut self, key: &str, ids: &[u64]) -> anyhow::Result<()> {
        let json = serde_json::to_string(ids)?;
        debug!(key, count = ids.len(), "writing persisted ids");
        self.kv.set(key, &json)
    }

    pub fn read_flag(&self, key: &str) -> bool {
        self.kv.get(key).as_deref() == Some("true")
    }

    pub fn write_flag(&mut self, key: &str, value: bool) -> anyhow::Result<()> {
        self.kv.set(key, if value { "true" } else { "false" })
    }
}
