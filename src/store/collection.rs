use crate::{
    prelude::{Arc, HashSet},
    store::{read_json, write_json, KeyValueStore},
    MapError, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Persisted collection state of one marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedMarker {
    pub marker_id: String,
    pub collected: bool,
    /// Milliseconds since the epoch, 0 when not collected
    pub collected_at: u64,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Which markers the player has collected.
///
/// One record per marker id, so a toggle writes a single entry.
pub struct CollectionStore {
    backend: Arc<dyn KeyValueStore>,
    prefix: String,
    records: BTreeMap<String, CollectedMarker>,
    collected: HashSet<String>,
}

impl CollectionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, prefix: &str) -> Self {
        let mut store = Self {
            backend,
            prefix: prefix.to_string(),
            records: BTreeMap::new(),
            collected: HashSet::default(),
        };
        store.load();
        store
    }

    fn load(&mut self) {
        let keys = match self.backend.keys_with_prefix(&self.prefix) {
            Ok(keys) => keys,
            Err(e) => {
                log::error!("failed to list collected markers: {}", e);
                return;
            }
        };
        for key in keys {
            if let Some(record) = read_json::<CollectedMarker>(self.backend.as_ref(), &key) {
                if record.collected {
                    self.collected.insert(record.marker_id.clone());
                }
                self.records.insert(record.marker_id.clone(), record);
            }
        }
        log::debug!("{} collected markers loaded", self.collected.len());
    }

    fn key(&self, marker_id: &str) -> String {
        format!("{}{}", self.prefix, marker_id)
    }

    fn put(&mut self, record: CollectedMarker) {
        write_json(self.backend.as_ref(), &self.key(&record.marker_id), &record);
        self.records.insert(record.marker_id.clone(), record);
    }

    pub fn is_collected(&self, marker_id: &str) -> bool {
        self.collected.contains(marker_id)
    }

    pub fn set_collected(&mut self, marker_id: &str, collected: bool) {
        self.put(CollectedMarker {
            marker_id: marker_id.to_string(),
            collected,
            collected_at: if collected { now_millis() } else { 0 },
        });
        if collected {
            self.collected.insert(marker_id.to_string());
        } else {
            self.collected.remove(marker_id);
        }
    }

    /// Flip a marker's state, returns the new state
    pub fn toggle_collected(&mut self, marker_id: &str) -> bool {
        let collected = !self.is_collected(marker_id);
        self.set_collected(marker_id, collected);
        collected
    }

    /// Collected ids, sorted
    pub fn collected_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.collected.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn collected_set(&self) -> &HashSet<String> {
        &self.collected
    }

    pub fn collected_count(&self) -> usize {
        self.collected.len()
    }

    pub fn record(&self, marker_id: &str) -> Option<&CollectedMarker> {
        self.records.get(marker_id)
    }

    pub fn clear_all(&mut self) {
        if let Err(e) = self.backend.clear_prefix(&self.prefix) {
            log::error!("failed to clear collected markers: {}", e);
        }
        self.records.clear();
        self.collected.clear();
    }

    /// Pretty JSON array of the collected records
    pub fn export_to_json(&self) -> Result<String> {
        let collected: Vec<&CollectedMarker> = self.records.values().filter(|r| r.collected).collect();
        Ok(serde_json::to_string_pretty(&collected)?)
    }

    /// Upsert every record of an export and add its collected ids.
    ///
    /// Existing state is kept; malformed input changes nothing. Returns the
    /// number of records read.
    pub fn import_from_json(&mut self, json: &str) -> Result<usize> {
        let records: Vec<CollectedMarker> =
            serde_json::from_str(json).map_err(|e| MapError::Import(e.to_string()))?;
        let count = records.len();
        for record in records {
            if record.collected {
                self.collected.insert(record.marker_id.clone());
            }
            self.put(record);
        }
        log::info!("imported {} collection records", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const PREFIX: &str = "map-collected-markers/";

    fn store() -> (Arc<MemoryStore>, CollectionStore) {
        let backend = Arc::new(MemoryStore::new());
        let store = CollectionStore::new(backend.clone(), PREFIX);
        (backend, store)
    }

    #[test]
    fn test_toggle_and_persist() {
        let (backend, mut store) = store();
        assert!(store.toggle_collected("VL_1_001"));
        assert!(store.is_collected("VL_1_001"));
        assert!(store.record("VL_1_001").unwrap().collected_at > 0);

        assert!(!store.toggle_collected("VL_1_001"));
        let record = store.record("VL_1_001").unwrap();
        assert!(!record.collected);
        assert_eq!(record.collected_at, 0);

        store.set_collected("VL_1_002", true);
        store.set_collected("VL_1_002", true);
        assert_eq!(store.collected_ids(), vec!["VL_1_002"]);

        let reopened = CollectionStore::new(backend, PREFIX);
        assert_eq!(reopened.collected_ids(), vec!["VL_1_002"]);
        assert!(reopened.record("VL_1_001").is_some());
    }

    #[test]
    fn test_export_only_collected() {
        let (_, mut store) = store();
        store.set_collected("a", true);
        store.set_collected("b", false);
        let exported: Vec<CollectedMarker> = serde_json::from_str(&store.export_to_json().unwrap()).unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].marker_id, "a");
        assert!(store.export_to_json().unwrap().contains("\"markerId\""));
    }

    #[test]
    fn test_import_is_additive_and_idempotent() {
        let (_, mut store) = store();
        store.set_collected("a", true);
        let exported = store.export_to_json().unwrap();

        assert_eq!(store.import_from_json(&exported).unwrap(), 1);
        assert_eq!(store.collected_ids(), vec!["a"]);

        let other = r#"[
            {"markerId": "b", "collected": true, "collectedAt": 1700000000000},
            {"markerId": "c", "collected": false, "collectedAt": 0}
        ]"#;
        assert_eq!(store.import_from_json(other).unwrap(), 2);
        assert_eq!(store.collected_ids(), vec!["a", "b"]);
        assert_eq!(store.record("b").unwrap().collected_at, 1700000000000);
        assert!(store.record("c").is_some());
    }

    #[test]
    fn test_malformed_import_changes_nothing() {
        let (_, mut store) = store();
        store.set_collected("a", true);
        assert!(matches!(store.import_from_json("{\"oops\": 1}"), Err(MapError::Import(_))));
        assert_eq!(store.collected_ids(), vec!["a"]);
    }

    #[test]
    fn test_clear_all() {
        let (backend, mut store) = store();
        store.set_collected("a", true);
        store.set_collected("b", true);
        store.clear_all();
        assert_eq!(store.collected_count(), 0);
        assert!(backend.is_empty());
    }
}
