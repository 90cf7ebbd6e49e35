//! Persisted map state
//!
//! Every store sits on a [`KeyValueStore`] holding JSON strings. Backends are
//! fallible, but the stores above them are not: a failed read is treated as
//! "nothing stored" and a failed write is logged, so persistence trouble never
//! reaches the map.

pub mod collection;
pub mod filter;
pub mod viewport;

use crate::{MapError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Durable string key/value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Returns false when the key was not present
    fn remove(&self, key: &str) -> Result<bool>;

    /// All keys starting with `prefix`, sorted
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove every key starting with `prefix`, returns how many were removed
    fn clear_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.keys_with_prefix(prefix)?;
        let mut removed = 0;
        for key in keys {
            if self.remove(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Read and decode a JSON entry; missing, unreadable and malformed entries
/// all come back as `None`
pub(crate) fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    match store.get(key) {
        Ok(Some(text)) => match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("ignoring malformed entry {}: {}", key, e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            log::error!("failed to read {}: {}", key, e);
            None
        }
    }
}

/// Encode and write a JSON entry, logging failures
pub(crate) fn write_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> bool {
    let written = serde_json::to_string(value)
        .map_err(MapError::from)
        .and_then(|text| store.set(key, &text));
    match written {
        Ok(()) => true,
        Err(e) => {
            log::error!("failed to write {}: {}", key, e);
            false
        }
    }
}

/// In-process store, used by tests and as a scratch backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries().remove(key).is_some())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

/// One `.json` file per key under a directory.
///
/// Keys are percent-encoded into file names, so any key is safe to use.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory when needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            match decode_key(stem) {
                Some(key) if key.starts_with(prefix) => keys.push(key),
                Some(_) => {}
                None => {
                    return Err(MapError::Storage(format!(
                        "unreadable entry name {}",
                        entry.path().display()
                    )))
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Backend whose every call fails, for exercising the logged fallbacks
#[cfg(test)]
pub(crate) struct FailingStore;

#[cfg(test)]
impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(MapError::Storage("backend offline".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(MapError::Storage("backend offline".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<bool> {
        Err(MapError::Storage("backend offline".to_string()))
    }

    fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>> {
        Err(MapError::Storage("backend offline".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_failures_become_defaults() {
        assert_eq!(read_json::<Vec<u32>>(&FailingStore, "anything"), None);
        assert!(!write_json(&FailingStore, "anything", &vec![1, 2]));
        assert!(FailingStore.clear_prefix("map-").is_err());
    }

    fn exercise(store: &dyn KeyValueStore) {
        store.set("talos.map.viewState.wuling", "{}").unwrap();
        store.set("map-collected-markers/VL_1_001", "1").unwrap();
        store.set("map-collected-markers/VL_1_002", "2").unwrap();

        assert_eq!(store.get("talos.map.viewState.wuling").unwrap().as_deref(), Some("{}"));
        assert_eq!(store.get("missing").unwrap(), None);
        assert_eq!(
            store.keys_with_prefix("map-collected-markers/").unwrap(),
            vec!["map-collected-markers/VL_1_001", "map-collected-markers/VL_1_002"]
        );

        assert!(store.remove("map-collected-markers/VL_1_001").unwrap());
        assert!(!store.remove("map-collected-markers/VL_1_001").unwrap());
        assert_eq!(store.clear_prefix("map-collected-markers/").unwrap(), 1);
        assert!(store.keys_with_prefix("map-").unwrap().is_empty());
        assert!(store.get("talos.map.viewState.wuling").unwrap().is_some());
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_file_store() {
        let dir = std::env::temp_dir().join(format!("talos-map-store-{}", std::process::id()));
        let store = FileStore::open(&dir).unwrap();
        exercise(&store);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_key_encoding() {
        let key = "map-collected-markers/VL_1 001%";
        assert_eq!(encode_key(key), "map-collected-markers%2FVL_1%20001%25");
        assert_eq!(decode_key(&encode_key(key)).as_deref(), Some(key));
        assert_eq!(decode_key("bad%zz"), None);
    }

    #[test]
    fn test_malformed_json_reads_as_missing() {
        let store = MemoryStore::new();
        store.set("k", "{not json").unwrap();
        assert_eq!(read_json::<serde_json::Value>(&store, "k"), None);
        assert!(write_json(&store, "k", &vec![1, 2]));
        assert_eq!(read_json::<Vec<i32>>(&store, "k"), Some(vec![1, 2]));
    }
}
