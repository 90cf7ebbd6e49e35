use crate::{
    data::marker::MarkerTypeTable,
    prelude::Arc,
    store::{read_json, write_json, KeyValueStore},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which marker types are shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub active_types: BTreeSet<String>,
    pub hide_collected: bool,
    #[serde(default)]
    pub selected_marker_id: Option<String>,
}

/// Filter entry as found in storage; every field may be missing
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StoredFilterState {
    active_types: Option<Vec<String>>,
    hide_collected: bool,
    selected_marker_id: Option<String>,
}

pub struct FilterStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    all_types: BTreeSet<String>,
    types: MarkerTypeTable,
    state: FilterState,
}

impl FilterStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, key: &str, types: MarkerTypeTable) -> Self {
        let all_types: BTreeSet<String> = types.keys().into_iter().collect();
        let state = match read_json::<StoredFilterState>(backend.as_ref(), key) {
            Some(stored) => {
                // an empty list was the old way of saying "everything"
                let active_types = match stored.active_types {
                    Some(list) if !list.is_empty() => list.into_iter().collect(),
                    _ => all_types.clone(),
                };
                FilterState {
                    active_types,
                    hide_collected: stored.hide_collected,
                    selected_marker_id: stored.selected_marker_id,
                }
            }
            None => FilterState {
                active_types: all_types.clone(),
                hide_collected: false,
                selected_marker_id: None,
            },
        };

        Self {
            backend,
            key: key.to_string(),
            all_types,
            types,
            state,
        }
    }

    fn save(&self) {
        write_json(self.backend.as_ref(), &self.key, &self.state);
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn active_types(&self) -> &BTreeSet<String> {
        &self.state.active_types
    }

    pub fn hide_collected(&self) -> bool {
        self.state.hide_collected
    }

    pub fn is_type_active(&self, marker_type: &str) -> bool {
        self.state.active_types.contains(marker_type)
    }

    pub fn set_active_types<I>(&mut self, types: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.state.active_types = types.into_iter().collect();
        self.save();
    }

    pub fn toggle_type(&mut self, marker_type: &str) {
        if !self.state.active_types.remove(marker_type) {
            self.state.active_types.insert(marker_type.to_string());
        }
        self.save();
    }

    pub fn select_category(&mut self, sub_category: &str) {
        self.state
            .active_types
            .extend(self.types.keys_in_category(sub_category));
        self.save();
    }

    pub fn deselect_category(&mut self, sub_category: &str) {
        for key in self.types.keys_in_category(sub_category) {
            self.state.active_types.remove(&key);
        }
        self.save();
    }

    pub fn select_all(&mut self) {
        self.state.active_types = self.all_types.clone();
        self.save();
    }

    /// Deactivate every type.
    ///
    /// Persisted as an empty list, which the next load reads back as all
    /// types.
    pub fn clear_all(&mut self) {
        self.state.active_types.clear();
        self.save();
    }

    pub fn set_hide_collected(&mut self, hide: bool) {
        self.state.hide_collected = hide;
        self.save();
    }

    pub fn set_selected_marker(&mut self, marker_id: Option<String>) {
        self.state.selected_marker_id = marker_id;
        self.save();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::marker::{MarkerCategory, MarkerType};
    use crate::store::MemoryStore;

    const KEY: &str = "talos.map.markers";

    fn types() -> MarkerTypeTable {
        let make = |key: &str, sub: &str| MarkerType {
            key: key.to_string(),
            name: key.to_string(),
            category: MarkerCategory {
                main: "any".to_string(),
                sub: sub.to_string(),
            },
            no_frame: false,
            sub_icon: None,
        };
        MarkerTypeTable::new([
            make("pink_bolete_spot", "natural"),
            make("ferrium_spot", "valuable"),
            make("blight_crab", "mob"),
            make("teleport_point", "facility"),
        ])
    }

    fn set(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_defaults_to_everything() {
        let store = FilterStore::new(Arc::new(MemoryStore::new()), KEY, types());
        assert_eq!(store.active_types().len(), 4);
        assert!(!store.hide_collected());
    }

    #[test]
    fn test_select_all_and_clear_all() {
        let mut store = FilterStore::new(Arc::new(MemoryStore::new()), KEY, types());
        store.clear_all();
        assert!(store.active_types().is_empty());
        store.select_all();
        assert_eq!(store.active_types(), &set(&["blight_crab", "ferrium_spot", "pink_bolete_spot", "teleport_point"]));
    }

    #[test]
    fn test_category_round_trip() {
        let mut store = FilterStore::new(Arc::new(MemoryStore::new()), KEY, types());
        store.set_active_types(["teleport_point".to_string()]);
        let before = store.active_types().clone();
        store.select_category("mob");
        assert!(store.is_type_active("blight_crab"));
        store.deselect_category("mob");
        assert_eq!(store.active_types(), &before);

        store.toggle_type("teleport_point");
        assert!(store.active_types().is_empty());
        store.toggle_type("teleport_point");
        assert!(store.is_type_active("teleport_point"));
    }

    #[test]
    fn test_persisted_state_is_restored() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut store = FilterStore::new(backend.clone(), KEY, types());
        store.set_active_types(["ferrium_spot".to_string()]);
        store.set_hide_collected(true);

        let reopened = FilterStore::new(backend, KEY, types());
        assert_eq!(reopened.active_types(), &set(&["ferrium_spot"]));
        assert!(reopened.hide_collected());
    }

    #[test]
    fn test_legacy_empty_list_means_all_types() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        backend
            .set(KEY, r#"{"activeTypes": [], "hideCollected": true}"#)
            .unwrap();
        let store = FilterStore::new(backend, KEY, types());
        assert_eq!(store.active_types().len(), 4);
        assert!(store.hide_collected());
    }

    #[test]
    fn test_malformed_entry_falls_back_to_defaults() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        backend.set(KEY, "[1, 2, 3]").unwrap();
        let store = FilterStore::new(backend, KEY, types());
        assert_eq!(store.active_types().len(), 4);
        assert!(!store.hide_collected());
    }
}
