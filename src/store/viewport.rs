use crate::{
    core::map_core::{MapView, ViewStateDelegate},
    prelude::{Arc, HashMap},
    store::{read_json, write_json, KeyValueStore},
};
use std::sync::{Mutex, PoisonError};

/// Last camera per region.
///
/// Reads are served from memory; writes go to memory and straight through
/// to the backend.
pub struct ViewStateStore {
    backend: Arc<dyn KeyValueStore>,
    prefix: String,
    views: Mutex<HashMap<String, MapView>>,
}

impl ViewStateStore {
    /// Open the store and load the saved view of every listed region
    pub fn new<S: AsRef<str>>(backend: Arc<dyn KeyValueStore>, prefix: &str, region_ids: &[S]) -> Self {
        let store = Self {
            backend,
            prefix: prefix.to_string(),
            views: Mutex::new(HashMap::default()),
        };
        for region_id in region_ids {
            store.hydrate(region_id.as_ref());
        }
        store
    }

    fn key(&self, region_id: &str) -> String {
        format!("{}{}", self.prefix, region_id)
    }

    fn hydrate(&self, region_id: &str) {
        let Some(view) = read_json::<MapView>(self.backend.as_ref(), &self.key(region_id)) else {
            return;
        };
        if view.is_valid() {
            self.lock().insert(region_id.to_string(), view);
        } else {
            log::warn!("discarding invalid saved view for {}: {:?}", region_id, view);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, MapView>> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Regions with a saved view
    pub fn region_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl ViewStateDelegate for ViewStateStore {
    fn get_view_state(&self, region_id: &str) -> Option<MapView> {
        self.lock().get(region_id).copied()
    }

    fn save_view_state(&self, region_id: &str, view: MapView) {
        self.lock().insert(region_id.to_string(), view);
        write_json(self.backend.as_ref(), &self.key(region_id), &view);
    }
}
