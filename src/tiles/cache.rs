use crate::core::geo::TileCoord;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Cache key: the URL template of the layer plus the tile coordinate
pub type TileKey = (String, TileCoord);

/// In-memory tile cache using LRU eviction, shared between clones
#[derive(Debug, Clone)]
pub struct TileCache {
    cache: Arc<Mutex<LruCache<TileKey, Arc<Vec<u8>>>>>,
}

impl TileCache {
    /// Create a new tile cache with the given capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Get a tile from the cache
    pub fn get(&self, key: &TileKey) -> Option<Arc<Vec<u8>>> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    /// Insert a tile into the cache
    pub fn put(&self, key: TileKey, data: Arc<Vec<u8>>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, data);
        }
    }

    /// Check if a tile is in the cache
    pub fn contains(&self, key: &TileKey) -> bool {
        self.cache
            .lock()
            .ok()
            .map(|cache| cache.contains(key))
            .unwrap_or(false)
    }

    /// Clear all tiles from the cache
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Get the current number of cached tiles
    pub fn len(&self) -> usize {
        self.cache.lock().ok().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(template: &str, x: u32) -> TileKey {
        (template.to_string(), TileCoord::new(x, 0, 1))
    }

    #[test]
    fn test_layers_do_not_share_entries() {
        let cache = TileCache::new(4);
        cache.put(key("valley-iv", 1), Arc::new(vec![1]));
        assert!(cache.contains(&key("valley-iv", 1)));
        assert!(!cache.contains(&key("valley-iv_l1", 1)));
        assert_eq!(*cache.get(&key("valley-iv", 1)).unwrap(), vec![1]);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = TileCache::new(2);
        cache.put(key("a", 1), Arc::new(vec![1]));
        cache.put(key("a", 2), Arc::new(vec![2]));
        // touch the first entry so the second becomes least recently used
        cache.get(&key("a", 1));
        cache.put(key("a", 3), Arc::new(vec![3]));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&key("a", 1)));
        assert!(!cache.contains(&key("a", 2)));

        cache.clear();
        assert!(cache.is_empty());
    }
}
