use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use talos_map::prelude::*;

/// Serves blank tiles and icons without touching the network
pub struct OfflineFetcher;

#[async_trait]
impl TileFetcher for OfflineFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        Ok(vec![0u8; 4])
    }
}

#[async_trait]
impl IconFetcher for OfflineFetcher {
    async fn fetch_icon(&self, _url: &str) -> Result<Vec<u8>> {
        Ok(vec![1u8; 4])
    }
}

#[allow(dead_code)]
pub fn session(backend: Arc<dyn KeyValueStore>) -> MapSession {
    let dataset = Arc::new(Dataset::bundled().unwrap());
    let config = Arc::new(MapConfig::default());
    let loader = TileLoader::new(Arc::new(OfflineFetcher), config.tile_loader.clone());
    let icons = Arc::new(IconCache::new(Arc::new(OfflineFetcher), config.clone()));
    MapSession::with_parts(dataset, config, backend, loader, icons)
}

/// Fresh directory under the system temp dir
#[allow(dead_code)]
pub fn temp_dir(name: &str) -> PathBuf {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let dir = std::env::temp_dir().join(format!(
        "talos-map-{}-{}-{}",
        name,
        std::process::id(),
        NEXT.fetch_add(1, Ordering::SeqCst)
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}
