//! Marker icon images, fetched once per type and kept in an LRU cache

use crate::{
    core::config::MapConfig,
    prelude::{Arc, HashMap},
    tiles::loader::{HttpTileFetcher, TileFetcher},
    Result,
};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

const DEFAULT_ICON_CAPACITY: usize = 256;

/// Fetches raw icon bytes
#[async_trait]
pub trait IconFetcher: Send + Sync {
    async fn fetch_icon(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl IconFetcher for HttpTileFetcher {
    async fn fetch_icon(&self, url: &str) -> Result<Vec<u8>> {
        self.fetch(url).await
    }
}

/// An icon ready to draw; `data` is `None` when the image could not be
/// fetched and the renderer should fall back to `url`
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIcon {
    pub url: String,
    pub data: Option<Arc<Vec<u8>>>,
}

type PendingIcon = Shared<BoxFuture<'static, ResolvedIcon>>;

/// Per-type icon cache.
///
/// Concurrent requests for the same type share one fetch. Failed fetches
/// are not cached, so the next request tries again.
pub struct IconCache {
    fetcher: Arc<dyn IconFetcher>,
    config: Arc<MapConfig>,
    icons: Mutex<LruCache<String, ResolvedIcon>>,
    pending: Mutex<HashMap<String, PendingIcon>>,
}

impl IconCache {
    pub fn new(fetcher: Arc<dyn IconFetcher>, config: Arc<MapConfig>) -> Self {
        Self::with_capacity(fetcher, config, DEFAULT_ICON_CAPACITY)
    }

    pub fn with_capacity(fetcher: Arc<dyn IconFetcher>, config: Arc<MapConfig>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            fetcher,
            config,
            icons: Mutex::new(LruCache::new(capacity)),
            pending: Mutex::new(HashMap::default()),
        }
    }

    pub fn http(config: Arc<MapConfig>) -> Self {
        Self::new(Arc::new(HttpTileFetcher::default()), config)
    }

    /// Cached icon of a type, without fetching
    pub fn cached(&self, marker_type: &str) -> Option<ResolvedIcon> {
        self.icons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(marker_type)
            .cloned()
    }

    /// Icon of a type, fetching it on a miss
    pub async fn resolve(&self, marker_type: &str) -> ResolvedIcon {
        if let Some(icon) = self.cached(marker_type) {
            return icon;
        }

        let pending = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending
                .entry(marker_type.to_string())
                .or_insert_with(|| self.fetch(marker_type))
                .clone()
        };

        let icon = pending.await;

        // a `clear` while fetching drops the entry, and the result with it
        let still_wanted = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(marker_type)
            .is_some();
        if still_wanted && icon.data.is_some() {
            self.icons
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .put(marker_type.to_string(), icon.clone());
        }
        icon
    }

    fn fetch(&self, marker_type: &str) -> PendingIcon {
        let fetcher = self.fetcher.clone();
        let url = self.config.icon_url(marker_type);
        async move {
            match fetcher.fetch_icon(&url).await {
                Ok(bytes) => ResolvedIcon {
                    url,
                    data: Some(Arc::new(bytes)),
                },
                Err(e) => {
                    log::warn!("icon {} failed to load: {}", url, e);
                    ResolvedIcon { url, data: None }
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Fetch the icons of many types concurrently
    pub async fn preload<I, S>(&self, marker_types: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let types: Vec<S> = marker_types.into_iter().collect();
        futures::future::join_all(types.iter().map(|t| self.resolve(t.as_ref()))).await;
    }

    pub fn len(&self) -> usize {
        self.icons.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop cached icons and forget fetches still in flight
    pub fn clear(&self) {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.icons.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IconFetcher for CountingFetcher {
        async fn fetch_icon(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if url.contains("broken") {
                Err(MapError::Layer("404".to_string()))
            } else {
                Ok(url.as_bytes().to_vec())
            }
        }
    }

    fn cache() -> (Arc<CountingFetcher>, IconCache) {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
        });
        let cache = IconCache::new(fetcher.clone(), Arc::new(MapConfig::local("assets")));
        (fetcher, cache)
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_a_fetch() {
        let (fetcher, cache) = cache();
        let (a, b) = tokio::join!(cache.resolve("ferrium_spot"), cache.resolve("ferrium_spot"));
        assert_eq!(a, b);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.url, "assets/map-icon/ferrium_spot.webp");
        assert!(cache.cached("ferrium_spot").is_some());

        cache.resolve("ferrium_spot").await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_fall_back_and_retry() {
        let (fetcher, cache) = cache();
        let icon = cache.resolve("broken_spot").await;
        assert!(icon.data.is_none());
        assert_eq!(icon.url, "assets/map-icon/broken_spot.webp");
        assert!(cache.cached("broken_spot").is_none());

        cache.resolve("broken_spot").await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_preload_and_clear() {
        let (_, cache) = cache();
        cache.preload(["a_spot", "b_spot", "c_spot"]).await;
        assert_eq!(cache.len(), 3);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_clear_forgets_fetches_in_flight() {
        let (_, cache) = cache();
        let fetch = cache.resolve("ferrium_spot");
        futures::pin_mut!(fetch);
        // start the fetch, which yields once inside the fetcher
        assert!(futures::poll!(fetch.as_mut()).is_pending());
        assert_eq!(cache.pending.lock().unwrap().len(), 1);

        cache.clear();
        assert!(cache.pending.lock().unwrap().is_empty());

        let icon = fetch.await;
        assert!(icon.data.is_some());
        assert!(cache.cached("ferrium_spot").is_none());
    }
}
