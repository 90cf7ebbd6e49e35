use crate::core::{
    config::TileLoadingConfig,
    constants::PLACEHOLDER_TILE,
    geo::TileCoord,
};
use crate::prelude::{Arc, Duration, HashSet};
use crate::tiles::{
    cache::{TileCache, TileKey},
    source::TileSource,
};
use crate::Result;
use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::{
    channel::oneshot,
    future::{self, Either},
    StreamExt,
};
use once_cell::sync::Lazy;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

/// Shared async HTTP client; building it once keeps the connection pool warm
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("talos-map/", env!("CARGO_PKG_VERSION")))
        .tcp_keepalive(Duration::from_secs(30))
        .pool_max_idle_per_host(16)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Fetches raw tile bytes
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches tiles over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpTileFetcher {
    timeout: Duration,
}

impl HttpTileFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpTileFetcher {
    fn default() -> Self {
        Self::new(Duration::from_millis(TileLoadingConfig::default().request_timeout_ms))
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = HTTP_CLIENT
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// One tile delivered to a layer
#[derive(Debug, Clone)]
pub struct TileResult {
    pub layer_id: String,
    pub coord: TileCoord,
    pub data: Arc<Vec<u8>>,
    /// The fetch failed and `data` is the transparent placeholder
    pub placeholder: bool,
}

/// A layer's one-shot "load" notification.
///
/// Listeners subscribe with [`LoadSignal::once`] and get a receiver that
/// resolves the next time the layer finishes a tile batch. Every listener is
/// dropped when the signal fires, and [`LoadSignal::off`] drops one early.
#[derive(Debug, Clone, Default)]
pub struct LoadSignal {
    inner: Arc<Mutex<SignalState>>,
}

#[derive(Debug, Default)]
struct SignalState {
    next_id: u64,
    waiters: Vec<(u64, oneshot::Sender<()>)>,
    fired: u64,
}

impl LoadSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the next load
    pub fn once(&self) -> (u64, oneshot::Receiver<()>) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.next_id += 1;
        let id = state.next_id;
        let (tx, rx) = oneshot::channel();
        state.waiters.push((id, tx));
        (id, rx)
    }

    /// Drop a subscription; false when it already fired or was removed
    pub fn off(&self, id: u64) -> bool {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = state.waiters.len();
        state.waiters.retain(|(waiter, _)| *waiter != id);
        state.waiters.len() != before
    }

    /// Notify and drop every listener
    pub fn fire(&self) {
        let waiters = {
            let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            state.fired += 1;
            std::mem::take(&mut state.waiters)
        };
        for (_, tx) in waiters {
            // the receiver may be gone already
            let _ = tx.send(());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .lock()
            .map(|state| state.waiters.len())
            .unwrap_or(0)
    }

    /// How many times the signal fired
    pub fn fired_count(&self) -> u64 {
        self.inner.lock().map(|state| state.fired).unwrap_or(0)
    }

    /// Waits for the next load, or resolves on the next scheduler turn when
    /// no load arrives first. The subscription is removed on both paths.
    ///
    /// Returns true when the load signal won.
    pub async fn settled(&self) -> bool {
        let (id, load) = self.once();
        let outcome = future::select(load, YieldNow::default()).await;
        self.off(id);
        matches!(outcome, Either::Left((Ok(()), _)))
    }
}

/// Future that is pending exactly once
#[derive(Debug, Default)]
struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// A batch of tiles requested by one layer
pub struct TileBatch {
    pub layer_id: String,
    pub source: Arc<dyn TileSource>,
    pub coords: Vec<TileCoord>,
    pub signal: LoadSignal,
}

/// Async tile loader with bounded concurrency.
///
/// Cached tiles are reported immediately; the rest are fetched on the ambient
/// tokio runtime. Every tile is reported over a channel that the map drains in
/// [`Map::update`](crate::core::map::Map::update). Failed tiles are replaced by
/// the transparent placeholder and never cached.
#[derive(Clone)]
pub struct TileLoader {
    fetcher: Arc<dyn TileFetcher>,
    cache: TileCache,
    config: TileLoadingConfig,
    result_tx: Sender<TileResult>,
    result_rx: Receiver<TileResult>,
    pending: Arc<Mutex<HashSet<TileKey>>>,
}

impl TileLoader {
    pub fn new(fetcher: Arc<dyn TileFetcher>, config: TileLoadingConfig) -> Self {
        let (result_tx, result_rx) = unbounded();
        Self {
            fetcher,
            cache: TileCache::new(config.cache_size),
            config,
            result_tx,
            result_rx,
            pending: Arc::new(Mutex::new(HashSet::default())),
        }
    }

    /// Loader fetching over HTTP
    pub fn http(config: TileLoadingConfig) -> Self {
        let fetcher = HttpTileFetcher::new(Duration::from_millis(config.request_timeout_ms));
        Self::new(Arc::new(fetcher), config)
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn config(&self) -> &TileLoadingConfig {
        &self.config
    }

    /// Queue a batch. Returns the number of tiles that still need fetching.
    pub fn load_batch(&self, batch: TileBatch) -> usize {
        let TileBatch {
            layer_id,
            source,
            coords,
            signal,
        } = batch;
        if coords.is_empty() {
            return 0;
        }

        let template = source.template().to_string();
        let mut to_fetch = Vec::new();
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            for coord in coords {
                let key = (template.clone(), coord);
                if let Some(data) = self.cache.get(&key) {
                    let _ = self.result_tx.send(TileResult {
                        layer_id: layer_id.clone(),
                        coord,
                        data,
                        placeholder: false,
                    });
                } else if pending.insert(key) {
                    to_fetch.push(coord);
                } else {
                    log::debug!("tile {:?} of {} already in flight", coord, layer_id);
                }
            }
        }

        let remaining = to_fetch.len();
        if remaining == 0 {
            signal.fire();
            return 0;
        }

        log::debug!("fetching {} tiles for layer {}", remaining, layer_id);
        let job = self.clone().run_batch(layer_id, source, to_fetch, signal);
        self.spawn(job, remaining);
        remaining
    }

    #[cfg(feature = "tokio-runtime")]
    fn spawn<F>(&self, job: F, count: usize)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(job);
            }
            Err(_) => log::warn!("no async runtime available, {} tiles left unloaded", count),
        }
    }

    #[cfg(not(feature = "tokio-runtime"))]
    fn spawn<F>(&self, _job: F, count: usize)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        log::warn!("built without an async runtime, {} tiles left unloaded", count);
    }

    async fn run_batch(
        self,
        layer_id: String,
        source: Arc<dyn TileSource>,
        coords: Vec<TileCoord>,
        signal: LoadSignal,
    ) {
        let template = source.template().to_string();
        let max_concurrent = self.config.max_concurrent.max(1);

        futures::stream::iter(coords)
            .map(|coord| {
                let url = source.url(coord);
                let loader = &self;
                async move { (coord, loader.fetch_with_retry(&url).await) }
            })
            .buffer_unordered(max_concurrent)
            .for_each(|(coord, fetched)| {
                let key = (template.clone(), coord);
                if let Ok(mut pending) = self.pending.lock() {
                    pending.remove(&key);
                }

                let result = match fetched {
                    Ok(bytes) => {
                        let data = Arc::new(bytes);
                        self.cache.put(key, data.clone());
                        TileResult {
                            layer_id: layer_id.clone(),
                            coord,
                            data,
                            placeholder: false,
                        }
                    }
                    Err(e) => {
                        log::debug!("tile {:?} of {} unavailable: {}", coord, layer_id, e);
                        TileResult {
                            layer_id: layer_id.clone(),
                            coord,
                            data: Arc::new(PLACEHOLDER_TILE.to_vec()),
                            placeholder: true,
                        }
                    }
                };
                let _ = self.result_tx.send(result);
                future::ready(())
            })
            .await;

        signal.fire();
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            match self.fetcher.fetch(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt >= self.config.max_retries => return Err(e),
                Err(e) => {
                    attempt += 1;
                    log::debug!("retrying {} (attempt {}): {}", url, attempt, e);
                    retry_delay(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
            }
        }
    }

    /// Drain completed tiles (non-blocking)
    pub fn try_recv_results(&self) -> Vec<TileResult> {
        self.result_rx.try_iter().collect()
    }
}

#[cfg(feature = "tokio-runtime")]
async fn retry_delay(delay: Duration) {
    tokio::time::sleep(delay).await;
}

#[cfg(not(feature = "tokio-runtime"))]
async fn retry_delay(_delay: Duration) {}
