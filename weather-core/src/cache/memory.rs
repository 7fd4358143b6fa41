use async_trait::async_trait;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::debug;

use crate::{CacheError, WeatherObservation};

use super::CacheBackend;

/// How often the background sweeper drops expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: WeatherObservation,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

type Entries = Arc<Mutex<HashMap<String, CacheEntry>>>;

/// In-process cache. Expired entries read as misses and are removed by a
/// periodic sweeper; both use the tokio clock.
#[derive(Debug)]
pub struct MemoryCache {
    entries: Entries,
    sweeper: Mutex<Option<Sweeper>>,
}

#[derive(Debug)]
struct Sweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    /// Cache without a background sweeper; expired entries are only dropped on read.
    pub fn new() -> Self {
        Self { entries: Arc::new(Mutex::new(HashMap::new())), sweeper: Mutex::new(None) }
    }

    /// Cache with a sweeper running every `interval`. Must be called inside a tokio runtime.
    pub fn with_sweeper(interval: Duration) -> Self {
        let cache = Self::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let entries = cache.entries.clone();
        let handle = tokio::spawn(sweep_loop(entries, interval, shutdown_rx));

        *cache.sweeper.lock() = Some(Sweeper { shutdown_tx, handle });
        cache
    }

    /// Remove every expired entry now. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        sweep(&self.entries)
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper.lock().as_ref().is_some_and(|s| !s.handle.is_finished())
    }
}

fn sweep(entries: &Entries) -> usize {
    let now = Instant::now();
    let mut map = entries.lock();
    let before = map.len();
    map.retain(|_, entry| !entry.is_expired(now));
    before - map.len()
}

async fn sweep_loop(entries: Entries, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = sweep(&entries);
                if removed > 0 {
                    debug!(removed, "swept expired cache entries");
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("cache sweeper stopped");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<WeatherObservation>, CacheError> {
        let now = Instant::now();
        let map = self.entries.lock();
        Ok(map
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.payload.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: &WeatherObservation,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry { payload: value.clone(), expires_at: Instant::now() + ttl };
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.lock().clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn shutdown(&self) {
        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            let _ = sweeper.shutdown_tx.send(true);
            let _ = sweeper.handle.await;
        }
    }
}

impl Drop for MemoryCache {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().take() {
            let _ = sweeper.shutdown_tx.send(true);
        }
    }
}
