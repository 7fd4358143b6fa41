//! Key/value storage for observations with per-entry expiration.

use async_trait::async_trait;
use std::{fmt::Debug, time::Duration};

use crate::{CacheError, WeatherObservation};

pub mod distributed;
pub mod memory;

pub use distributed::RedisCache;
pub use memory::MemoryCache;

const KEY_PREFIX: &str = "weather:";

/// Cache key for a place. Independent of the provider that served the value.
pub fn cache_key(place: &str) -> String {
    format!("{KEY_PREFIX}{}", place.trim().to_lowercase())
}

#[async_trait]
pub trait CacheBackend: Send + Sync + Debug {
    /// `Ok(None)` is a miss, including entries that have expired.
    async fn get(&self, key: &str) -> Result<Option<WeatherObservation>, CacheError>;

    async fn set(
        &self,
        key: &str,
        value: &WeatherObservation,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    /// Backend label used in statistics, e.g. `memory`.
    fn name(&self) -> &'static str;

    /// Stop background work owned by the backend.
    async fn shutdown(&self) {}
}
