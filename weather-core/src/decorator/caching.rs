use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::debug;

use crate::{CacheBackend, WeatherError, WeatherObservation, WeatherProvider, cache::cache_key};

/// Serves observations from a cache and fills it from the wrapped provider.
///
/// Only successful lookups are stored. Cache failures behave like misses.
#[derive(Debug)]
pub struct CachedProvider {
    inner: Arc<dyn WeatherProvider>,
    cache: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn WeatherProvider>, cache: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }
}

#[async_trait]
impl WeatherProvider for CachedProvider {
    async fn get_weather(&self, place: &str) -> Result<WeatherObservation, WeatherError> {
        let key = cache_key(place);

        match self.cache.get(&key).await {
            Ok(Some(observation)) => {
                debug!(key = %key, "cache hit");
                return Ok(observation);
            }
            Ok(None) => debug!(key = %key, "cache miss"),
            Err(err) => debug!(key = %key, error = %err, "cache lookup failed, treating as miss"),
        }

        let observation = self.inner.get_weather(place).await?;

        if let Err(err) = self.cache.set(&key, &observation, self.ttl).await {
            debug!(key = %key, error = %err, "cache store failed");
        }

        Ok(observation)
    }

    fn describe(&self) -> String {
        format!("cached[{}]({})", self.cache.name(), self.inner.describe())
    }
}
