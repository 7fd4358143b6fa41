use async_trait::async_trait;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{CacheBackend, CacheError, MetricsRecorder, WeatherObservation};

/// Records hit/miss counts and per-operation latency for a cache backend.
/// A failed lookup counts as a miss.
#[derive(Debug)]
pub struct InstrumentedCache {
    inner: Arc<dyn CacheBackend>,
    metrics: Arc<MetricsRecorder>,
}

impl InstrumentedCache {
    pub fn new(inner: Arc<dyn CacheBackend>, metrics: Arc<MetricsRecorder>) -> Self {
        Self { inner, metrics }
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }
}

#[async_trait]
impl CacheBackend for InstrumentedCache {
    async fn get(&self, key: &str) -> Result<Option<WeatherObservation>, CacheError> {
        let started = Instant::now();
        let result = self.inner.get(key).await;
        self.metrics.record_latency("get", started.elapsed());

        match &result {
            Ok(Some(_)) => self.metrics.record_hit(),
            Ok(None) | Err(_) => self.metrics.record_miss(),
        }
        result
    }

    async fn set(
        &self,
        key: &str,
        value: &WeatherObservation,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let started = Instant::now();
        let result = self.inner.set(key, value, ttl).await;
        self.metrics.record_latency("set", started.elapsed());
        result
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let started = Instant::now();
        let result = self.inner.delete(key).await;
        self.metrics.record_latency("delete", started.elapsed());
        result
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let started = Instant::now();
        let result = self.inner.clear().await;
        self.metrics.record_latency("clear", started.elapsed());
        result
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn shutdown(&self) {
        self.inner.shutdown().await;
    }
}
