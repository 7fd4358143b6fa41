//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use crate::{
    CacheBackend, CacheError, WeatherError, WeatherObservation, WeatherProvider,
    decorator::{AuditEntry, AuditError, AuditSink},
};

#[derive(Debug)]
pub struct FakeProvider {
    name: String,
    result: Mutex<Result<WeatherObservation, WeatherError>>,
    calls: AtomicUsize,
}

impl FakeProvider {
    /// Always answers with an observation whose description is `name`.
    pub fn ok(name: &str, temperature: f64) -> Arc<Self> {
        let obs = WeatherObservation::new(temperature, 50.0, name).expect("valid observation");
        Arc::new(Self { name: name.into(), result: Mutex::new(Ok(obs)), calls: AtomicUsize::new(0) })
    }

    pub fn failing(name: &str, err: WeatherError) -> Arc<Self> {
        Arc::new(Self { name: name.into(), result: Mutex::new(Err(err)), calls: AtomicUsize::new(0) })
    }

    pub fn set_result(&self, result: Result<WeatherObservation, WeatherError>) {
        *self.result.lock() = result;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for FakeProvider {
    async fn get_weather(&self, _place: &str) -> Result<WeatherObservation, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().clone()
    }

    fn describe(&self) -> String {
        format!("fake({})", self.name)
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct BrokenSink;

#[async_trait]
impl AuditSink for BrokenSink {
    async fn record(&self, _entry: &AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Io(std::io::Error::other("disk full")))
    }
}

/// Cache backend whose every operation fails.
#[derive(Debug, Default)]
pub struct UnreachableCache;

fn unreachable() -> CacheError {
    CacheError::Backend(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "connection refused",
    )))
}

#[async_trait]
impl CacheBackend for UnreachableCache {
    async fn get(&self, _key: &str) -> Result<Option<WeatherObservation>, CacheError> {
        Err(unreachable())
    }

    async fn set(
        &self,
        _key: &str,
        _value: &WeatherObservation,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Err(unreachable())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(unreachable())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Err(unreachable())
    }

    fn name(&self) -> &'static str {
        "unreachable"
    }
}
