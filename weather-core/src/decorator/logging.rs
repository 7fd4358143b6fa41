use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::debug;

use crate::{ProviderId, WeatherError, WeatherObservation, WeatherProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditEvent {
    Request,
    Response,
    Error,
}

/// One line of the provider audit log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub provider: ProviderId,
    pub event: AuditEvent,
    pub place: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<WeatherObservation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEntry {
    fn new(provider: ProviderId, event: AuditEvent, place: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            provider,
            event,
            place: place.to_string(),
            observation: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn request(provider: ProviderId, place: &str) -> Self {
        Self::new(provider, AuditEvent::Request, place)
    }

    pub fn response(
        provider: ProviderId,
        place: &str,
        observation: &WeatherObservation,
        elapsed: Duration,
    ) -> Self {
        Self {
            observation: Some(observation.clone()),
            duration_ms: Some(millis(elapsed)),
            ..Self::new(provider, AuditEvent::Response, place)
        }
    }

    pub fn error(provider: ProviderId, place: &str, error: &WeatherError, elapsed: Duration) -> Self {
        Self {
            error: Some(error.to_string()),
            duration_ms: Some(millis(elapsed)),
            ..Self::new(provider, AuditEvent::Error, place)
        }
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to write audit log: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize audit entry: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync + Debug {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Appends entries as JSON lines to a file, creating it on first write.
#[derive(Debug)]
pub struct FileAuditSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Emits request/response/error audit entries around a single provider.
/// Sink failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct LoggedProvider {
    provider_id: ProviderId,
    inner: Arc<dyn WeatherProvider>,
    sink: Arc<dyn AuditSink>,
}

impl LoggedProvider {
    pub fn new(
        provider_id: ProviderId,
        inner: Arc<dyn WeatherProvider>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        Self { provider_id, inner, sink }
    }

    async fn emit(&self, entry: AuditEntry) {
        if let Err(err) = self.sink.record(&entry).await {
            debug!(provider = %self.provider_id, error = %err, "audit sink write failed");
        }
    }
}

#[async_trait]
impl WeatherProvider for LoggedProvider {
    async fn get_weather(&self, place: &str) -> Result<WeatherObservation, WeatherError> {
        self.emit(AuditEntry::request(self.provider_id, place)).await;

        let started = Instant::now();
        let result = self.inner.get_weather(place).await;
        let elapsed = started.elapsed();

        let entry = match &result {
            Ok(observation) => AuditEntry::response(self.provider_id, place, observation, elapsed),
            Err(err) => AuditEntry::error(self.provider_id, place, err, elapsed),
        };
        self.emit(entry).await;

        result
    }

    fn describe(&self) -> String {
        format!("logged({})", self.inner.describe())
    }
}
