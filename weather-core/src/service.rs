//! Single entry point for weather lookups.

use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc, time::Duration};

use crate::{
    CacheBackend, CacheStatistics, ProviderConfiguration, WeatherError, WeatherObservation,
    assembler::{AssembledChain, ChainAssembler, ProviderLink},
    decorator::AuditSink,
    metrics::LatencySummary,
    provider::require_place,
};

/// Description of how the service was assembled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderInfo {
    pub cache_enabled: bool,
    pub cache_backend: Option<String>,
    pub cache_ttl: String,
    pub provider_order: Vec<String>,
    pub chain: String,
}

/// Resilience facade: owns the assembled chain for the lifetime of the process.
///
/// Construction fails with [`WeatherError::NoProvidersConfigured`] when no
/// provider in the configured order has credentials.
#[derive(Debug)]
pub struct WeatherService {
    config: ProviderConfiguration,
    chain: AssembledChain,
}

impl WeatherService {
    /// Build real adapters, cache backend and audit sink from `config`.
    pub async fn from_config(config: ProviderConfiguration) -> Result<Self, WeatherError> {
        let chain = ChainAssembler::new(&config).assemble()?;
        Ok(Self { config, chain })
    }

    /// Build around caller-supplied components. Adapters must already be in
    /// failover order; `cache` and `sink` are only used when the configuration
    /// enables caching and audit logging.
    ///
    /// Without a `cache`, the default in-memory backend spawns its sweeper on
    /// the current tokio runtime.
    pub async fn with_components(
        config: ProviderConfiguration,
        adapters: Vec<ProviderLink>,
        cache: Option<Arc<dyn CacheBackend>>,
        sink: Option<Arc<dyn AuditSink>>,
    ) -> Result<Self, WeatherError> {
        let mut assembler = ChainAssembler::new(&config);
        if let Some(cache) = cache {
            assembler = assembler.with_cache_backend(cache);
        }
        if let Some(sink) = sink {
            assembler = assembler.with_audit_sink(sink);
        }
        let chain = assembler.assemble_with(adapters)?;
        Ok(Self { config, chain })
    }

    /// Look up the current weather for `place`.
    ///
    /// Blank places are rejected before any cache or provider is consulted.
    /// This is the only point where `InvalidInput` is returned; failures
    /// reported by providers end in `AllProvidersFailed`.
    pub async fn query(&self, place: &str) -> Result<WeatherObservation, WeatherError> {
        let place = require_place(place)?;
        self.chain.provider.get_weather(place).await
    }

    pub fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            cache_enabled: self.config.cache.enabled,
            cache_backend: self.chain.cache.as_ref().map(|c| c.name().to_string()),
            cache_ttl: format_ttl(self.config.cache.ttl),
            provider_order: self.config.provider_order.iter().map(|id| id.to_string()).collect(),
            chain: self.chain.label(),
        }
    }

    pub fn cache_statistics(&self) -> Result<CacheStatistics, WeatherError> {
        self.chain.metrics().map(|m| m.snapshot()).ok_or(WeatherError::CacheNotEnabled)
    }

    pub fn cache_latencies(&self) -> Result<BTreeMap<String, LatencySummary>, WeatherError> {
        self.chain.metrics().map(|m| m.latencies()).ok_or(WeatherError::CacheNotEnabled)
    }

    /// Stop background cache maintenance. Queries still work afterwards.
    pub async fn shutdown(&self) {
        if let Some(cache) = &self.chain.cache {
            cache.shutdown().await;
        }
    }
}

/// Renders a TTL the way it is configured: whole minutes as `10m`, otherwise seconds.
fn format_ttl(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    if secs > 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else if ttl.subsec_millis() == 0 {
        format!("{secs}s")
    } else {
        format!("{}ms", ttl.as_millis())
    }
}
