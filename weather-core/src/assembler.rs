//! Builds the decorated failover chain from a [`ProviderConfiguration`].
//!
//! Layering, inside out: each adapter is wrapped for audit logging, the
//! adapters are linked into a [`FailoverChain`], and the chain is wrapped by
//! [`CachedProvider`] over an [`InstrumentedCache`].

use std::sync::Arc;
use tracing::info;

use crate::{
    CacheBackend, FailoverChain, MemoryCache, MetricsRecorder, ProviderConfiguration, ProviderId,
    RedisCache, WeatherError, WeatherProvider,
    cache::memory::SWEEP_INTERVAL,
    config::CacheBackendKind,
    decorator::{AuditSink, CachedProvider, FileAuditSink, InstrumentedCache, LoggedProvider},
    provider::provider_from_config,
};

pub type ProviderLink = (ProviderId, Arc<dyn WeatherProvider>);

/// Result of assembly: the outermost provider plus handles for introspection.
#[derive(Debug)]
pub struct AssembledChain {
    pub provider: Arc<dyn WeatherProvider>,
    /// Providers actually linked, in failover order.
    pub active_order: Vec<ProviderId>,
    pub cache: Option<Arc<InstrumentedCache>>,
}

impl AssembledChain {
    pub fn label(&self) -> String {
        self.provider.describe()
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsRecorder>> {
        self.cache.as_ref().map(|c| c.metrics())
    }
}

/// Source adapters for every provider in the configured order that has
/// credentials. Unconfigured providers never become chain nodes.
pub fn build_adapters(config: &ProviderConfiguration) -> Result<Vec<ProviderLink>, WeatherError> {
    let mut adapters = Vec::with_capacity(config.provider_order.len());
    for &id in &config.provider_order {
        if !config.has_credentials(id) {
            info!(provider = %id, "provider has no credentials, leaving it out of the chain");
            continue;
        }
        adapters.push((id, provider_from_config(id, config)?));
    }
    Ok(adapters)
}

#[derive(Debug)]
pub struct ChainAssembler<'a> {
    config: &'a ProviderConfiguration,
    sink: Option<Arc<dyn AuditSink>>,
    cache: Option<Arc<dyn CacheBackend>>,
}

impl<'a> ChainAssembler<'a> {
    pub fn new(config: &'a ProviderConfiguration) -> Self {
        Self { config, sink: None, cache: None }
    }

    /// Sink used when audit logging is enabled, instead of the configured file.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Backend used when caching is enabled, instead of the configured one.
    pub fn with_cache_backend(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Assemble from the adapters described by the configuration.
    ///
    /// Spawns the in-memory cache sweeper, so it must run inside a tokio runtime
    /// when the memory backend is selected.
    pub fn assemble(self) -> Result<AssembledChain, WeatherError> {
        let adapters = build_adapters(self.config)?;
        self.assemble_with(adapters)
    }

    /// Assemble from caller-supplied adapters, already in failover order.
    pub fn assemble_with(self, adapters: Vec<ProviderLink>) -> Result<AssembledChain, WeatherError> {
        if adapters.is_empty() {
            return Err(WeatherError::NoProvidersConfigured);
        }

        let sink = self.audit_sink();
        let links: Vec<ProviderLink> = adapters
            .into_iter()
            .map(|(id, adapter)| match &sink {
                Some(sink) => {
                    let logged: Arc<dyn WeatherProvider> =
                        Arc::new(LoggedProvider::new(id, adapter, sink.clone()));
                    (id, logged)
                }
                None => (id, adapter),
            })
            .collect();

        let chain = FailoverChain::new(links)?;
        let active_order = chain.order();
        let chain: Arc<dyn WeatherProvider> = Arc::new(chain);

        let (provider, cache) = match self.cache_backend()? {
            Some(backend) => {
                let metrics = Arc::new(MetricsRecorder::new(backend.name()));
                let instrumented = Arc::new(InstrumentedCache::new(backend, metrics));
                let cached: Arc<dyn WeatherProvider> = Arc::new(CachedProvider::new(
                    chain,
                    instrumented.clone(),
                    self.config.cache.ttl,
                ));
                (cached, Some(instrumented))
            }
            None => (chain, None),
        };

        info!(chain = %provider.describe(), "weather provider chain assembled");

        Ok(AssembledChain { provider, active_order, cache })
    }

    fn audit_sink(&self) -> Option<Arc<dyn AuditSink>> {
        if !self.config.logging.enabled {
            return None;
        }
        Some(match &self.sink {
            Some(sink) => sink.clone(),
            None => Arc::new(FileAuditSink::new(self.config.logging.path.clone())),
        })
    }

    fn cache_backend(&self) -> Result<Option<Arc<dyn CacheBackend>>, WeatherError> {
        if !self.config.cache.enabled {
            return Ok(None);
        }
        if let Some(cache) = &self.cache {
            return Ok(Some(cache.clone()));
        }

        let backend: Arc<dyn CacheBackend> = match self.config.cache.backend {
            CacheBackendKind::Memory => Arc::new(MemoryCache::with_sweeper(SWEEP_INTERVAL)),
            CacheBackendKind::Redis => {
                let url = self.config.cache.redis_url.as_deref().ok_or_else(|| {
                    WeatherError::Configuration("redis cache selected without redis_url".into())
                })?;
                Arc::new(RedisCache::new(url)?)
            }
        };
        Ok(Some(backend))
    }
}
