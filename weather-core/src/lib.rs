//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Source adapters for external weather providers
//! - An ordered failover chain across those providers
//! - Result caching (in-process or Redis) with hit/miss and latency metrics
//! - Audit logging of provider calls
//! - [`WeatherService`], the facade that assembles all of the above from configuration
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod assembler;
pub mod cache;
pub mod chain;
pub mod config;
pub mod decorator;
pub mod error;
pub mod metrics;
pub mod model;
pub mod provider;
pub mod service;

#[cfg(test)]
mod testing;

pub use cache::{CacheBackend, MemoryCache, RedisCache};
pub use chain::FailoverChain;
pub use config::{CacheBackendKind, Config, ProviderConfig, ProviderConfiguration};
pub use error::{CacheError, ErrorKind, WeatherError};
pub use metrics::{CacheStatistics, MetricsRecorder};
pub use model::WeatherObservation;
pub use provider::{ProviderId, WeatherProvider};
pub use service::{ProviderInfo, WeatherService};
