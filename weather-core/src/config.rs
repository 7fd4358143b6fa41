use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::provider::ProviderId;

/// Configuration for a single provider (API key and optional endpoint override).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Overrides the provider's public endpoint, e.g. for a proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub backend: CacheBackendKind,
    pub ttl_minutes: u64,
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackendKind::Memory,
            ttl_minutes: 10,
            redis_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { enabled: false, path: PathBuf::from("weather-providers.log") }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Failover order, e.g. `["openweather", "weatherapi"]`.
    pub provider_order: Vec<String>,

    /// Example TOML:
    /// [providers.openweather]
    /// api_key = "..."
    pub providers: HashMap<String, ProviderConfig>,

    pub cache: CacheConfig,

    pub logging: LoggingConfig,
}

/// Credentials for one provider after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub api_key: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub backend: CacheBackendKind,
    pub ttl: Duration,
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub enabled: bool,
    pub path: PathBuf,
}

/// Validated, immutable settings the resilience layer is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfiguration {
    /// Configured failover order. Providers without credentials stay listed
    /// here but are left out of the assembled chain.
    pub provider_order: Vec<ProviderId>,
    pub credentials: HashMap<ProviderId, ProviderCredentials>,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

impl ProviderConfiguration {
    /// Settings with no providers, in-memory caching and audit logging off.
    pub fn new(ttl: Duration) -> Self {
        Self {
            provider_order: Vec::new(),
            credentials: HashMap::new(),
            cache: CacheSettings {
                enabled: true,
                backend: CacheBackendKind::Memory,
                ttl,
                redis_url: None,
            },
            logging: LoggingSettings { enabled: false, path: LoggingConfig::default().path },
        }
    }

    /// Appends `id` to the failover order with the given key.
    pub fn with_provider(mut self, id: ProviderId, api_key: impl Into<String>) -> Self {
        if !self.provider_order.contains(&id) {
            self.provider_order.push(id);
        }
        self.credentials
            .insert(id, ProviderCredentials { api_key: api_key.into(), base_url: None });
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache.enabled = false;
        self
    }

    pub fn has_credentials(&self, id: ProviderId) -> bool {
        self.credentials.get(&id).is_some_and(|c| !c.api_key.trim().is_empty())
    }
}

impl Config {
    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Move `id` to the front of the failover order.
    pub fn promote_provider(&mut self, id: ProviderId) {
        self.provider_order.retain(|p| !p.eq_ignore_ascii_case(id.as_str()));
        self.provider_order.insert(0, id.as_str().to_string());
    }

    /// Replace the failover order wholesale.
    pub fn set_provider_order(&mut self, order: &[ProviderId]) {
        self.provider_order = order.iter().map(|id| id.as_str().to_string()).collect();
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set/replace a provider API key; a new provider is appended to the failover order.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        let base_url = self.provider_config(provider_id).and_then(|c| c.base_url.clone());
        self.providers
            .insert(provider_id.as_str().to_string(), ProviderConfig { api_key, base_url });

        if !self.provider_order.iter().any(|p| p.eq_ignore_ascii_case(provider_id.as_str())) {
            self.provider_order.push(provider_id.to_string());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers.get(provider_id.as_str()).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some_and(|k| !k.trim().is_empty())
    }

    /// Validate and convert into the settings the resilience layer runs on.
    pub fn resolve(&self) -> Result<ProviderConfiguration> {
        let mut provider_order = Vec::with_capacity(self.provider_order.len());
        for name in &self.provider_order {
            let id = ProviderId::try_from(name.as_str())?;
            if provider_order.contains(&id) {
                bail!("Provider '{id}' is listed more than once in provider_order");
            }
            provider_order.push(id);
        }

        let mut credentials = HashMap::new();
        for (name, provider) in &self.providers {
            let id = ProviderId::try_from(name.as_str())
                .with_context(|| format!("Invalid [providers.{name}] section"))?;
            if provider.api_key.trim().is_empty() {
                continue;
            }
            credentials.insert(
                id,
                ProviderCredentials {
                    api_key: provider.api_key.clone(),
                    base_url: provider.base_url.clone(),
                },
            );
        }

        if self.cache.enabled && self.cache.ttl_minutes == 0 {
            bail!("cache.ttl_minutes must be greater than zero when caching is enabled");
        }
        if self.cache.enabled
            && self.cache.backend == CacheBackendKind::Redis
            && self.cache.redis_url.as_deref().is_none_or(|u| u.trim().is_empty())
        {
            bail!("cache.redis_url is required when cache.backend = \"redis\"");
        }
        if self.logging.enabled && self.logging.path.as_os_str().is_empty() {
            bail!("logging.path is required when logging is enabled");
        }

        Ok(ProviderConfiguration {
            provider_order,
            credentials,
            cache: CacheSettings {
                enabled: self.cache.enabled,
                backend: self.cache.backend,
                ttl: Duration::from_secs(self.cache.ttl_minutes * 60),
                redis_url: self.cache.redis_url.clone(),
            },
            logging: LoggingSettings {
                enabled: self.logging.enabled,
                path: self.logging.path.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn default_config_has_no_providers() {
        let cfg = Config::default();
        assert!(cfg.provider_order.is_empty());
        assert!(!cfg.is_provider_configured(ProviderId::OpenWeather));
    }

    #[test]
    fn set_api_key_appends_to_order() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());

        assert_eq!(cfg.provider_order, vec!["openweather"]);

        let key = cfg.provider_api_key(ProviderId::OpenWeather);
        assert_eq!(key, Some("OPEN_KEY"));
        assert!(cfg.is_provider_configured(ProviderId::OpenWeather));
    }

    #[test]
    fn upsert_keeps_existing_order() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());
        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "WEATHER_KEY".into());
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "NEW_KEY".into());

        assert_eq!(cfg.provider_order, vec!["openweather", "weatherapi"]);
        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("NEW_KEY"));
    }

    #[test]
    fn promote_provider_moves_to_front() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());
        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "WEATHER_KEY".into());

        cfg.promote_provider(ProviderId::WeatherApi);

        assert_eq!(cfg.provider_order, vec!["weatherapi", "openweather"]);
    }

    #[test]
    fn resolve_keeps_order_and_drops_blank_keys() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "WA".into());
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "   ".into());

        let resolved = cfg.resolve().expect("valid config");
        assert_eq!(resolved.provider_order, vec![ProviderId::WeatherApi, ProviderId::OpenWeather]);
        assert!(resolved.has_credentials(ProviderId::WeatherApi));
        assert!(!resolved.has_credentials(ProviderId::OpenWeather));
        assert_eq!(resolved.cache.ttl, Duration::from_secs(600));
    }

    #[test]
    fn resolve_rejects_invalid_settings() {
        let mut cfg = Config::default();
        cfg.provider_order = vec!["openweather".into(), "OpenWeather".into()];
        assert!(cfg.resolve().unwrap_err().to_string().contains("more than once"));

        let mut cfg = Config::default();
        cfg.provider_order = vec!["darksky".into()];
        assert!(cfg.resolve().unwrap_err().to_string().contains("Unknown provider"));

        let mut cfg = Config::default();
        cfg.cache.ttl_minutes = 0;
        assert!(cfg.resolve().is_err());

        let mut cfg = Config::default();
        cfg.cache.backend = CacheBackendKind::Redis;
        assert!(cfg.resolve().unwrap_err().to_string().contains("redis_url"));
    }

    #[test]
    fn toml_roundtrip_through_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());
        cfg.cache.backend = CacheBackendKind::Redis;
        cfg.cache.redis_url = Some("redis://127.0.0.1:6379".into());
        cfg.logging.enabled = true;
        cfg.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.provider_order, vec!["openweather"]);
        assert_eq!(loaded.cache.backend, CacheBackendKind::Redis);
        assert!(loaded.logging.enabled);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            provider_order = ["weatherapi"]

            [providers.weatherapi]
            api_key = "abc"

            [cache]
            ttl_minutes = 5
            "#,
        )
        .expect("parse");

        assert!(cfg.cache.enabled);
        assert_eq!(cfg.cache.backend, CacheBackendKind::Memory);
        assert!(!cfg.logging.enabled);
        let resolved = cfg.resolve().expect("valid");
        assert_eq!(resolved.cache.ttl, Duration::from_secs(300));
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from(&dir.path().join("absent.toml")).expect("default");
        assert!(cfg.provider_order.is_empty());
    }
}
