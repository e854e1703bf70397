//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/waitwatch.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/waitwatch.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_park")]
    pub park: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Upper bound for one fetch, connect included
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            park: default_park(),
            language: default_language(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.wartezeiten.app".to_string()
}

fn default_park() -> String {
    "phantasialand".to_string()
}

fn default_language() -> String {
    "de".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// JSON document backing the key-value store
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: default_storage_path() }
    }
}

fn default_storage_path() -> String {
    "data/waitwatch.json".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CacheConfig {
    /// Serve a cache entry younger than this without a network call
    /// on non-forced fetches. Unset disables the freshness window.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Append fired notifications to this JSONL file (log only when unset)
    #[serde(default)]
    pub notifications_file: Option<String>,
    /// Prometheus metrics HTTP port for `watch` (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            notifications_file: None,
            metrics_port: 0,
        }
    }
}

fn default_check_interval_secs() -> u64 {
    15 * 60
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    api_base_url: String,
    api_park: String,
    api_language: String,
    api_timeout_ms: u64,
    storage_path: String,
    cache_ttl_secs: Option<u64>,
    check_interval_secs: u64,
    notifications_file: Option<String>,
    metrics_port: u16,
    log_json: bool,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            api_base_url: toml_config.api.base_url.trim_end_matches('/').to_string(),
            api_park: toml_config.api.park,
            api_language: toml_config.api.language,
            api_timeout_ms: toml_config.api.timeout_ms,
            storage_path: toml_config.storage.path,
            cache_ttl_secs: toml_config.cache.ttl_secs,
            check_interval_secs: toml_config.alerts.check_interval_secs,
            notifications_file: toml_config.alerts.notifications_file,
            metrics_port: toml_config.alerts.metrics_port,
            log_json: toml_config.logging.json,
            config_file,
        }
    }

    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        DEFAULT_CONFIG_PATH.to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load configuration - tries the TOML file first, falls back to defaults.
    /// The load error is handed back so it can be logged once logging is up.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> (Self, Option<anyhow::Error>) {
        match Self::from_file(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Full URL of the wait-time endpoint
    pub fn waittimes_url(&self) -> String {
        format!("{}/v1/waitingtimes", self.api_base_url)
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn api_park(&self) -> &str {
        &self.api_park
    }

    pub fn api_language(&self) -> &str {
        &self.api_language
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }

    pub fn storage_path(&self) -> &str {
        &self.storage_path
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn notifications_file(&self) -> Option<&str> {
        self.notifications_file.as_deref()
    }

    pub fn metrics_port(&self) -> u16 {
        self.metrics_port
    }

    pub fn log_json(&self) -> bool {
        self.log_json
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to point the client at a local server
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.api_base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), "https://api.wartezeiten.app");
        assert_eq!(config.api_park(), "phantasialand");
        assert_eq!(config.api_language(), "de");
        assert_eq!(config.api_timeout(), Duration::from_secs(10));
        assert_eq!(config.check_interval(), Duration::from_secs(900));
        assert_eq!(config.cache_ttl(), None);
        assert_eq!(config.notifications_file(), None);
        assert!(!config.log_json());
        assert_eq!(config.config_file(), "default");
    }

    #[test]
    fn test_waittimes_url() {
        let config = Config::default().with_base_url("http://127.0.0.1:8080/");
        assert_eq!(config.waittimes_url(), "http://127.0.0.1:8080/v1/waitingtimes");
    }

    #[test]
    fn test_partial_toml_uses_section_defaults() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
[api]
park = "europapark"

[cache]
ttl_secs = 300
"#,
        )
        .unwrap();
        let config = Config::from_toml(toml_config, "inline".to_string());
        assert_eq!(config.api_park(), "europapark");
        assert_eq!(config.api_language(), "de");
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(300)));
        assert_eq!(config.storage_path(), "data/waitwatch.json");
    }

    #[test]
    fn test_check_interval_never_zero() {
        let toml_config: TomlConfig = toml::from_str("[alerts]\ncheck_interval_secs = 0\n").unwrap();
        let config = Config::from_toml(toml_config, "inline".to_string());
        assert_eq!(config.check_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_resolve_config_path_from_arg() {
        let args: Vec<String> =
            vec!["waitwatch".to_string(), "--config".to_string(), "config/park.toml".to_string()];
        assert_eq!(Config::resolve_config_path(&args), "config/park.toml");
    }

    #[test]
    fn test_resolve_config_path_from_arg_equals() {
        let args: Vec<String> = vec!["waitwatch".to_string(), "--config=config/other.toml".to_string()];
        assert_eq!(Config::resolve_config_path(&args), "config/other.toml");
    }
}
