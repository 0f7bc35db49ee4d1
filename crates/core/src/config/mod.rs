//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Shell entries precached on install unless configured otherwise.
pub const DEFAULT_APP_SHELL: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.webmanifest",
    "/sw.js",
    "/icons/icon-192.png",
    "/icons/icon-512.png",
    "/icons/icon-512-maskable.png",
];

/// Third-party scripts warmed on install unless configured otherwise.
pub const DEFAULT_WARM_URLS: &[&str] = &[
    "https://cdnjs.cloudflare.com/ajax/libs/jspdf/2.5.1/jspdf.umd.min.js",
    "https://cdnjs.cloudflare.com/ajax/libs/jspdf-autotable/3.5.31/jspdf.plugin.autotable.min.js",
];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the active cache generation.
    ///
    /// Changing it invalidates every older generation on the next activation.
    /// Set via SWCACHE_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Serving origin of the application shell (scheme, host, port).
    ///
    /// Set via SWCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Same-origin paths precached on install, in order.
    ///
    /// Set via SWCACHE_APP_SHELL environment variable (array syntax).
    #[serde(default = "default_app_shell")]
    pub app_shell: Vec<String>,

    /// Third-party URLs fetched and stored on install.
    ///
    /// Set via SWCACHE_WARM_URLS environment variable (array syntax).
    #[serde(default = "default_warm_urls")]
    pub warm_urls: Vec<String>,

    /// Host served with stale-while-revalidate (substring match on hostname).
    ///
    /// Set via SWCACHE_THIRD_PARTY_HOST environment variable.
    #[serde(default = "default_third_party_host")]
    pub third_party_host: String,

    /// Shell entry page returned when a navigation fails.
    ///
    /// Set via SWCACHE_ROOT_DOCUMENT environment variable.
    #[serde(default = "default_root_document")]
    pub root_document: String,

    /// Path to SQLite cache storage.
    ///
    /// Set via SWCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    ///
    /// Set via SWCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via SWCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network request timeout in milliseconds.
    ///
    /// Set via SWCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_version() -> String {
    "decide-creator-v1.0.0".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_app_shell() -> Vec<String> {
    DEFAULT_APP_SHELL.iter().map(|s| s.to_string()).collect()
}

fn default_warm_urls() -> Vec<String> {
    DEFAULT_WARM_URLS.iter().map(|s| s.to_string()).collect()
}

fn default_third_party_host() -> String {
    "cdnjs.cloudflare.com".into()
}

fn default_root_document() -> String {
    "/index.html".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swcache.sqlite")
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            origin: default_origin(),
            app_shell: default_app_shell(),
            warm_urls: default_warm_urls(),
            third_party_host: default_third_party_host(),
            root_document: default_root_document(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed serving origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWCACHE_`
    /// 2. TOML file from `SWCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.version, "decide-creator-v1.0.0");
        assert_eq!(config.origin, "http://localhost:8080");
        assert_eq!(config.app_shell.len(), 7);
        assert_eq!(config.app_shell[0], "/");
        assert_eq!(config.app_shell[1], "/index.html");
        assert_eq!(config.warm_urls.len(), 2);
        assert_eq!(config.third_party_host, "cdnjs.cloudflare.com");
        assert_eq!(config.root_document, "/index.html");
        assert_eq!(config.db_path, PathBuf::from("./swcache.sqlite"));
        assert_eq!(config.user_agent, "swcache/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_origin_url() {
        let config = AppConfig { origin: "https://app.example:8443".into(), ..Default::default() };
        let origin = config.origin_url().unwrap();
        assert_eq!(origin.host_str(), Some("app.example"));
        assert_eq!(origin.port(), Some(8443));
    }

    #[test]
    fn test_origin_url_invalid() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert!(matches!(config.origin_url(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_config_from_toml_provider() {
        let toml = r#"
            version = "shell-v2"
            origin = "https://app.example"
            app_shell = ["/", "/index.html"]
            warm_urls = []
        "#;
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap();
        assert_eq!(config.version, "shell-v2");
        assert_eq!(config.app_shell, vec!["/".to_string(), "/index.html".to_string()]);
        assert!(config.warm_urls.is_empty());
        assert_eq!(config.third_party_host, "cdnjs.cloudflare.com");
    }
}
