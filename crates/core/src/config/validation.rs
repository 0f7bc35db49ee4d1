//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;
use url::Url;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

/// `path` starts with a single `/` and resolves against `origin` without
/// leaving it. Rejects protocol-relative `//host/...` entries.
fn is_same_origin_path(origin: &Url, path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && origin
            .join(path)
            .is_ok_and(|joined| joined.origin() == origin.origin())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `version` or `third_party_host` is
    /// empty, and `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL with a host
    /// - an `app_shell` entry or `root_document` is not an absolute path on
    ///   the origin
    /// - a `warm_urls` entry is not an absolute http(s) URL
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "version".into(),
                hint: "Set SWCACHE_VERSION to the cache generation name".into(),
            });
        }

        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") || origin.host_str().is_none() {
            return Err(invalid("origin", "must be an http(s) URL with a host"));
        }

        if let Some(entry) = self.app_shell.iter().find(|p| !is_same_origin_path(&origin, p)) {
            return Err(invalid("app_shell", format!("entry must be an absolute path on the origin: {entry}")));
        }

        if !is_same_origin_path(&origin, &self.root_document) {
            return Err(invalid("root_document", "must be an absolute path on the origin"));
        }

        if self.third_party_host.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "third_party_host".into(),
                hint: "Set SWCACHE_THIRD_PARTY_HOST to the CDN hostname".into(),
            });
        }

        for entry in &self.warm_urls {
            let url = Url::parse(entry).map_err(|e| invalid("warm_urls", format!("{entry}: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(invalid("warm_urls", format!("unsupported scheme: {entry}")));
            }
            if !url.host_str().is_some_and(|h| h.contains(self.third_party_host.as_str())) {
                tracing::warn!(
                    url = %entry,
                    third_party_host = %self.third_party_host,
                    "warm URL is outside the third-party host; \
                     it will be stored but never served from cache"
                );
            }
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        Ok(())
    }
}
