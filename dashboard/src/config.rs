//! Configuration management for the dashboard.
//!
//! Loads configuration from environment variables with sensible defaults.
//! The backend URL and both API keys have no default: the dashboard cannot
//! do anything useful without them.

use dbr_auth::{GateConfig, IdentityConfig, SessionCookieConfig};
use reqwest::Url;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set (or is empty).
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// A URL variable could not be parsed.
    #[error("Invalid URL in {var}: {reason}")]
    InvalidUrl {
        /// Variable name
        var: &'static str,
        /// Parser message
        reason: String,
    },

    /// Host and port do not form a socket address.
    #[error("Invalid listen address {0}")]
    InvalidAddress(String),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Hosted backend (identity service + data API)
    pub backend: BackendConfig,
    /// Session and sign-in configuration
    pub auth: AuthConfig,
    /// Prometheus exporter configuration
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP`
    pub trust_proxy_headers: bool,
}

/// Backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project URL; the identity API is under `/auth/v1`, the data API under `/rest/v1`
    pub url: Url,
    /// Public (anon) key, sent with every request
    pub anon_key: String,
    /// Service-role key, used only for the admin overview and sign-up bookkeeping
    pub service_role_key: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Public URL of this dashboard, used to build emailed callback links
    pub app_url: String,
    /// Session cookie name; derived from the backend URL when unset
    pub cookie_name: Option<String>,
    /// Whether session cookies carry the `Secure` attribute
    pub cookie_secure: bool,
    /// Refresh access tokens expiring within this many seconds
    pub refresh_margin_secs: u64,
}

/// Metrics configuration
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether to start the Prometheus exporter
    pub enabled: bool,
    /// Exporter host
    pub host: String,
    /// Exporter port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `SUPABASE_URL`, `SUPABASE_ANON_KEY` or
    /// `SUPABASE_SERVICE_ROLE_KEY` is missing, or a URL is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        fn parse<T: std::str::FromStr>(v: Option<String>) -> Option<T> {
            v.and_then(|s| s.trim().parse().ok())
        }
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));

        let url_text = required("SUPABASE_URL")?;
        let url = Url::parse(url_text.trim()).map_err(|e| ConfigError::InvalidUrl {
            var: "SUPABASE_URL",
            reason: e.to_string(),
        })?;

        let app_url = var("APP_URL").unwrap_or_else(|| "http://localhost:3000".to_string());
        Url::parse(&app_url).map_err(|e| ConfigError::InvalidUrl {
            var: "APP_URL",
            reason: e.to_string(),
        })?;

        Ok(Self {
            server: ServerConfig {
                host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse(var("PORT")).unwrap_or(3000),
                static_dir: var("STATIC_DIR").map_or_else(|| PathBuf::from("static"), PathBuf::from),
                shutdown_timeout: parse(var("SHUTDOWN_TIMEOUT")).unwrap_or(30),
                trust_proxy_headers: parse(var("TRUST_PROXY_HEADERS")).unwrap_or(false),
            },
            backend: BackendConfig {
                url,
                anon_key: required("SUPABASE_ANON_KEY")?,
                service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
                timeout_secs: parse(var("BACKEND_TIMEOUT_SECS")).unwrap_or(5),
            },
            auth: AuthConfig {
                app_url: app_url.trim_end_matches('/').to_string(),
                cookie_name: var("AUTH_COOKIE_NAME"),
                cookie_secure: parse(var("AUTH_COOKIE_SECURE")).unwrap_or(true),
                refresh_margin_secs: parse(var("AUTH_REFRESH_MARGIN_SECS")).unwrap_or(10),
            },
            metrics: MetricsConfig {
                enabled: parse(var("METRICS_ENABLED")).unwrap_or(true),
                host: var("METRICS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse(var("METRICS_PORT")).unwrap_or(9090),
            },
        })
    }

    /// Address the HTTP server listens on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if host and port do not parse.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr(&self.server.host, self.server.port)
    }

    /// Address the metrics exporter listens on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if host and port do not parse.
    pub fn metrics_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr(&self.metrics.host, self.metrics.port)
    }

    /// Per-request backend timeout.
    #[must_use]
    pub const fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    /// Identity-service client configuration.
    #[must_use]
    pub fn identity_config(&self) -> IdentityConfig {
        IdentityConfig::new(self.backend.url.clone(), self.backend.anon_key.clone())
            .with_request_timeout(self.backend_timeout())
    }

    /// Session cookie configuration.
    #[must_use]
    pub fn cookie_config(&self) -> SessionCookieConfig {
        self.auth
            .cookie_name
            .clone()
            .map_or_else(
                || SessionCookieConfig::for_project(&self.backend.url),
                SessionCookieConfig::new,
            )
            .with_secure(self.auth.cookie_secure)
    }

    /// Gate configuration.
    #[must_use]
    pub const fn gate_config(&self) -> GateConfig {
        GateConfig::new()
            .with_refresh_margin(Duration::from_secs(self.auth.refresh_margin_secs))
            .with_backend_timeout(self.backend_timeout())
    }
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    format!("{host}:{port}")
        .parse()
        .map_err(|_| ConfigError::InvalidAddress(format!("{host}:{port}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("SUPABASE_URL", "https://abcd.supabase.co"),
        ("SUPABASE_ANON_KEY", "anon"),
        ("SUPABASE_SERVICE_ROLE_KEY", "service"),
    ];

    #[test]
    fn test_defaults() {
        let config = config_from(REQUIRED).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.backend.timeout_secs, 5);
        assert_eq!(config.auth.refresh_margin_secs, 10);
        assert!(config.auth.cookie_secure);
        assert!(!config.server.trust_proxy_headers);
        assert_eq!(config.metrics.port, 9090);
        assert_eq!(config.cookie_config().name, "sb-abcd-auth-token");
    }

    #[test]
    fn test_missing_keys_are_errors() {
        assert_eq!(
            config_from(&[("SUPABASE_URL", "https://abcd.supabase.co")]).unwrap_err(),
            ConfigError::Missing("SUPABASE_ANON_KEY")
        );
        assert_eq!(config_from(&[]).unwrap_err(), ConfigError::Missing("SUPABASE_URL"));
    }

    #[test]
    fn test_invalid_backend_url() {
        let err = config_from(&[
            ("SUPABASE_URL", "not a url"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { var: "SUPABASE_URL", .. }));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("PORT", "8080"),
            ("AUTH_COOKIE_NAME", "dbr-session"),
            ("AUTH_COOKIE_SECURE", "false"),
            ("APP_URL", "https://app.dbr.example/"),
            ("METRICS_ENABLED", "false"),
            ("TRUST_PROXY_HEADERS", "true"),
        ]);
        let config = config_from(&pairs).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.server.trust_proxy_headers);
        assert_eq!(config.auth.app_url, "https://app.dbr.example");
        assert!(!config.metrics.enabled);

        let cookie = config.cookie_config();
        assert_eq!(cookie.name, "dbr-session");
        assert!(!cookie.secure);
    }

    #[test]
    fn test_unparsable_number_falls_back_to_default() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));
        assert_eq!(config_from(&pairs).unwrap().server.port, 3000);
    }
}
