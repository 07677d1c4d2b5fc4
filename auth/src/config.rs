//! Authentication configuration.
//!
//! Values are supplied by the application (see the dashboard's `Config`);
//! nothing here reads the environment.

use crate::constants::{DEFAULT_BACKEND_TIMEOUT, DEFAULT_REFRESH_MARGIN};
use reqwest::Url;
use std::time::Duration;

/// Connection settings for the identity service.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Project base URL (e.g., `https://abcd.supabase.co`). The identity API
    /// lives under `/auth/v1`.
    pub base_url: Url,

    /// Public (anon) API key, sent as the `apikey` header.
    pub api_key: String,

    /// Timeout applied to every HTTP request.
    ///
    /// Default: 5 seconds
    pub request_timeout: Duration,
}

impl IdentityConfig {
    /// Create identity-service configuration.
    #[must_use]
    pub const fn new(base_url: Url, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            request_timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Session cookie naming and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookieConfig {
    /// Base cookie name. Chunks are named `{name}.0`, `{name}.1`, ...
    pub name: String,

    /// Whether to set the `Secure` attribute.
    ///
    /// Default: true
    pub secure: bool,
}

impl SessionCookieConfig {
    /// Create cookie configuration with an explicit name.
    #[must_use]
    pub const fn new(name: String) -> Self {
        Self { name, secure: true }
    }

    /// Derive the cookie name from the project URL: `sb-<project-ref>-auth-token`,
    /// where the project ref is the first label of the host.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dbr_auth::config::SessionCookieConfig;
    /// let url = reqwest::Url::parse("https://abcdefgh.supabase.co").unwrap();
    /// assert_eq!(SessionCookieConfig::for_project(&url).name, "sb-abcdefgh-auth-token");
    /// ```
    #[must_use]
    pub fn for_project(base_url: &Url) -> Self {
        let project_ref = base_url
            .host_str()
            .and_then(|host| host.split('.').next())
            .filter(|label| !label.is_empty())
            .unwrap_or("local");
        Self::new(format!("sb-{project_ref}-auth-token"))
    }

    /// Set the `Secure` attribute.
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
}

/// Gate behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Access tokens expiring within this window are refreshed first.
    ///
    /// Default: 10 seconds
    pub refresh_margin: Duration,

    /// Upper bound on each identity-service call the gate makes.
    ///
    /// Default: 5 seconds
    pub backend_timeout: Duration,
}

impl GateConfig {
    /// Create gate configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Set the refresh margin.
    #[must_use]
    pub const fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Set the backend timeout.
    #[must_use]
    pub const fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_name_from_local_url() {
        let url = Url::parse("http://localhost:54321").unwrap();
        assert_eq!(
            SessionCookieConfig::for_project(&url).name,
            "sb-localhost-auth-token"
        );
    }

    #[test]
    fn test_gate_config_builder() {
        let config = GateConfig::new()
            .with_refresh_margin(Duration::from_secs(30))
            .with_backend_timeout(Duration::from_secs(2));
        assert_eq!(config.refresh_margin, Duration::from_secs(30));
        assert_eq!(config.backend_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_identity_config_defaults() {
        let config = IdentityConfig::new(
            Url::parse("https://abcd.supabase.co").unwrap(),
            "anon".to_string(),
        );
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }
}
