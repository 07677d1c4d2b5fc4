//! Application state for the dashboard HTTP server.
//!
//! Contains all shared resources needed by HTTP handlers:
//! - Session store (which owns the identity provider)
//! - Data store (for profile, tenant and admin queries)
//! - Settings derived from configuration
//!
//! Both backends are built once in `main` and shared through [`Arc`].

use crate::config::Config;
use crate::store::DataStore;
use dbr_auth::policy::encode_return_path;
use dbr_auth::{IdentityProvider, SessionStore};
use dbr_web::ProxyHeaders;
use std::sync::Arc;

/// Settings handlers need at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    /// Public URL of the dashboard, without a trailing slash
    pub app_url: String,
    /// Whether logged client IPs come from proxy headers
    pub proxy_headers: ProxyHeaders,
}

impl AppSettings {
    /// Settings with the given public URL.
    #[must_use]
    pub fn new(app_url: impl Into<String>) -> Self {
        let app_url: String = app_url.into();
        Self {
            app_url: app_url.trim_end_matches('/').to_string(),
            proxy_headers: ProxyHeaders::Ignore,
        }
    }

    /// Trust `X-Forwarded-For` / `X-Real-IP` for logged client IPs.
    #[must_use]
    pub const fn with_proxy_headers(mut self, proxy_headers: ProxyHeaders) -> Self {
        self.proxy_headers = proxy_headers;
        self
    }

    /// Settings from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.auth.app_url.clone())
            .with_proxy_headers(ProxyHeaders::from_trusted(config.server.trust_proxy_headers))
    }

    /// URL emailed links return to, optionally carrying a post-sign-in path.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dbr_dashboard::server::AppSettings;
    /// let settings = AppSettings::new("https://app.dbr.example/");
    /// assert_eq!(settings.callback_url(None), "https://app.dbr.example/login/callback");
    /// assert_eq!(
    ///     settings.callback_url(Some("/onboarding")),
    ///     "https://app.dbr.example/login/callback?next=/onboarding"
    /// );
    /// ```
    #[must_use]
    pub fn callback_url(&self, next: Option<&str>) -> String {
        match next {
            Some(next) => format!("{}/login/callback?next={}", self.app_url, encode_return_path(next)),
            None => format!("{}/login/callback", self.app_url),
        }
    }
}

/// Application state shared across all HTTP handlers.
///
/// Cloned (cheaply, via `Arc`) for each request.
pub struct AppState<I, D> {
    /// Session store; also the way to reach the identity provider
    pub sessions: Arc<SessionStore<I>>,
    /// Data API client
    pub store: Arc<D>,
    /// Request-time settings
    pub settings: Arc<AppSettings>,
}

impl<I, D> Clone for AppState<I, D> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            store: Arc::clone(&self.store),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<I: IdentityProvider, D: DataStore> AppState<I, D> {
    /// Create a new application state.
    #[must_use]
    pub fn new(sessions: Arc<SessionStore<I>>, store: Arc<D>, settings: AppSettings) -> Self {
        Self {
            sessions,
            store,
            settings: Arc::new(settings),
        }
    }

    /// The identity provider.
    #[must_use]
    pub fn identity(&self) -> &I {
        self.sessions.provider()
    }
}
