//! Session store adapter.
//!
//! Turns the cookies of an incoming request into a [`SessionPresence`],
//! refreshing the token pair with the identity service when it is about to
//! expire. Absence and outages are values, never errors: the gate decides
//! what they mean.
//!
//! # Flow
//!
//! ```text
//! cookie? ──no──▶ Absent(NoCookie)
//!   │
//! decode ──err──▶ Absent(MalformedCookie)        + remove cookies
//!   │
//! expiring? ─yes─▶ refresh ──rejected, expired──▶ Absent(Expired) + remove cookies
//!   │                 │ rotated                            + write cookies
//!   │                 │ rejected, still live               (no mutation)
//!   ▼                 ▼
//! get_user ──rejected──▶ Absent(Rejected)         + remove cookies
//!   │
//!   ▼
//! Active(SessionContext)
//! ```
//!
//! A transport failure, 5xx or timeout at either backend call yields
//! `Unavailable`, keeping whatever cookie mutations were already produced.

use crate::config::GateConfig;
use crate::cookies::{CookieSet, SessionCookies};
use crate::error::{AuthError, Result};
use crate::providers::IdentityProvider;
use crate::state::{Session, SessionContext};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Why a request has no usable session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbsenceReason {
    /// No session cookie was sent.
    NoCookie,
    /// A session cookie was sent but could not be decoded.
    MalformedCookie,
    /// The refresh token was rejected.
    Expired,
    /// The access token was rejected.
    Rejected,
}

impl AbsenceReason {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoCookie => "no_cookie",
            Self::MalformedCookie => "malformed_cookie",
            Self::Expired => "expired",
            Self::Rejected => "rejected",
        }
    }
}

/// Outcome of reading a request's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPresence {
    /// The identity service vouched for the session.
    Active(SessionContext),
    /// There is no usable session.
    Absent(AbsenceReason),
    /// The identity service could not be asked.
    Unavailable(String),
}

impl SessionPresence {
    /// Returns `true` for [`SessionPresence::Active`].
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// The session context, if active.
    #[must_use]
    pub const fn context(&self) -> Option<&SessionContext> {
        match self {
            Self::Active(context) => Some(context),
            Self::Absent(_) | Self::Unavailable(_) => None,
        }
    }

    /// Consume into the session context, if active.
    #[must_use]
    pub fn into_context(self) -> Option<SessionContext> {
        match self {
            Self::Active(context) => Some(context),
            Self::Absent(_) | Self::Unavailable(_) => None,
        }
    }

    /// Label used in logs and metrics: `active`, `unavailable` or the
    /// absence reason.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Active(_) => "active",
            Self::Absent(reason) => reason.as_str(),
            Self::Unavailable(_) => "unavailable",
        }
    }

    /// The error a caller that requires a session would report.
    #[must_use]
    pub fn error(&self) -> Option<AuthError> {
        match self {
            Self::Active(_) => None,
            Self::Absent(AbsenceReason::NoCookie | AbsenceReason::Rejected) => Some(AuthError::NoSession),
            Self::Absent(AbsenceReason::MalformedCookie) => Some(AuthError::MalformedCookie),
            Self::Absent(AbsenceReason::Expired) => Some(AuthError::SessionExpired),
            Self::Unavailable(reason) => Some(AuthError::ServiceUnavailable(reason.clone())),
        }
    }
}

/// Session presence plus the cookie mutations produced while determining it.
#[derive(Debug, Clone)]
pub struct SessionRefresh {
    /// What the request's session turned out to be.
    pub presence: SessionPresence,
    /// Mutations to attach to whatever response is sent.
    pub cookies: CookieSet,
}

impl SessionRefresh {
    fn new(presence: SessionPresence, cookies: CookieSet) -> Self {
        Self { presence, cookies }
    }
}

/// Reads, refreshes and writes sessions stored in cookies.
#[derive(Debug)]
pub struct SessionStore<P> {
    provider: Arc<P>,
    cookies: SessionCookies,
    refresh_margin: Duration,
    timeout: Duration,
}

impl<P: IdentityProvider> SessionStore<P> {
    /// Create a session store backed by `provider`.
    #[must_use]
    pub const fn new(provider: Arc<P>, cookies: SessionCookies, config: GateConfig) -> Self {
        Self {
            provider,
            cookies,
            refresh_margin: config.refresh_margin,
            timeout: config.backend_timeout,
        }
    }

    /// The identity provider.
    #[must_use]
    pub const fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// The cookie codec.
    #[must_use]
    pub const fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    /// Determine the session carried by `jar`, refreshing it if needed.
    pub async fn refresh(&self, jar: &CookieJar) -> SessionRefresh {
        let session = match self.cookies.load(jar) {
            Ok(Some(session)) => session,
            Ok(None) => {
                return SessionRefresh::new(
                    SessionPresence::Absent(AbsenceReason::NoCookie),
                    CookieSet::new(),
                );
            }
            Err(_) => {
                return SessionRefresh::new(
                    SessionPresence::Absent(AbsenceReason::MalformedCookie),
                    self.cookies.clear(jar),
                );
            }
        };

        let mut cookies = CookieSet::new();
        let session = if session.expires_within(self.refresh_margin, Utc::now()) {
            match self.call(self.provider.refresh_session(&session.refresh_token)).await {
                Ok(Some(rotated)) => {
                    match self.cookies.write(&rotated, jar) {
                        Ok(written) => cookies.extend(written),
                        Err(e) => {
                            return SessionRefresh::new(SessionPresence::Unavailable(e.to_string()), cookies);
                        }
                    }
                    rotated
                }
                // A spent refresh token does not end a session whose access
                // token is still live; the user lookup below decides.
                Ok(None) if session.expires_at > Utc::now() => session,
                Ok(None) => {
                    return SessionRefresh::new(
                        SessionPresence::Absent(AbsenceReason::Expired),
                        self.cookies.clear(jar),
                    );
                }
                Err(e) => {
                    return SessionRefresh::new(SessionPresence::Unavailable(e.to_string()), cookies);
                }
            }
        } else {
            session
        };

        match self.call(self.provider.get_user(&session.access_token)).await {
            Ok(Some(user)) => SessionRefresh::new(
                SessionPresence::Active(SessionContext { user, session }),
                cookies,
            ),
            Ok(None) => {
                // Replaces any write from a refresh above.
                cookies.extend(self.cookies.clear(jar));
                SessionRefresh::new(SessionPresence::Absent(AbsenceReason::Rejected), cookies)
            }
            Err(e) => SessionRefresh::new(SessionPresence::Unavailable(e.to_string()), cookies),
        }
    }

    /// Cookie mutations that store a freshly issued session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidResponse`] if the session cannot be encoded.
    pub fn persist(&self, session: &Session, jar: &CookieJar) -> Result<CookieSet> {
        self.cookies.write(session, jar)
    }

    /// Cookie mutations that remove the session.
    #[must_use]
    pub fn clear(&self, jar: &CookieJar) -> CookieSet {
        self.cookies.clear(jar)
    }

    async fn call<T>(&self, fut: impl Future<Output = Result<T>> + Send) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .unwrap_or_else(|_| Err(AuthError::ServiceUnavailable("Identity service timed out".to_string())))
            .map_err(|e| match e {
                AuthError::ServiceUnavailable(_) => e,
                other => AuthError::ServiceUnavailable(other.to_string()),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::SessionCookieConfig;
    use crate::cookies::encode;
    use crate::mocks::MockIdentityProvider;
    use axum::http::{header::COOKIE, HeaderMap};

    const NAME: &str = "sb-test-auth-token";

    fn store(identity: &MockIdentityProvider) -> SessionStore<MockIdentityProvider> {
        SessionStore::new(
            Arc::new(identity.clone()),
            SessionCookies::new(SessionCookieConfig::new(NAME.to_string())),
            GateConfig::new(),
        )
    }

    fn jar_with(value: &str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, format!("{NAME}={value}").parse().unwrap());
        CookieJar::from_headers(&headers)
    }

    #[tokio::test]
    async fn test_no_cookie_is_absent_without_mutations() {
        let identity = MockIdentityProvider::new();
        let result = store(&identity).refresh(&CookieJar::new()).await;

        assert_eq!(result.presence, SessionPresence::Absent(AbsenceReason::NoCookie));
        assert!(result.cookies.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_cookie_is_removed() {
        let identity = MockIdentityProvider::new();
        let result = store(&identity).refresh(&jar_with("garbage")).await;

        assert_eq!(result.presence, SessionPresence::Absent(AbsenceReason::MalformedCookie));
        assert_eq!(result.cookies.get(NAME).unwrap().value(), "");
    }

    #[tokio::test]
    async fn test_fresh_session_is_active_without_refresh() {
        let identity = MockIdentityProvider::new();
        let user = identity.register("ada@example.com", "pw", Some("Ada"));
        let session = identity.issue_session(user.id, chrono::Duration::hours(1));

        let result = store(&identity).refresh(&jar_with(&encode(&session).unwrap())).await;

        assert_eq!(result.presence.context().unwrap().user, user);
        assert!(result.cookies.is_empty());
        assert_eq!(identity.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_expiring_session_is_rotated_and_written() {
        let identity = MockIdentityProvider::new();
        let user = identity.register("ada@example.com", "pw", None);
        let session = identity.issue_session(user.id, chrono::Duration::seconds(5));

        let result = store(&identity).refresh(&jar_with(&encode(&session).unwrap())).await;

        let context = result.presence.context().unwrap();
        assert_ne!(context.session.refresh_token, session.refresh_token);
        let written = result.cookies.get(NAME).unwrap();
        assert_eq!(written.value(), encode(&context.session).unwrap());
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_expired() {
        let identity = MockIdentityProvider::new();
        let user = identity.register("ada@example.com", "pw", None);
        let session = identity.issue_session(user.id, chrono::Duration::seconds(-60));
        identity.refresh_session(&session.refresh_token).await.unwrap();

        let result = store(&identity).refresh(&jar_with(&encode(&session).unwrap())).await;

        assert_eq!(result.presence, SessionPresence::Absent(AbsenceReason::Expired));
        assert_eq!(result.cookies.get(NAME).unwrap().value(), "");
    }

    #[tokio::test]
    async fn test_spent_refresh_token_keeps_live_session() {
        let identity = MockIdentityProvider::new();
        let user = identity.register("ada@example.com", "pw", None);
        let session = identity.issue_session(user.id, chrono::Duration::seconds(5));
        identity.refresh_session(&session.refresh_token).await.unwrap();

        let result = store(&identity).refresh(&jar_with(&encode(&session).unwrap())).await;

        let context = result.presence.context().unwrap();
        assert_eq!(context.user, user);
        assert_eq!(context.session.access_token, session.access_token);
        assert!(result.cookies.is_empty());
    }

    #[tokio::test]
    async fn test_revoked_access_token_is_rejected() {
        let identity = MockIdentityProvider::new();
        let user = identity.register("ada@example.com", "pw", None);
        let session = identity.issue_session(user.id, chrono::Duration::hours(1));
        identity.revoke_access_token(&session.access_token);

        let result = store(&identity).refresh(&jar_with(&encode(&session).unwrap())).await;

        assert_eq!(result.presence, SessionPresence::Absent(AbsenceReason::Rejected));
        assert!(!result.cookies.is_empty());
    }

    #[tokio::test]
    async fn test_outage_is_unavailable_and_keeps_cookies() {
        let identity = MockIdentityProvider::new();
        let user = identity.register("ada@example.com", "pw", None);
        let session = identity.issue_session(user.id, chrono::Duration::hours(1));
        identity.set_unavailable(true);

        let result = store(&identity).refresh(&jar_with(&encode(&session).unwrap())).await;

        assert_eq!(result.presence.label(), "unavailable");
        assert!(result.cookies.is_empty());
        assert!(result.presence.error().unwrap().is_unavailable());
    }

    #[test]
    fn test_presence_labels() {
        assert_eq!(SessionPresence::Absent(AbsenceReason::NoCookie).label(), "no_cookie");
        assert_eq!(SessionPresence::Unavailable("x".to_string()).label(), "unavailable");
    }
}
