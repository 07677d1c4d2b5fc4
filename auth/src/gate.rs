//! Request gate.
//!
//! Runs once per request, before any handler:
//!
//! 1. **Refresh** the session from the request cookies ([`SessionStore::refresh`])
//! 2. **Classify** the path ([`classify`])
//! 3. **Decide** between pass-through and redirect ([`RedirectPolicy::decide`])
//! 4. **Attach** the refresh's cookie mutations to whichever response is sent,
//!    unless the handler set a cookie of the same name itself
//!
//! The session state is also recorded on the request span opened by
//! `dbr_web::correlation_id_layer`, when there is one.
//!
//! The gate fails closed: an identity-service outage counts as "no session",
//! so protected paths redirect to sign-in. Outages are logged at `warn` and
//! counted separately from ordinary absences.
//!
//! # Example
//!
//! ```ignore
//! use dbr_auth::{SessionGate, SessionStore};
//!
//! let gate = SessionGate::new(Arc::new(sessions));
//! let app = Router::new()
//!     .route("/dashboard", get(dashboard))
//!     .layer(gate.layer());
//! ```

use crate::cookies::CookieSet;
use crate::policy::{Decision, RedirectPolicy};
use crate::providers::IdentityProvider;
use crate::routes::{classify, RouteClass};
use crate::session::{SessionPresence, SessionRefresh, SessionStore};
use axum::extract::Request;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use dbr_web::SESSION_SPAN_FIELD;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// How the request leaves the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// Continue to the inner service.
    PassThrough,
    /// Answer `307 Temporary Redirect` to `location`.
    Redirect {
        /// `Location` header value.
        location: String,
    },
}

/// Everything the gate determined about a request.
///
/// The cookie mutations sit beside the terminal state so that both exits
/// carry them.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    /// Route class of the request path.
    pub class: RouteClass,
    /// Session state after any refresh.
    pub presence: SessionPresence,
    /// Policy decision.
    pub decision: Decision,
    /// Exit taken.
    pub terminal: Terminal,
    /// Cookie mutations to attach to the response.
    pub cookies: CookieSet,
}

/// Session gate.
pub struct SessionGate<P> {
    sessions: Arc<SessionStore<P>>,
    policy: RedirectPolicy,
}

impl<P> Clone for SessionGate<P> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            policy: self.policy.clone(),
        }
    }
}

impl<P> std::fmt::Debug for SessionGate<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGate")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<P: IdentityProvider> SessionGate<P> {
    /// Create a gate using the default redirect policy.
    #[must_use]
    pub fn new(sessions: Arc<SessionStore<P>>) -> Self {
        Self {
            sessions,
            policy: RedirectPolicy::default(),
        }
    }

    /// Replace the redirect policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RedirectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The session store the gate reads from.
    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionStore<P>> {
        &self.sessions
    }

    /// Run the gate for a request to `path` carrying `headers`.
    pub async fn evaluate(&self, path: &str, headers: &HeaderMap) -> GateOutcome {
        let jar = CookieJar::from_headers(headers);
        let SessionRefresh { presence, cookies } = self.sessions.refresh(&jar).await;

        let class = classify(path);
        let decision = self.policy.decide(class, presence.is_active(), path);
        let terminal = decision
            .location()
            .map_or(Terminal::PassThrough, |location| Terminal::Redirect { location });

        let outcome = GateOutcome {
            class,
            presence,
            decision,
            terminal,
            cookies,
        };
        record(path, &outcome);
        outcome
    }

    /// Tower layer running this gate in front of a service.
    #[must_use]
    pub fn layer(&self) -> SessionGateLayer<P> {
        SessionGateLayer { gate: self.clone() }
    }
}

fn record(path: &str, outcome: &GateOutcome) {
    let session = outcome.presence.label();
    let decision = outcome.decision.as_str();
    tracing::Span::current().record(SESSION_SPAN_FIELD, session);

    if let SessionPresence::Unavailable(reason) = &outcome.presence {
        tracing::warn!(
            path,
            class = %outcome.class,
            session,
            decision,
            reason = %reason,
            "Identity service unavailable, treating request as signed out"
        );
    } else {
        tracing::debug!(path, class = %outcome.class, session, decision, "Gate decision");
    }

    metrics::counter!(
        "dbr_gate_decisions_total",
        "decision" => decision,
        "session" => session
    )
    .increment(1);
}

/// Layer for [`SessionGate`].
pub struct SessionGateLayer<P> {
    gate: SessionGate<P>,
}

impl<P> Clone for SessionGateLayer<P> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
        }
    }
}

impl<S, P> Layer<S> for SessionGateLayer<P> {
    type Service = SessionGateService<S, P>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionGateService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Middleware service for [`SessionGate`].
pub struct SessionGateService<S, P> {
    inner: S,
    gate: SessionGate<P>,
}

impl<S: Clone, P> Clone for SessionGateService<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: self.gate.clone(),
        }
    }
}

impl<S, P> Service<Request> for SessionGateService<S, P>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    P: IdentityProvider,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let gate = self.gate.clone();
        // The clone may not be ready; keep the service that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();
            let outcome = gate.evaluate(parts.uri.path(), &parts.headers).await;

            let mut response = match outcome.terminal {
                Terminal::Redirect { location } => Redirect::temporary(&location).into_response(),
                Terminal::PassThrough => {
                    if let Some(context) = outcome.presence.into_context() {
                        parts.extensions.insert(context);
                    }
                    inner.call(Request::from_parts(parts, body)).await?
                }
            };

            outcome.cookies.apply_unset(response.headers_mut());
            Ok(response)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{GateConfig, SessionCookieConfig};
    use crate::cookies::{encode, SessionCookies};
    use crate::mocks::MockIdentityProvider;
    use axum::http::header::COOKIE;

    fn gate(identity: &MockIdentityProvider) -> SessionGate<MockIdentityProvider> {
        let sessions = SessionStore::new(
            Arc::new(identity.clone()),
            SessionCookies::new(SessionCookieConfig::new("sb-test-auth-token".to_string())),
            GateConfig::new(),
        );
        SessionGate::new(Arc::new(sessions))
    }

    fn cookie_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, format!("sb-test-auth-token={value}").parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn test_public_path_without_session_passes() {
        let outcome = gate(&MockIdentityProvider::new())
            .evaluate("/login", &HeaderMap::new())
            .await;
        assert_eq!(outcome.class, RouteClass::Public);
        assert_eq!(outcome.terminal, Terminal::PassThrough);
    }

    #[tokio::test]
    async fn test_protected_path_without_session_redirects() {
        let outcome = gate(&MockIdentityProvider::new())
            .evaluate("/dashboard/settings", &HeaderMap::new())
            .await;
        assert_eq!(
            outcome.terminal,
            Terminal::Redirect {
                location: "/login?redirectTo=/dashboard/settings".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_outage_fails_closed_on_protected_path() {
        let identity = MockIdentityProvider::new();
        let user = identity.register("ada@example.com", "pw", None);
        let session = identity.issue_session(user.id, chrono::Duration::hours(1));
        identity.set_unavailable(true);

        let outcome = gate(&identity)
            .evaluate("/dashboard", &cookie_headers(&encode(&session).unwrap()))
            .await;

        assert_eq!(outcome.presence.label(), "unavailable");
        assert!(matches!(outcome.terminal, Terminal::Redirect { .. }));
    }

    #[tokio::test]
    async fn test_outage_still_allows_public_path() {
        let identity = MockIdentityProvider::new();
        let user = identity.register("ada@example.com", "pw", None);
        let session = identity.issue_session(user.id, chrono::Duration::hours(1));
        identity.set_unavailable(true);

        let outcome = gate(&identity)
            .evaluate("/", &cookie_headers(&encode(&session).unwrap()))
            .await;

        assert_eq!(outcome.terminal, Terminal::PassThrough);
    }
}
