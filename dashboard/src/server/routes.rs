//! Router configuration for the dashboard.
//!
//! ```text
//! /health, /ready, /static/*      outside the gate
//! everything else ──▶ SessionGate ──▶ app routes (public + protected)
//! ```
//!
//! Unknown paths also pass through the gate, so they redirect to sign-in
//! without a session and answer `404` with one.

use super::health::readiness_check;
use super::state::AppState;
use crate::handlers::{admin, auth, dashboard, onboarding, pages, webhooks};
use crate::store::DataStore;
use axum::routing::{get, post};
use axum::{Extension, Router};
use dbr_auth::{IdentityProvider, SessionGate};
use dbr_web::correlation_id_layer;
use dbr_web::handlers::health_check;
use std::path::Path;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// # Arguments
///
/// - `state`: Application state to share with handlers
/// - `static_dir`: Directory served under `/static`
pub fn build_router<I, D>(state: AppState<I, D>, static_dir: &Path) -> Router
where
    I: IdentityProvider,
    D: DataStore,
{
    let gate = SessionGate::new(state.sessions.clone());
    let proxy_headers = state.settings.proxy_headers;

    let app = Router::new()
        // Public
        .route("/", get(pages::landing))
        .route("/login", get(pages::login).post(auth::sign_in::<I, D>))
        .route("/login/magic-link", post(auth::send_magic_link::<I, D>))
        .route("/login/callback", get(auth::callback::<I, D>))
        .route("/signup", get(pages::signup).post(auth::sign_up::<I, D>))
        .route(
            "/forgot-password",
            get(pages::forgot_password).post(auth::forgot_password::<I, D>),
        )
        .route("/api/webhooks/:source", post(webhooks::receive))
        // Protected
        .route("/logout", post(auth::sign_out::<I, D>))
        .route("/dashboard", get(dashboard::home::<I, D>))
        .route("/onboarding", get(pages::onboarding).post(onboarding::submit::<I, D>))
        .route("/admin", get(admin::overview::<I, D>))
        .with_state(state.clone())
        .layer(gate.layer());

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check::<I, D>))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .fallback_service(app)
        .layer(correlation_id_layer())
        .layer(Extension(proxy_headers))
        .layer(TraceLayer::new_for_http())
}
