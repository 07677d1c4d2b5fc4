//! Readiness probe.
//!
//! Liveness (`/health`) is [`dbr_web::handlers::health_check`]. Readiness
//! additionally asks the identity service, without which no protected page
//! can be served.

use super::state::AppState;
use crate::store::DataStore;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use dbr_auth::IdentityProvider;
use serde::Serialize;

/// Readiness check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,
    /// Identity service reachable
    pub identity: bool,
}

/// Readiness check endpoint.
///
/// Returns `200 OK` when the identity service answers its health check and
/// `503 Service Unavailable` otherwise.
///
/// # Example
///
/// ```bash
/// curl http://localhost:3000/ready
/// # {"ready":true,"identity":true}
/// ```
pub async fn readiness_check<I, D>(State(state): State<AppState<I, D>>) -> (StatusCode, Json<ReadinessResponse>)
where
    I: IdentityProvider,
    D: DataStore,
{
    let identity = match state.identity().health().await {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(%error, "Identity service health check failed");
            false
        }
    };

    let status = if identity {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            ready: identity,
            identity,
        }),
    )
}
