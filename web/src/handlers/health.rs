//! Liveness endpoint.
//!
//! Used by load balancers to check that the process is serving requests. It
//! never touches the identity service or the data API; readiness probes that
//! do live with the application.

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Liveness response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the handler runs.
    pub status: &'static str,
    /// Crate version of the serving binary.
    pub version: &'static str,
}

/// Simple health check endpoint.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// { "status": "ok", "version": "0.1.0" }
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, Json(body)) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
    }
}
