//! Prometheus metrics.
//!
//! The exporter runs its own listener (default `0.0.0.0:9090`) so metrics
//! never pass through the session gate.

use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install the exporter or bind its listener
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the Prometheus recorder and start its HTTP listener.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a recorder is already installed or
/// the listener cannot bind.
pub fn install(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    register_metrics();
    tracing::info!(%addr, "Metrics available at http://{addr}/metrics");
    Ok(())
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "dbr_gate_decisions_total",
        "Session gate decisions by outcome and session state"
    );
    describe_counter!(
        "dbr_tenants_created_total",
        "Companies registered through onboarding"
    );
}
