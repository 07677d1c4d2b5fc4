//! DBR dashboard server.
//!
//! # Usage
//!
//! ```bash
//! SUPABASE_URL=https://<project>.supabase.co \
//! SUPABASE_ANON_KEY=... SUPABASE_SERVICE_ROLE_KEY=... \
//! cargo run --bin dbr-dashboard
//! ```
//!
//! Variables may also come from `.env.local` or `.env` in the working
//! directory.

use anyhow::Context;
use dbr_auth::{GoTrueClient, SessionCookies, SessionStore};
use dbr_dashboard::store::rest::DataApiConfig;
use dbr_dashboard::store::RestDataStore;
use dbr_dashboard::{build_router, AppSettings, AppState, Config};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dbr_dashboard=info,dbr_auth=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting DBR dashboard");

    // Load configuration
    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        backend = %config.backend.url,
        app_url = %config.auth.app_url,
        "Configuration loaded"
    );

    if config.metrics.enabled {
        dbr_dashboard::metrics::install(config.metrics_addr()?)?;
    }

    // Backends are built once and shared by every request
    let identity = Arc::new(GoTrueClient::new(&config.identity_config())?);
    let sessions = Arc::new(SessionStore::new(
        identity,
        SessionCookies::new(config.cookie_config()),
        config.gate_config(),
    ));
    let store = Arc::new(RestDataStore::new(&DataApiConfig {
        base_url: config.backend.url.clone(),
        anon_key: config.backend.anon_key.clone(),
        service_role_key: config.backend.service_role_key.clone(),
        request_timeout: config.backend_timeout(),
    })?);

    let state = AppState::new(sessions, store, AppSettings::from_config(&config));
    let app = build_router(state, &config.server.static_dir);

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Dashboard listening");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async {
                stop_rx.await.ok();
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            result.context("Server task panicked")??;
            return Ok(());
        }
        () = shutdown_signal() => {}
    }

    stop_tx.send(()).ok();
    let drain = Duration::from_secs(config.server.shutdown_timeout);
    match tokio::time::timeout(drain, server).await {
        Ok(result) => result.context("Server task panicked")??,
        Err(_) => warn!(timeout_secs = drain.as_secs(), "Shutdown timed out, dropping open connections"),
    }

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
///
/// If a handler cannot be installed, that signal is ignored and the other
/// still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
