//! Axum plumbing shared by the DBR dashboard crates.
//!
//! The dashboard is a thin shell around a hosted identity service and data
//! API. This crate holds the pieces every handler needs regardless of what it
//! talks to:
//!
//! - [`AppError`]: HTTP-facing error with a user-displayable message
//! - [`correlation_id_layer`]: the per-request span, with correlation ID
//! - [`ClientIp`] / [`CorrelationId`]: small request extractors
//! - [`handlers::health_check`]: liveness probe
//!
//! # Example
//!
//! ```ignore
//! use axum::{routing::get, Router};
//! use dbr_web::{correlation_id_layer, handlers::health_check};
//!
//! let app = Router::new()
//!     .route("/health", get(health_check))
//!     .layer(correlation_id_layer())
//!     .layer(TraceLayer::new_for_http());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::AppError;
pub use extractors::{ClientIp, CorrelationId, ProxyHeaders};
pub use middleware::{correlation_id_layer, CorrelationIdExt, CORRELATION_ID_HEADER, SESSION_SPAN_FIELD};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
