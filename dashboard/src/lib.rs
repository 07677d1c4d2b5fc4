//! # DBR Dashboard
//!
//! HTTP front end of the DBR (database reactivation) platform. Tenants sign
//! in, register their company and, for platform staff, see an overview of
//! every tenant. Identity and data live in a hosted backend; this crate
//! wires the session gate from [`dbr_auth`] in front of a small set of
//! handlers.
//!
//! ## Modules
//!
//! - [`config`]: environment configuration
//! - [`schema`]: typed table registry
//! - [`store`]: data API client ([`store::RestDataStore`]) and in-memory double
//! - [`profile`]: current user and admin authorization
//! - [`tenants`]: company onboarding
//! - [`handlers`] / [`server`]: HTTP surface
//! - [`metrics`]: Prometheus exporter

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod profile;
pub mod schema;
pub mod server;
pub mod store;
pub mod tenants;

pub use config::{Config, ConfigError};
pub use server::{build_router, AppSettings, AppState};
