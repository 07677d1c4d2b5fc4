//! HTTP server for the dashboard.
//!
//! - [`state`]: shared handles injected into every handler
//! - [`health`]: liveness and readiness probes
//! - [`routes`]: router assembly, with the session gate in front of the app

pub mod health;
pub mod routes;
pub mod state;

pub use health::readiness_check;
pub use routes::build_router;
pub use state::{AppSettings, AppState};
