//! # DBR Authentication & Session Gating
//!
//! Decides, for every request to the dashboard, whether it may proceed or
//! must be sent to sign-in, and keeps the session cookies fresh while doing
//! so. Tokens are issued and verified by a hosted GoTrue-compatible identity
//! service; this crate never mints credentials itself.
//!
//! ## Architecture
//!
//! ```text
//! Request ─▶ SessionStore::refresh ─▶ classify ─▶ RedirectPolicy::decide ─▶ PassThrough | 307 /login
//!                   │                                                          │
//!                   └───────────────────── CookieSet ──────────────────────────┘
//! ```
//!
//! - [`session`]: cookie → [`SessionPresence`], with token refresh
//! - [`routes`]: path → [`RouteClass`]
//! - [`policy`]: class + presence → [`Decision`]
//! - [`gate`]: the three above as a tower layer
//! - [`providers`]: the [`IdentityProvider`] seam and its HTTP client
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbr_auth::*;
//!
//! let identity = Arc::new(GoTrueClient::new(&IdentityConfig::new(url, anon_key))?);
//! let sessions = SessionStore::new(
//!     identity,
//!     SessionCookies::new(SessionCookieConfig::for_project(&url)),
//!     GateConfig::default(),
//! );
//! let gate = SessionGate::new(Arc::new(sessions));
//!
//! let app = Router::new()
//!     .route("/dashboard", get(dashboard))
//!     .layer(gate.layer());
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod config;
pub mod constants;
pub mod cookies;
pub mod error;
pub mod gate;
pub mod policy;
pub mod providers;
pub mod routes;
pub mod session;
pub mod state;

// Mocks (test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use config::{GateConfig, IdentityConfig, SessionCookieConfig};
pub use cookies::{CookieSet, SessionCookies};
pub use error::{AuthError, Result};
pub use gate::{GateOutcome, SessionGate, SessionGateLayer, Terminal};
pub use policy::{safe_return_path, Decision, RedirectPolicy};
pub use providers::{GoTrueClient, IdentityProvider, OtpKind, Registration, SignUpOutcome};
pub use routes::{classify, RouteClass};
pub use session::{AbsenceReason, SessionPresence, SessionRefresh, SessionStore};
pub use state::{AuthUser, Session, SessionContext, UserId};
