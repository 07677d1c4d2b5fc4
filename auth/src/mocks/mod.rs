//! Mock provider implementations for testing.
//!
//! In-memory stand-ins for the identity service, used by unit and
//! integration tests across the workspace.

pub mod identity;

pub use identity::{MockIdentityProvider, SentEmail};
