//! Authentication providers.
//!
//! The gate and the auth handlers depend on the [`IdentityProvider`] trait,
//! never on a concrete client. Production wires in [`GoTrueClient`]; tests use
//! `MockIdentityProvider` from the `mocks` module.

pub mod gotrue;
pub mod identity;

pub use gotrue::GoTrueClient;
pub use identity::{IdentityProvider, OtpKind, Registration, SignUpOutcome};
