//! HTTP handlers.
//!
//! | Module | Routes |
//! |--------|--------|
//! | [`pages`] | `GET /`, `/login`, `/signup`, `/forgot-password`, `/onboarding` |
//! | [`auth`] | sign-in, magic link, callback, sign-up, password reset, sign-out |
//! | [`dashboard`] | `GET /dashboard` |
//! | [`onboarding`] | `POST /onboarding` |
//! | [`admin`] | `GET /admin` |
//! | [`webhooks`] | `POST /api/webhooks/:source` |

pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod onboarding;
pub mod pages;
pub mod webhooks;

use serde::Serialize;

/// Confirmation body for actions whose result arrives by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageResponse {
    /// Always `true`; failures are reported as errors
    pub success: bool,
    /// Text to show the user
    pub message: String,
}

impl MessageResponse {
    /// A success message.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
