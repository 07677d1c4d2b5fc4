//! Identity service trait.

use crate::error::{AuthError, Result};
use crate::state::{AuthUser, Session};
use std::future::Future;

/// Kind of one-time token embedded in an emailed link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtpKind {
    /// Passwordless sign-in link.
    MagicLink,
    /// Password-recovery link.
    Recovery,
    /// Sign-up confirmation link.
    Signup,
    /// Generic email verification.
    Email,
}

impl OtpKind {
    /// Wire name used by the identity service's `verify` endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MagicLink => "magiclink",
            Self::Recovery => "recovery",
            Self::Signup => "signup",
            Self::Email => "email",
        }
    }

    /// Parse the `type` query parameter of a callback link.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] for an unknown kind.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "magiclink" => Ok(Self::MagicLink),
            "recovery" => Ok(Self::Recovery),
            "signup" => Ok(Self::Signup),
            "email" => Ok(Self::Email),
            other => Err(AuthError::Rejected {
                status: 400,
                message: format!("Unsupported verification type: {other}"),
            }),
        }
    }
}

/// Sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Email address.
    pub email: String,
    /// Password chosen by the user.
    pub password: String,
    /// Stored in the identity user's metadata as `full_name`.
    pub full_name: Option<String>,
    /// Where the confirmation email should send the user.
    pub redirect_to: Option<String>,
}

/// Result of a successful sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    /// The created identity user.
    pub user: AuthUser,
    /// Issued immediately unless the project requires email confirmation.
    pub session: Option<Session>,
}

/// Identity service (GoTrue-compatible).
///
/// # Implementation Notes
///
/// - `Ok(None)` from [`get_user`](Self::get_user) and
///   [`refresh_session`](Self::refresh_session) means the token was
///   rejected. Only failures to get an answer are errors.
/// - Outages must surface as [`AuthError::ServiceUnavailable`] so the gate
///   can tell them apart from absent sessions.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Resolve the user behind an access token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ServiceUnavailable`] if the service cannot answer.
    fn get_user(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<Option<AuthUser>>> + Send;

    /// Exchange a refresh token for a rotated session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ServiceUnavailable`] if the service cannot answer.
    fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<Option<Session>>> + Send;

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] with the service's message (e.g.
    /// "Invalid login credentials") if the credentials are refused.
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session>> + Send;

    /// Create an identity user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] if the service refuses the registration.
    fn sign_up(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = Result<SignUpOutcome>> + Send;

    /// Email a passwordless sign-in link pointing at `redirect_to`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] if the service refuses the request.
    fn send_magic_link(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Email a password-recovery link pointing at `redirect_to`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] if the service refuses the request.
    fn send_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Redeem the token hash of an emailed link for a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] if the link is invalid or expired.
    fn verify_email_otp(
        &self,
        token_hash: &str,
        kind: OtpKind,
    ) -> impl Future<Output = Result<Session>> + Send;

    /// Revoke the session behind an access token.
    ///
    /// # Errors
    ///
    /// Returns error if the service cannot be reached.
    fn sign_out(&self, access_token: &str) -> impl Future<Output = Result<()>> + Send;

    /// Check that the service is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ServiceUnavailable`] if it is not.
    fn health(&self) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_kind_wire_names() {
        for kind in [OtpKind::MagicLink, OtpKind::Recovery, OtpKind::Signup, OtpKind::Email] {
            assert_eq!(OtpKind::parse(kind.as_str()), Ok(kind));
        }
        assert!(OtpKind::parse("invite").is_err());
    }
}
