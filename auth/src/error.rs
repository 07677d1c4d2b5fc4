//! Error types for session and identity-service operations.

use dbr_web::AppError;
use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Error taxonomy for the session layer and the identity service.
///
/// The gate never returns these to its caller: absence and outages are folded
/// into a [`SessionPresence`](crate::session::SessionPresence). Handlers that
/// talk to the identity service directly (sign-in, sign-up, sign-out) do see
/// them and convert them into an [`AppError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Session Errors
    // ═══════════════════════════════════════════════════════════

    /// No session accompanies the request.
    #[error("No session")]
    NoSession,

    /// The session cookie could not be decoded.
    #[error("Malformed session cookie")]
    MalformedCookie,

    /// The session's refresh token was rejected.
    #[error("Session has expired")]
    SessionExpired,

    // ═══════════════════════════════════════════════════════════
    // Identity Service Replies
    // ═══════════════════════════════════════════════════════════

    /// The identity service refused the request (4xx) with a message meant
    /// for the user, e.g. "Invalid login credentials".
    #[error("{message}")]
    Rejected {
        /// HTTP status returned by the identity service
        status: u16,
        /// Message reported by the identity service
        message: String,
    },

    /// The identity service answered with a body we could not interpret.
    #[error("Invalid response from identity service: {0}")]
    InvalidResponse(String),

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// The identity service could not be reached, timed out, or failed (5xx).
    #[error("Identity service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Returns `true` if the error is caused by what the user submitted.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dbr_auth::AuthError;
    /// let rejected = AuthError::Rejected { status: 400, message: "Invalid login credentials".into() };
    /// assert!(rejected.is_user_error());
    /// assert!(!AuthError::ServiceUnavailable("timeout".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Returns `true` if the identity service could not give an answer.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dbr_auth::AuthError;
    /// assert!(AuthError::ServiceUnavailable("connection refused".into()).is_unavailable());
    /// assert!(!AuthError::NoSession.is_unavailable());
    /// ```
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_) | Self::InvalidResponse(_))
    }

    /// Message suitable for display next to a form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            Self::ServiceUnavailable(_) | Self::InvalidResponse(_) => {
                "Authentication is temporarily unavailable. Please try again.".to_string()
            }
            Self::NoSession | Self::MalformedCookie | Self::SessionExpired => {
                "Your session has expired. Please sign in again.".to_string()
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.user_message();
        match err {
            AuthError::Rejected { status: 400 | 401 | 403, .. } => Self::unauthorized(message),
            AuthError::Rejected { status: 422, .. } => Self::validation(message),
            AuthError::Rejected { .. } => Self::bad_request(message),
            AuthError::NoSession | AuthError::MalformedCookie | AuthError::SessionExpired => {
                Self::unauthorized(message)
            }
            AuthError::ServiceUnavailable(_) | AuthError::InvalidResponse(_) => {
                Self::unavailable(message).with_source(anyhow::Error::new(err))
            }
        }
    }
}
