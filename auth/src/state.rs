//! Session and user types.
//!
//! A [`Session`] is the token pair issued by the identity service and carried
//! in the session cookie. An [`AuthUser`] is what the identity service reports
//! about the bearer of a valid access token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Unique identifier for a user, as assigned by the identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    /// Generate a new random `UserId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Core State Types
// ═══════════════════════════════════════════════════════════════════════

/// A user known to the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// User ID.
    pub id: UserId,

    /// Email address, if the account has one.
    pub email: Option<String>,

    /// Name supplied at sign-up (`user_metadata.full_name`).
    pub full_name: Option<String>,
}

/// Token pair issued by the identity service.
///
/// This is the payload of the session cookie. The access token is a
/// short-lived bearer token; the refresh token is single use and rotates on
/// every refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token sent to the identity service and the data API.
    pub access_token: String,

    /// Opaque single-use token exchanged for a new pair.
    pub refresh_token: String,

    /// When the access token stops being accepted.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,

    /// Token type, always "bearer" in practice.
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Create a bearer session.
    #[must_use]
    pub fn new(access_token: String, refresh_token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at,
            token_type: default_token_type(),
        }
    }

    /// Returns `true` if the access token expires within `margin` of `now`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dbr_auth::Session;
    /// # use chrono::Utc;
    /// # use std::time::Duration;
    /// let now = Utc::now();
    /// let session = Session::new("a".into(), "r".into(), now + chrono::Duration::seconds(5));
    /// assert!(session.expires_within(Duration::from_secs(10), now));
    /// assert!(!session.expires_within(Duration::from_secs(1), now));
    /// ```
    #[must_use]
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        let Ok(margin) = chrono::Duration::from_std(margin) else {
            return true;
        };
        now.checked_add_signed(margin)
            .is_none_or(|deadline| self.expires_at <= deadline)
    }
}

// Tokens never reach the logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// The authenticated caller of a request that passed the gate.
///
/// Inserted into request extensions; handlers read it with
/// `Extension<SessionContext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Who the identity service says the caller is.
    pub user: AuthUser,

    /// The (possibly just refreshed) session the caller presented.
    pub session: Session,
}

impl SessionContext {
    /// Bearer token for calls made on the caller's behalf.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.session.access_token
    }
}
