//! Mock identity service for testing.

use crate::error::{AuthError, Result};
use crate::providers::identity::{IdentityProvider, OtpKind, Registration, SignUpOutcome};
use crate::state::{AuthUser, Session, UserId};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An email the mock "sent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    /// What the link is for.
    pub kind: OtpKind,
    /// Recipient.
    pub email: String,
    /// Where the link sends the user.
    pub redirect_to: String,
    /// Token hash to pass to `verify_email_otp`.
    pub token_hash: String,
}

#[derive(Debug, Clone)]
struct Account {
    user: AuthUser,
    password: Option<String>,
}

#[derive(Debug, Default)]
struct MockState {
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, (UserId, DateTime<Utc>)>,
    refresh_tokens: HashMap<String, UserId>,
    otp_tokens: HashMap<String, UserId>,
    emails: Vec<SentEmail>,
    refresh_calls: usize,
    sign_outs: usize,
}

impl MockState {
    fn user(&self, id: UserId) -> Option<&AuthUser> {
        self.accounts.values().map(|a| &a.user).find(|u| u.id == id)
    }

    fn issue(&mut self, user_id: UserId, ttl: Duration) -> Session {
        let session = Session::new(
            format!("access-{}", uuid::Uuid::new_v4()),
            format!("refresh-{}", uuid::Uuid::new_v4()),
            Utc::now() + ttl,
        );
        self.access_tokens
            .insert(session.access_token.clone(), (user_id, session.expires_at));
        self.refresh_tokens
            .insert(session.refresh_token.clone(), user_id);
        session
    }

    fn create_account(&mut self, email: &str, password: Option<&str>, full_name: Option<&str>) -> AuthUser {
        let user = AuthUser {
            id: UserId::new(),
            email: Some(email.to_string()),
            full_name: full_name.map(str::to_string),
        };
        self.accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password: password.map(str::to_string),
            },
        );
        user
    }
}

/// Mock identity service.
///
/// Tokens are opaque random strings. Refresh tokens are single use: a
/// successful refresh retires the old one, as the real service does.
#[derive(Debug, Clone, Default)]
pub struct MockIdentityProvider {
    state: Arc<Mutex<MockState>>,
    unavailable: Arc<AtomicBool>,
    require_confirmation: bool,
}

impl MockIdentityProvider {
    /// Create an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign-ups return no session until the emailed link is followed.
    #[must_use]
    pub fn with_email_confirmation(mut self) -> Self {
        self.require_confirmation = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(AuthError::ServiceUnavailable("Mock identity service is down".to_string()))
        } else {
            Ok(())
        }
    }

    /// Create an account that can sign in with `password`.
    pub fn register(&self, email: &str, password: &str, full_name: Option<&str>) -> AuthUser {
        self.lock().create_account(email, Some(password), full_name)
    }

    /// Issue a session for `user_id` whose access token lives for `ttl`.
    ///
    /// A negative `ttl` yields an already-expired access token with a valid
    /// refresh token.
    pub fn issue_session(&self, user_id: UserId, ttl: Duration) -> Session {
        self.lock().issue(user_id, ttl)
    }

    /// Simulate an outage (every call fails with `ServiceUnavailable`).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Invalidate an access token without touching its refresh token.
    pub fn revoke_access_token(&self, access_token: &str) {
        self.lock().access_tokens.remove(access_token);
    }

    /// Number of refresh grants attempted.
    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.lock().refresh_calls
    }

    /// Number of successful sign-outs.
    #[must_use]
    pub fn sign_outs(&self) -> usize {
        self.lock().sign_outs
    }

    /// Emails sent so far, oldest first.
    #[must_use]
    pub fn sent_emails(&self) -> Vec<SentEmail> {
        self.lock().emails.clone()
    }

    fn send_link(&self, kind: OtpKind, email: &str, redirect_to: &str, create_user: bool) -> Result<()> {
        self.check_available()?;
        let mut state = self.lock();

        let user_id = match state.accounts.get(email) {
            Some(account) => account.user.id,
            None if create_user => state.create_account(email, None, None).id,
            // Unknown addresses are accepted silently so the endpoint does
            // not reveal which accounts exist.
            None => return Ok(()),
        };

        let token_hash = format!("otp-{}", uuid::Uuid::new_v4());
        state.otp_tokens.insert(token_hash.clone(), user_id);
        state.emails.push(SentEmail {
            kind,
            email: email.to_string(),
            redirect_to: redirect_to.to_string(),
            token_hash,
        });
        Ok(())
    }
}

impl IdentityProvider for MockIdentityProvider {
    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>> {
        self.check_available()?;
        let state = self.lock();

        let user = state
            .access_tokens
            .get(access_token)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .and_then(|(user_id, _)| state.user(*user_id))
            .cloned();
        Ok(user)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<Session>> {
        self.check_available()?;
        let mut state = self.lock();
        state.refresh_calls += 1;

        let Some(user_id) = state.refresh_tokens.remove(refresh_token) else {
            return Ok(None);
        };
        Ok(Some(state.issue(user_id, Duration::hours(1))))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        self.check_available()?;
        let mut state = self.lock();

        let user_id = state
            .accounts
            .get(email)
            .filter(|account| account.password.as_deref() == Some(password))
            .map(|account| account.user.id)
            .ok_or_else(|| AuthError::Rejected {
                status: 400,
                message: "Invalid login credentials".to_string(),
            })?;
        Ok(state.issue(user_id, Duration::hours(1)))
    }

    async fn sign_up(&self, registration: &Registration) -> Result<SignUpOutcome> {
        self.check_available()?;
        let mut state = self.lock();

        if state.accounts.contains_key(&registration.email) {
            return Err(AuthError::Rejected {
                status: 422,
                message: "User already registered".to_string(),
            });
        }

        let user = state.create_account(
            &registration.email,
            Some(&registration.password),
            registration.full_name.as_deref(),
        );
        let session = (!self.require_confirmation).then(|| state.issue(user.id, Duration::hours(1)));
        Ok(SignUpOutcome { user, session })
    }

    async fn send_magic_link(&self, email: &str, redirect_to: &str) -> Result<()> {
        self.send_link(OtpKind::MagicLink, email, redirect_to, true)
    }

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<()> {
        self.send_link(OtpKind::Recovery, email, redirect_to, false)
    }

    async fn verify_email_otp(&self, token_hash: &str, _kind: OtpKind) -> Result<Session> {
        self.check_available()?;
        let mut state = self.lock();

        let user_id = state
            .otp_tokens
            .remove(token_hash)
            .ok_or_else(|| AuthError::Rejected {
                status: 403,
                message: "Email link is invalid or has expired".to_string(),
            })?;
        Ok(state.issue(user_id, Duration::hours(1)))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        self.check_available()?;
        let mut state = self.lock();

        if let Some((user_id, _)) = state.access_tokens.remove(access_token) {
            state.refresh_tokens.retain(|_, owner| *owner != user_id);
            state.sign_outs += 1;
        }
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        self.check_available()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refresh_token_is_single_use() {
        let identity = MockIdentityProvider::new();
        let user = identity.register("ada@example.com", "pw", None);
        let session = identity.issue_session(user.id, Duration::seconds(-1));

        let rotated = identity.refresh_session(&session.refresh_token).await.unwrap();
        assert!(rotated.is_some());
        assert_eq!(identity.refresh_session(&session.refresh_token).await.unwrap(), None);
        assert_eq!(identity.refresh_calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_access_token_is_rejected() {
        let identity = MockIdentityProvider::new();
        let user = identity.register("ada@example.com", "pw", None);
        let session = identity.issue_session(user.id, Duration::seconds(-1));
        assert_eq!(identity.get_user(&session.access_token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected_with_message() {
        let identity = MockIdentityProvider::new();
        identity.register("ada@example.com", "right", None);
        let err = identity
            .sign_in_with_password("ada@example.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Invalid login credentials");
    }

    #[tokio::test]
    async fn test_outage_switch() {
        let identity = MockIdentityProvider::new();
        identity.set_unavailable(true);
        assert!(identity.health().await.unwrap_err().is_unavailable());
        identity.set_unavailable(false);
        assert!(identity.health().await.is_ok());
    }

    #[tokio::test]
    async fn test_magic_link_round_trip() {
        let identity = MockIdentityProvider::new();
        identity
            .send_magic_link("new@example.com", "http://localhost:3000/login/callback")
            .await
            .unwrap();

        let email = identity.sent_emails().pop().unwrap();
        assert_eq!(email.kind, OtpKind::MagicLink);
        let session = identity
            .verify_email_otp(&email.token_hash, OtpKind::MagicLink)
            .await
            .unwrap();
        let user = identity.get_user(&session.access_token).await.unwrap().unwrap();
        assert_eq!(user.email.as_deref(), Some("new@example.com"));

        assert!(identity.verify_email_otp(&email.token_hash, OtpKind::MagicLink).await.is_err());
    }
}
