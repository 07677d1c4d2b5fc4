//! HTTP client for a GoTrue-compatible identity service.
//!
//! All endpoints live under `{base_url}/auth/v1` and require the project's
//! public API key in the `apikey` header. Calls made on behalf of a user also
//! carry `Authorization: Bearer <access_token>`.
//!
//! # Status mapping
//!
//! | Reply | Result |
//! |-------|--------|
//! | transport error, timeout, 5xx | [`AuthError::ServiceUnavailable`] |
//! | undecodable 2xx body | [`AuthError::InvalidResponse`] |
//! | 4xx on token checks (`user`, `refresh_token` grant) | `Ok(None)` |
//! | other 4xx | [`AuthError::Rejected`] with the service's message |

use crate::config::IdentityConfig;
use crate::error::{AuthError, Result};
use crate::providers::identity::{IdentityProvider, OtpKind, Registration, SignUpOutcome};
use crate::state::{AuthUser, Session, UserId};
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

/// Access tokens without an explicit expiry are assumed to live this long.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Identity-service client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct GoTrueClient {
    http_client: Client,
    endpoint: String,
    api_key: String,
}

impl GoTrueClient {
    /// Create a client for the given project.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ServiceUnavailable`] if the HTTP client cannot be
    /// built (e.g. the TLS backend fails to initialise).
    pub fn new(config: &IdentityConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::ServiceUnavailable(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/auth/v1", config.base_url.as_str().trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http_client
            .get(format!("{}/{path}", self.endpoint))
            .header("apikey", &self.api_key)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http_client
            .post(format!("{}/{path}", self.endpoint))
            .header("apikey", &self.api_key)
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> Result<Response> {
        self.post("token")
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await
            .map_err(transport_error)
    }
}

impl IdentityProvider for GoTrueClient {
    async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>> {
        let response = self
            .get("user")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        if is_token_rejection(response.status()) {
            return Ok(None);
        }
        let user: UserResponse = decode(response).await?;
        Ok(Some(user.into()))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<Session>> {
        let response = self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;

        if is_token_rejection(response.status()) {
            return Ok(None);
        }
        let token: TokenResponse = decode(response).await?;
        Ok(Some(token.into_session(Utc::now())))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;

        let token: TokenResponse = decode(response).await?;
        Ok(token.into_session(Utc::now()))
    }

    async fn sign_up(&self, registration: &Registration) -> Result<SignUpOutcome> {
        let mut request = self.post("signup").json(&json!({
            "email": registration.email,
            "password": registration.password,
            "data": { "full_name": registration.full_name },
        }));
        if let Some(redirect_to) = &registration.redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }
        let response = request.send().await.map_err(transport_error)?;

        // With email confirmation enabled the reply is the bare user;
        // otherwise it is a full token response.
        let body: serde_json::Value = decode(response).await?;
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)
                .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
            let user = token
                .user
                .clone()
                .ok_or_else(|| AuthError::InvalidResponse("Sign-up session without user".to_string()))?;
            Ok(SignUpOutcome {
                user: user.into(),
                session: Some(token.into_session(Utc::now())),
            })
        } else {
            let user: UserResponse = serde_json::from_value(body)
                .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
            Ok(SignUpOutcome {
                user: user.into(),
                session: None,
            })
        }
    }

    async fn send_magic_link(&self, email: &str, redirect_to: &str) -> Result<()> {
        let response = self
            .post("otp")
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email, "create_user": true }))
            .send()
            .await
            .map_err(transport_error)?;

        expect_success(response).await
    }

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<()> {
        let response = self
            .post("recover")
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }))
            .send()
            .await
            .map_err(transport_error)?;

        expect_success(response).await
    }

    async fn verify_email_otp(&self, token_hash: &str, kind: OtpKind) -> Result<Session> {
        let response = self
            .post("verify")
            .json(&json!({ "type": kind.as_str(), "token_hash": token_hash }))
            .send()
            .await
            .map_err(transport_error)?;

        let token: TokenResponse = decode(response).await?;
        Ok(token.into_session(Utc::now()))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let response = self
            .post("logout")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        // An already-revoked token has nothing left to sign out.
        if is_token_rejection(response.status()) {
            return Ok(());
        }
        expect_success(response).await
    }

    async fn health(&self) -> Result<()> {
        let response = self.get("health").send().await.map_err(transport_error)?;
        expect_success(response).await
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
struct UserResponse {
    id: uuid::Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct UserMetadata {
    full_name: Option<String>,
}

impl From<UserResponse> for AuthUser {
    fn from(user: UserResponse) -> Self {
        Self {
            id: UserId(user.id),
            email: user.email.filter(|e| !e.is_empty()),
            full_name: user.user_metadata.full_name.filter(|n| !n.is_empty()),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    token_type: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<UserResponse>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(|| {
                now + chrono::Duration::seconds(self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS))
            });

        let mut session = Session::new(self.access_token, self.refresh_token, expires_at);
        if let Some(token_type) = self.token_type {
            session.token_type = token_type;
        }
        session
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .filter(|m| !m.is_empty())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Response handling
// ═══════════════════════════════════════════════════════════════════════

fn transport_error(e: reqwest::Error) -> AuthError {
    if e.is_timeout() {
        AuthError::ServiceUnavailable("Identity service timed out".to_string())
    } else {
        AuthError::ServiceUnavailable(e.to_string())
    }
}

fn is_token_rejection(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
    )
}

async fn rejection(response: Response) -> AuthError {
    let status = response.status();
    if status.is_server_error() {
        return AuthError::ServiceUnavailable(format!("Identity service returned {status}"));
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request rejected").to_string());

    tracing::debug!(status = status.as_u16(), %message, "Identity service rejected request");
    AuthError::Rejected {
        status: status.as_u16(),
        message,
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(rejection(response).await);
    }
    response
        .json()
        .await
        .map_err(|e| AuthError::InvalidResponse(e.to_string()))
}

async fn expect_success(response: Response) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(rejection(response).await)
    }
}
