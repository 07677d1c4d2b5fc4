//! Sign-in, sign-up and sign-out handlers.
//!
//! Handlers that establish or end a session return the cookie mutations
//! alongside a `303 See Other`, so the browser follows with a `GET` and the
//! new cookies already in place.

use super::MessageResponse;
use crate::schema::{NewUserProfile, Role, Users};
use crate::server::AppState;
use crate::store::{Access, DataStore};
use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::{Extension, Form, Json};
use axum_extra::extract::cookie::CookieJar;
use dbr_auth::constants::LOGIN_PATH;
use dbr_auth::{safe_return_path, CookieSet, IdentityProvider, OtpKind, Registration, SessionContext};
use dbr_web::{AppError, ClientIp, WebResult};
use serde::Deserialize;

/// Where a new account continues after sign-up.
pub const ONBOARDING_PATH: &str = "/onboarding";

/// Password sign-in form.
#[derive(Debug, Deserialize)]
pub struct SignInForm {
    /// Email
    #[serde(default)]
    pub email: String,
    /// Password
    #[serde(default)]
    pub password: String,
    /// Where to go afterwards
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

/// Single-email form (magic link, password reset).
#[derive(Debug, Deserialize)]
pub struct EmailForm {
    /// Email
    #[serde(default)]
    pub email: String,
    /// Where to go after following the emailed link
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

/// Sign-up form.
#[derive(Debug, Deserialize)]
pub struct SignUpForm {
    /// Email
    #[serde(default)]
    pub email: String,
    /// Password
    #[serde(default)]
    pub password: String,
    /// Full name
    #[serde(rename = "fullName")]
    pub full_name: Option<String>,
}

/// Query string of the emailed-link callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// One-time token hash
    pub token_hash: Option<String>,
    /// Link type (`magiclink`, `recovery`, `signup`, `email`)
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Where to go afterwards
    pub next: Option<String>,
}

fn required_email(email: &str) -> WebResult<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::validation("Email is required"));
    }
    Ok(email)
}

/// `POST /login`
///
/// # Errors
///
/// `401` with the identity service's message when the credentials are
/// rejected; `503` when it is unreachable.
pub async fn sign_in<I, D>(
    State(state): State<AppState<I, D>>,
    ClientIp(client_ip): ClientIp,
    jar: CookieJar,
    Form(form): Form<SignInForm>,
) -> WebResult<(CookieSet, Redirect)>
where
    I: IdentityProvider,
    D: DataStore,
{
    let email = required_email(&form.email)?;
    if form.password.is_empty() {
        return Err(AppError::validation("Password is required"));
    }

    let session = state
        .identity()
        .sign_in_with_password(email, &form.password)
        .await
        .inspect_err(|error| tracing::info!(%client_ip, %error, "Password sign-in rejected"))?;
    let cookies = state.sessions.persist(&session, &jar)?;

    tracing::info!(%client_ip, "User signed in with password");
    Ok((cookies, Redirect::to(safe_return_path(form.redirect_to.as_deref()))))
}

/// `POST /login/magic-link`
///
/// # Errors
///
/// Propagates identity-service errors.
pub async fn send_magic_link<I, D>(
    State(state): State<AppState<I, D>>,
    Form(form): Form<EmailForm>,
) -> WebResult<Json<MessageResponse>>
where
    I: IdentityProvider,
    D: DataStore,
{
    let email = required_email(&form.email)?;
    let next = form
        .redirect_to
        .as_deref()
        .map(|path| safe_return_path(Some(path)));
    let callback = state.settings.callback_url(next);

    state.identity().send_magic_link(email, &callback).await?;
    Ok(Json(MessageResponse::success("Check your email for the magic link!")))
}

/// `GET /login/callback`
///
/// Exchanges the emailed token for a session.
///
/// # Errors
///
/// `400` for a missing or unknown link type, `401` for an invalid or
/// expired link.
pub async fn callback<I, D>(
    State(state): State<AppState<I, D>>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> WebResult<(CookieSet, Redirect)>
where
    I: IdentityProvider,
    D: DataStore,
{
    let token_hash = query
        .token_hash
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing token"))?;
    let kind = OtpKind::parse(query.kind.as_deref().unwrap_or_default())
        .map_err(|e| AppError::bad_request(e.user_message()))?;

    let session = state.identity().verify_email_otp(token_hash, kind).await?;
    let cookies = state.sessions.persist(&session, &jar)?;

    tracing::info!(kind = kind.as_str(), "Email link verified");
    Ok((cookies, Redirect::to(safe_return_path(query.next.as_deref()))))
}

/// `POST /signup`
///
/// Creates the identity, then the `users` profile row with role `user`. A
/// failed profile insert is logged and does not fail the sign-up.
///
/// # Errors
///
/// `422` for a missing email or password or an already registered address.
pub async fn sign_up<I, D>(
    State(state): State<AppState<I, D>>,
    jar: CookieJar,
    Form(form): Form<SignUpForm>,
) -> WebResult<(CookieSet, Redirect)>
where
    I: IdentityProvider,
    D: DataStore,
{
    let email = required_email(&form.email)?;
    if form.password.is_empty() {
        return Err(AppError::validation("Password is required"));
    }
    let full_name = form
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    let outcome = state
        .identity()
        .sign_up(&Registration {
            email: email.to_string(),
            password: form.password.clone(),
            full_name: full_name.clone(),
            redirect_to: Some(state.settings.callback_url(Some(ONBOARDING_PATH))),
        })
        .await?;

    // Without a session (email confirmation pending) there is no user token
    // to insert with.
    let access = outcome
        .session
        .as_ref()
        .map_or(Access::ServiceRole, |session| Access::user(session.access_token.clone()));
    let profile = NewUserProfile {
        id: outcome.user.id.0,
        email: outcome.user.email.clone().unwrap_or_else(|| email.to_string()),
        full_name,
        role: Role::User,
    };
    if let Err(error) = state.store.insert::<Users>(&access, &profile).await {
        tracing::error!(user_id = %outcome.user.id, %error, "Failed to create user profile");
    }

    let cookies = match &outcome.session {
        Some(session) => state.sessions.persist(session, &jar)?,
        None => CookieSet::new(),
    };

    tracing::info!(
        user_id = %outcome.user.id,
        confirmed = outcome.session.is_some(),
        "User signed up"
    );
    Ok((cookies, Redirect::to(ONBOARDING_PATH)))
}

/// `POST /forgot-password`
///
/// Answers the same way whether or not the address has an account.
///
/// # Errors
///
/// Propagates identity-service errors.
pub async fn forgot_password<I, D>(
    State(state): State<AppState<I, D>>,
    Form(form): Form<EmailForm>,
) -> WebResult<Json<MessageResponse>>
where
    I: IdentityProvider,
    D: DataStore,
{
    let email = required_email(&form.email)?;
    let callback = state.settings.callback_url(None);

    state.identity().send_password_reset(email, &callback).await?;
    Ok(Json(MessageResponse::success(
        "Check your email for a link to reset your password.",
    )))
}

/// `POST /logout`
///
/// Always ends the local session, even if the identity service cannot be
/// told.
pub async fn sign_out<I, D>(
    State(state): State<AppState<I, D>>,
    Extension(context): Extension<SessionContext>,
    jar: CookieJar,
) -> (CookieSet, Redirect)
where
    I: IdentityProvider,
    D: DataStore,
{
    if let Err(error) = state.identity().sign_out(context.access_token()).await {
        tracing::warn!(user_id = %context.user.id, %error, "Identity service sign-out failed");
    } else {
        tracing::info!(user_id = %context.user.id, "User signed out");
    }

    (state.sessions.clear(&jar), Redirect::to(LOGIN_PATH))
}
