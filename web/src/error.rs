//! Error type for dashboard handlers.
//!
//! Every failure a handler can hit (a rejected sign-in, an invalid onboarding
//! form, an unreachable backend) ends up as an [`AppError`]. The message is
//! the one shown to the user; the optional source is only logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// Implements Axum's `IntoResponse`, rendering a JSON body of the form
/// `{"code": "...", "message": "..."}`.
///
/// # Examples
///
/// ```ignore
/// async fn handler(Form(form): Form<OnboardingForm>) -> Result<Redirect, AppError> {
///     let tenant = form.validate().map_err(|e| AppError::validation(e.user_message()))?;
///     Ok(Redirect::to("/dashboard"))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    /// Shown to the user
    message: String,
    /// Stable, machine-readable
    code: &'static str,
    /// Logged for 5xx, never sent
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create an error with an explicit status and code.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Attach the underlying error, logged when the response is rendered.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// `400 Bad Request`
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// `401 Unauthorized`: credentials or an emailed link were rejected.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// `403 Forbidden`: the backend refused the signed-in user.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    /// `422 Unprocessable Entity`: a form failed validation.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    /// `500 Internal Server Error`
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", message)
    }

    /// `503 Service Unavailable`: a backend could not be reached.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status.as_u16();
        if self.status.is_server_error() {
            let source = self.source.as_ref().map(|e| format!("{e:#}"));
            tracing::error!(
                status,
                code = self.code,
                message = %self.message,
                source = source.as_deref(),
                "Request failed"
            );
        } else {
            tracing::debug!(status, code = self.code, message = %self.message, "Request rejected");
        }

        let body = Json(ErrorBody {
            code: self.code,
            message: &self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An unexpected error occurred").with_source(err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::validation("Company name is required");
        assert_eq!(err.to_string(), "[VALIDATION_ERROR] Company name is required");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_unavailable() {
        let err = AppError::unavailable("Identity service unreachable");
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "SERVICE_UNAVAILABLE");
    }

    #[test]
    fn test_anyhow_conversion_hides_source_message() {
        let err: AppError = anyhow::anyhow!("connection reset by peer").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "An unexpected error occurred");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn test_response_body() {
        let response = AppError::unauthorized("Invalid login credentials").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "code": "UNAUTHORIZED", "message": "Invalid login credentials" })
        );
    }
}
