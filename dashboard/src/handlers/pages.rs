//! Server-rendered pages.
//!
//! Templates are compiled into the binary. Every value substituted into a
//! template is HTML-escaped first.

use crate::schema::Industry;
use axum::extract::Query;
use axum::response::Html;
use dbr_auth::safe_return_path;
use serde::Deserialize;
use std::fmt::Write;

const LAYOUT: &str = include_str!("../../templates/layout.html");
const LANDING: &str = include_str!("../../templates/landing.html");
const LOGIN: &str = include_str!("../../templates/login.html");
const SIGNUP: &str = include_str!("../../templates/signup.html");
const FORGOT_PASSWORD: &str = include_str!("../../templates/forgot_password.html");
const ONBOARDING: &str = include_str!("../../templates/onboarding.html");

/// Escape text for use in HTML content and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn render(title: &str, content: &str) -> Html<String> {
    Html(
        LAYOUT
            .replace("{{title}}", &escape_html(title))
            .replace("{{content}}", content),
    )
}

/// `GET /`
#[allow(clippy::unused_async)]
pub async fn landing() -> Html<String> {
    render("Welcome", LANDING)
}

/// Query string of the sign-in page.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    /// Where to go after signing in
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

/// `GET /login`
///
/// The `redirectTo` value is validated and escaped before it is written into
/// the form.
#[allow(clippy::unused_async)]
pub async fn login(Query(query): Query<LoginQuery>) -> Html<String> {
    let redirect_to = safe_return_path(query.redirect_to.as_deref());
    let content = LOGIN.replace("{{redirect_to}}", &escape_html(redirect_to));
    render("Sign in", &content)
}

/// `GET /signup`
#[allow(clippy::unused_async)]
pub async fn signup() -> Html<String> {
    render("Sign up", SIGNUP)
}

/// `GET /forgot-password`
#[allow(clippy::unused_async)]
pub async fn forgot_password() -> Html<String> {
    render("Reset password", FORGOT_PASSWORD)
}

/// `GET /onboarding`
#[allow(clippy::unused_async)]
pub async fn onboarding() -> Html<String> {
    let mut options = String::new();
    for industry in Industry::ALL {
        let _ = writeln!(
            options,
            "        <option value=\"{}\">{}</option>",
            industry.as_str(),
            escape_html(industry.label())
        );
    }
    render(
        "Company profile",
        &ONBOARDING.replace("{{industry_options}}", options.trim_end()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#x27;&amp;&#x27;&lt;/a&gt;"
        );
    }

    #[tokio::test]
    async fn test_login_carries_return_path() {
        let Html(page) = login(Query(LoginQuery {
            redirect_to: Some("/dashboard/settings".to_string()),
        }))
        .await;
        assert!(page.contains(r#"name="redirectTo" value="/dashboard/settings""#));
    }

    #[tokio::test]
    async fn test_login_escapes_and_validates_return_path() {
        let Html(page) = login(Query(LoginQuery {
            redirect_to: Some(r#"/x"><script>alert(1)</script>"#.to_string()),
        }))
        .await;
        assert!(!page.contains("<script>"));
        assert!(page.contains("&quot;&gt;&lt;script&gt;"));

        let Html(page) = login(Query(LoginQuery {
            redirect_to: Some("https://evil.example".to_string()),
        }))
        .await;
        assert!(page.contains(r#"value="/dashboard""#));
    }

    #[tokio::test]
    async fn test_onboarding_lists_every_industry() {
        let Html(page) = onboarding().await;
        for industry in Industry::ALL {
            assert!(page.contains(&format!("value=\"{}\"", industry.as_str())));
        }
        assert!(!page.contains("{{"));
    }
}
