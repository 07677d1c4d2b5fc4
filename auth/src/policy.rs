//! Redirect policy.
//!
//! Maps a route class and session state to a [`Decision`]. The only redirect
//! target is the sign-in page, which receives the original path in its
//! `redirectTo` query parameter.

use crate::constants::{DEFAULT_LANDING_PATH, LOGIN_PATH, RETURN_PATH_PARAM};
use crate::routes::RouteClass;
use std::fmt::Write;

/// What to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Let the request through.
    Allow,
    /// Send the user to `target`, remembering where they were headed.
    RedirectTo {
        /// Sign-in path.
        target: String,
        /// Original request path (unencoded).
        return_path: String,
    },
}

impl Decision {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::RedirectTo { .. } => "redirect",
        }
    }

    /// `Location` header value for a redirect.
    ///
    /// # Examples
    ///
    /// ```
    /// # use dbr_auth::policy::Decision;
    /// let decision = Decision::RedirectTo {
    ///     target: "/login".to_string(),
    ///     return_path: "/dashboard/settings".to_string(),
    /// };
    /// assert_eq!(decision.location().as_deref(), Some("/login?redirectTo=/dashboard/settings"));
    /// assert_eq!(Decision::Allow.location(), None);
    /// ```
    #[must_use]
    pub fn location(&self) -> Option<String> {
        match self {
            Self::Allow => None,
            Self::RedirectTo {
                target,
                return_path,
            } => Some(format!(
                "{target}?{RETURN_PATH_PARAM}={}",
                encode_return_path(return_path)
            )),
        }
    }
}

/// Decides between letting a request through and sending it to sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectPolicy {
    login_path: String,
}

impl RedirectPolicy {
    /// Policy redirecting to `login_path`.
    #[must_use]
    pub const fn new(login_path: String) -> Self {
        Self { login_path }
    }

    /// Sign-in path.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Decide what happens to a request for `path`.
    ///
    /// Public paths are always allowed. Protected paths are allowed only with
    /// a session.
    #[must_use]
    pub fn decide(&self, class: RouteClass, session_present: bool, path: &str) -> Decision {
        match (class, session_present) {
            (RouteClass::Public, _) | (RouteClass::Protected, true) => Decision::Allow,
            (RouteClass::Protected, false) => Decision::RedirectTo {
                target: self.login_path.clone(),
                return_path: path.to_string(),
            },
        }
    }
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self::new(LOGIN_PATH.to_string())
    }
}

/// Percent-encode a path for a query value, leaving unreserved characters
/// and `/` readable.
#[must_use]
pub fn encode_return_path(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for byte in path.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~' | b'/') {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}

/// Validate a post-sign-in destination supplied by the client.
///
/// Only local absolute paths are accepted; anything that could leave the site
/// (`//evil.example`, `https://...`, `/\evil`) falls back to `/dashboard`.
///
/// # Examples
///
/// ```
/// # use dbr_auth::policy::safe_return_path;
/// assert_eq!(safe_return_path(Some("/dashboard/settings")), "/dashboard/settings");
/// assert_eq!(safe_return_path(Some("//evil.example")), "/dashboard");
/// assert_eq!(safe_return_path(None), "/dashboard");
/// ```
#[must_use]
pub fn safe_return_path(candidate: Option<&str>) -> &str {
    match candidate {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => DEFAULT_LANDING_PATH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_is_always_allowed() {
        let policy = RedirectPolicy::default();
        assert_eq!(policy.decide(RouteClass::Public, false, "/login"), Decision::Allow);
        assert_eq!(policy.decide(RouteClass::Public, true, "/login"), Decision::Allow);
    }

    #[test]
    fn test_protected_with_session_is_allowed() {
        let policy = RedirectPolicy::default();
        assert_eq!(policy.decide(RouteClass::Protected, true, "/dashboard"), Decision::Allow);
    }

    #[test]
    fn test_protected_without_session_redirects_to_login() {
        let decision = RedirectPolicy::default().decide(RouteClass::Protected, false, "/dashboard/settings");
        assert_eq!(
            decision,
            Decision::RedirectTo {
                target: "/login".to_string(),
                return_path: "/dashboard/settings".to_string(),
            }
        );
        assert_eq!(
            decision.location().as_deref(),
            Some("/login?redirectTo=/dashboard/settings")
        );
    }

    #[test]
    fn test_return_path_encoding() {
        assert_eq!(encode_return_path("/a b/ü"), "/a%20b/%C3%BC");
        assert_eq!(encode_return_path("/x?y=1&z"), "/x%3Fy%3D1%26z");
        assert_eq!(encode_return_path("/keep-._~"), "/keep-._~");
    }

    #[test]
    fn test_safe_return_path_rejects_offsite_targets() {
        for bad in ["https://evil.example", "//evil.example", "/\\evil.example", "dashboard", "/a\nb", ""] {
            assert_eq!(safe_return_path(Some(bad)), "/dashboard", "{bad:?}");
        }
        assert_eq!(safe_return_path(Some("/onboarding")), "/onboarding");
    }
}
