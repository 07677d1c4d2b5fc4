//! Route classification.
//!
//! Every path is either [`RouteClass::Public`] or [`RouteClass::Protected`].
//! Only the fixed allow-list in [`PUBLIC_ROUTES`] is public; everything else,
//! including paths that do not exist, is protected.
//!
//! Paths are normalised before matching so that `/LOGIN`, `//login/` and
//! `/dashboard/../login` all classify the same way as `/login`.

use std::fmt;

/// Whether a path requires a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Reachable without a session.
    Public,
    /// Requires a session.
    Protected,
}

impl RouteClass {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Protected => "protected",
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an allow-list entry matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchScope {
    /// The path must equal the entry.
    Exact,
    /// The path must equal the entry or continue it after a `/`.
    Namespace,
}

/// An allow-list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicRoute {
    /// Normalised path.
    pub path: &'static str,
    /// How `path` matches.
    pub scope: MatchScope,
}

impl PublicRoute {
    /// Entry matching only `path` itself.
    #[must_use]
    pub const fn exact(path: &'static str) -> Self {
        Self {
            path,
            scope: MatchScope::Exact,
        }
    }

    /// Entry matching `path` and everything below it.
    #[must_use]
    pub const fn namespace(path: &'static str) -> Self {
        Self {
            path,
            scope: MatchScope::Namespace,
        }
    }

    /// Returns `true` if the normalised `path` falls under this entry.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self.scope {
            MatchScope::Exact => path == self.path,
            MatchScope::Namespace => path
                .strip_prefix(self.path)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
        }
    }
}

/// Paths reachable without a session.
///
/// The root is exact: a namespace entry for `/` would make every path public.
pub const PUBLIC_ROUTES: &[PublicRoute] = &[
    PublicRoute::exact("/"),
    PublicRoute::namespace("/login"),
    PublicRoute::namespace("/signup"),
    PublicRoute::namespace("/forgot-password"),
    PublicRoute::namespace("/api/webhooks"),
];

/// Normalise a request path for matching.
///
/// ASCII-lowercases, collapses repeated slashes, resolves `.` and `..`
/// (including their percent-encoded forms) without climbing above the root,
/// and removes any trailing slash.
///
/// # Examples
///
/// ```
/// # use dbr_auth::routes::normalize_path;
/// assert_eq!(normalize_path("//Dashboard/./settings/"), "/dashboard/settings");
/// assert_eq!(normalize_path("/a/../../login"), "/login");
/// assert_eq!(normalize_path(""), "/");
/// ```
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let lower = path.to_ascii_lowercase();
    let mut segments: Vec<&str> = Vec::new();

    for segment in lower.split('/') {
        match segment {
            "" | "." | "%2e" => {}
            ".." | "%2e%2e" | ".%2e" | "%2e." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Classify a request path.
///
/// # Examples
///
/// ```
/// # use dbr_auth::routes::{classify, RouteClass};
/// assert_eq!(classify("/"), RouteClass::Public);
/// assert_eq!(classify("/login/callback"), RouteClass::Public);
/// assert_eq!(classify("/loginx"), RouteClass::Protected);
/// assert_eq!(classify("/dashboard"), RouteClass::Protected);
/// ```
#[must_use]
pub fn classify(path: &str) -> RouteClass {
    let normalized = normalize_path(path);
    if PUBLIC_ROUTES.iter().any(|route| route.matches(&normalized)) {
        RouteClass::Public
    } else {
        RouteClass::Protected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_allow_list_is_public() {
        for path in [
            "/",
            "/login",
            "/signup",
            "/forgot-password",
            "/api/webhooks",
            "/api/webhooks/stripe",
            "/login/callback",
        ] {
            assert_eq!(classify(path), RouteClass::Public, "{path}");
        }
    }

    #[test]
    fn test_root_does_not_cover_everything() {
        for path in ["/dashboard", "/admin", "/onboarding", "/anything-else", "/api"] {
            assert_eq!(classify(path), RouteClass::Protected, "{path}");
        }
    }

    #[test]
    fn test_namespace_is_segment_bounded() {
        assert_eq!(classify("/loginx"), RouteClass::Protected);
        assert_eq!(classify("/signup-admin"), RouteClass::Protected);
        assert_eq!(classify("/api/webhooksx"), RouteClass::Protected);
    }

    #[test]
    fn test_normalisation_variants() {
        assert_eq!(classify("/LOGIN"), RouteClass::Public);
        assert_eq!(classify("//login//"), RouteClass::Public);
        assert_eq!(classify("/dashboard/../login"), RouteClass::Public);
        assert_eq!(classify("/login/../dashboard"), RouteClass::Protected);
        assert_eq!(classify("/login/%2e%2e/dashboard"), RouteClass::Protected);
        assert_eq!(classify("dashboard"), RouteClass::Protected);
        assert_eq!(classify("/./"), RouteClass::Public);
    }

    fn segment() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-zA-Z0-9_-]{1,12}",
            Just(".".to_string()),
            Just("..".to_string()),
            Just(String::new()),
        ]
    }

    fn path() -> impl Strategy<Value = String> {
        prop::collection::vec(segment(), 0..8).prop_map(|segments| format!("/{}", segments.join("/")))
    }

    proptest! {
        #[test]
        fn prop_classify_is_total(raw in ".*") {
            let _ = classify(&raw);
        }

        #[test]
        fn prop_normalisation_is_idempotent(raw in path()) {
            let once = normalize_path(&raw);
            prop_assert_eq!(normalize_path(&once), once.clone());
            prop_assert!(once.starts_with('/'));
            prop_assert!(once == "/" || !once.ends_with('/'));
            prop_assert!(!once.contains("//"));
        }

        #[test]
        fn prop_classification_ignores_spelling(raw in path()) {
            prop_assert_eq!(classify(&raw), classify(&normalize_path(&raw)));
            prop_assert_eq!(classify(&raw), classify(&raw.to_uppercase()));
        }

        #[test]
        fn prop_unlisted_top_level_is_protected(first in "[a-z0-9_]{1,12}", rest in path()) {
            let listed = ["login", "signup", "api"];
            prop_assume!(!listed.contains(&first.as_str()));
            let raw = format!("/{first}{rest}");
            prop_assume!(!rest.split('/').any(|s| s == ".."));
            prop_assert_eq!(classify(&raw), RouteClass::Protected);
        }

        #[test]
        fn prop_namespace_children_are_public(child in "[a-z0-9_-]{1,12}") {
            let ns = format!("/login/{child}");
            prop_assert_eq!(classify(&ns), RouteClass::Public);
            let hooks = format!("/api/webhooks/{child}");
            prop_assert_eq!(classify(&hooks), RouteClass::Public);
        }
    }
}
