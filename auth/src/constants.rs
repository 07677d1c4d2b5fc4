//! Authentication constants.
//!
//! Paths, cookie limits and timeouts shared by the session store, the
//! redirect policy and the gate.

use std::time::Duration;

/// Path of the sign-in page. Every redirect for a missing session goes here.
pub const LOGIN_PATH: &str = "/login";

/// Query parameter carrying the path the user originally asked for.
pub const RETURN_PATH_PARAM: &str = "redirectTo";

/// Where a user lands after signing in without a usable return path.
pub const DEFAULT_LANDING_PATH: &str = "/dashboard";

/// Largest value written into a single session cookie.
///
/// Browsers cap cookies at 4096 bytes including name and attributes; longer
/// encoded sessions are split into `name.0`, `name.1`, ...
pub const COOKIE_CHUNK_SIZE: usize = 3180;

/// Prefix marking a base64url-encoded session cookie value.
pub const COOKIE_VALUE_PREFIX: &str = "base64-";

/// `Max-Age` of the session cookie (400 days, the browser maximum).
pub const COOKIE_MAX_AGE_SECS: i64 = 400 * 24 * 60 * 60;

/// Tokens expiring within this window are refreshed before being used.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(10);

/// Upper bound on a single identity-service call made by the gate.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_path_is_its_own_return_param_host() {
        let location = format!("{LOGIN_PATH}?{RETURN_PATH_PARAM}=/dashboard");
        assert_eq!(location, "/login?redirectTo=/dashboard");
    }

    #[test]
    fn test_cookie_max_age_is_400_days() {
        assert_eq!(COOKIE_MAX_AGE_SECS, 34_560_000);
    }
}
