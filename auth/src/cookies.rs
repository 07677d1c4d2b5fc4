//! Session cookie codec.
//!
//! The session travels in a cookie named after the project
//! (`sb-<project-ref>-auth-token`). Its value is `base64-` followed by the
//! base64url (unpadded) encoding of the session JSON. Values longer than
//! [`COOKIE_CHUNK_SIZE`] are split across `name.0`, `name.1`, ... and joined
//! again in index order on read. Bare JSON values are accepted on read so
//! sessions written by older clients keep working.
//!
//! Nothing here touches the response directly: every write produces a
//! [`CookieSet`] that the caller applies to whichever response it sends.

use crate::config::SessionCookieConfig;
use crate::constants::{COOKIE_CHUNK_SIZE, COOKIE_MAX_AGE_SECS, COOKIE_VALUE_PREFIX};
use crate::error::{AuthError, Result};
use crate::state::Session;
use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::convert::Infallible;

/// Cookie mutations to attach to an outgoing response.
///
/// Setting a cookie whose name is already present replaces the earlier entry,
/// so the set holds at most one mutation per name.
#[derive(Debug, Clone, Default)]
pub struct CookieSet {
    cookies: Vec<Cookie<'static>>,
}

impl CookieSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cookies: Vec::new(),
        }
    }

    /// Add a cookie, replacing any earlier mutation of the same name.
    pub fn set(&mut self, cookie: Cookie<'static>) {
        if let Some(existing) = self.cookies.iter_mut().find(|c| c.name() == cookie.name()) {
            *existing = cookie;
        } else {
            self.cookies.push(cookie);
        }
    }

    /// Merge `other` into this set. Later mutations win.
    pub fn extend(&mut self, other: Self) {
        for cookie in other.cookies {
            self.set(cookie);
        }
    }

    /// Look up the mutation for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Cookie<'static>> {
        self.cookies.iter().find(|c| c.name() == name)
    }

    /// Returns `true` if there is nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Number of cookies in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Iterate over the mutations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Cookie<'static>> {
        self.cookies.iter()
    }

    /// Append one `Set-Cookie` header per mutation.
    pub fn apply(&self, headers: &mut HeaderMap) {
        for cookie in &self.cookies {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(e) => {
                    tracing::warn!(cookie = %cookie.name(), error = %e, "Dropping unencodable cookie");
                }
            }
        }
    }
}

impl CookieSet {
    /// Like [`CookieSet::apply`], but skips names the response already sets.
    ///
    /// Handlers that sign a user in or out write cookies of their own; those
    /// take precedence over mutations computed from the request.
    pub fn apply_unset(&self, headers: &mut HeaderMap) {
        let already_set: Vec<String> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| Cookie::parse(value).ok())
            .map(|cookie| cookie.name().to_string())
            .collect();

        let remaining = Self {
            cookies: self
                .cookies
                .iter()
                .filter(|cookie| !already_set.iter().any(|name| name == cookie.name()))
                .cloned()
                .collect(),
        };
        remaining.apply(headers);
    }
}

impl IntoResponseParts for CookieSet {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> std::result::Result<ResponseParts, Self::Error> {
        self.apply(res.headers_mut());
        Ok(res)
    }
}

/// Reads and writes the (possibly chunked) session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    config: SessionCookieConfig,
}

impl SessionCookies {
    /// Create a codec for the given cookie configuration.
    #[must_use]
    pub const fn new(config: SessionCookieConfig) -> Self {
        Self { config }
    }

    /// Base cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Raw cookie value, joining chunks if the session was split.
    ///
    /// Returns `None` if neither the base cookie nor chunk `0` is present.
    #[must_use]
    pub fn read(&self, jar: &CookieJar) -> Option<String> {
        if let Some(cookie) = jar.get(self.name()) {
            return Some(cookie.value().to_string());
        }

        let mut joined = String::new();
        let mut index = 0usize;
        while let Some(chunk) = jar.get(&self.chunk_name(index)) {
            joined.push_str(chunk.value());
            index += 1;
        }

        (index > 0).then_some(joined)
    }

    /// Decode the session carried by the request's cookies.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedCookie`] if a cookie is present but does
    /// not hold a session.
    pub fn load(&self, jar: &CookieJar) -> Result<Option<Session>> {
        self.read(jar).map(|raw| decode(&raw)).transpose()
    }

    /// Cookie mutations that store `session`, removing stale chunks left in `jar`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidResponse`] if the session cannot be serialized.
    pub fn write(&self, session: &Session, jar: &CookieJar) -> Result<CookieSet> {
        let value = encode(session)?;
        let mut set = CookieSet::new();

        if value.len() <= COOKIE_CHUNK_SIZE {
            set.set(self.cookie(self.name().to_string(), value));
            for name in self.present_names(jar) {
                if name != self.name() {
                    set.set(self.removal(name));
                }
            }
            return Ok(set);
        }

        // The encoded value is ASCII, so byte chunks are valid strings.
        let chunks: Vec<String> = value
            .as_bytes()
            .chunks(COOKIE_CHUNK_SIZE)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect();
        let written: Vec<String> = (0..chunks.len()).map(|i| self.chunk_name(i)).collect();

        for name in self.present_names(jar) {
            if !written.contains(&name) {
                set.set(self.removal(name));
            }
        }
        for (name, chunk) in written.into_iter().zip(chunks) {
            set.set(self.cookie(name, chunk));
        }

        Ok(set)
    }

    /// Cookie mutations that remove every session cookie present in `jar`.
    ///
    /// Removes the base name when nothing is present, so signing out always
    /// emits at least one `Set-Cookie`.
    #[must_use]
    pub fn clear(&self, jar: &CookieJar) -> CookieSet {
        let mut set = CookieSet::new();
        let present = self.present_names(jar);
        if present.is_empty() {
            set.set(self.removal(self.name().to_string()));
        }
        for name in present {
            set.set(self.removal(name));
        }
        set
    }

    fn chunk_name(&self, index: usize) -> String {
        format!("{}.{index}", self.config.name)
    }

    fn present_names(&self, jar: &CookieJar) -> Vec<String> {
        let base = self.name();
        let mut names: Vec<String> = jar
            .iter()
            .map(|c| c.name())
            .filter(|name| {
                *name == base
                    || name
                        .strip_prefix(base)
                        .and_then(|rest| rest.strip_prefix('.'))
                        .is_some_and(|index| index.parse::<usize>().is_ok())
            })
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    fn cookie(&self, name: String, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .secure(self.config.secure)
            .max_age(time::Duration::seconds(COOKIE_MAX_AGE_SECS))
            .build()
    }

    fn removal(&self, name: String) -> Cookie<'static> {
        Cookie::build((name, String::new()))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .secure(self.config.secure)
            .max_age(time::Duration::ZERO)
            .build()
    }
}

/// Encode a session as a cookie value (`base64-` + base64url JSON).
///
/// # Errors
///
/// Returns [`AuthError::InvalidResponse`] if the session cannot be serialized.
pub fn encode(session: &Session) -> Result<String> {
    let json = serde_json::to_vec(session).map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
    Ok(format!("{COOKIE_VALUE_PREFIX}{}", URL_SAFE_NO_PAD.encode(json)))
}

/// Decode a cookie value produced by [`encode`], or bare session JSON.
///
/// # Errors
///
/// Returns [`AuthError::MalformedCookie`] if the value is neither.
pub fn decode(raw: &str) -> Result<Session> {
    let json = match raw.strip_prefix(COOKIE_VALUE_PREFIX) {
        Some(encoded) => URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|_| AuthError::MalformedCookie)?,
        None => raw.as_bytes().to_vec(),
    };
    serde_json::from_slice(&json).map_err(|_| AuthError::MalformedCookie)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn codec() -> SessionCookies {
        SessionCookies::new(SessionCookieConfig::new("sb-test-auth-token".to_string()))
    }

    fn session_with_token(len: usize) -> Session {
        Session::new(
            "a".repeat(len),
            "refresh-1".to_string(),
            DateTime::<Utc>::from_timestamp(1_900_000_000, 0).unwrap(),
        )
    }

    fn jar_from(pairs: &[(&str, &str)]) -> CookieJar {
        let header = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::COOKIE, header.parse().unwrap());
        CookieJar::from_headers(&headers)
    }

    #[test]
    fn test_decode_accepts_bare_json() {
        let session = decode(r#"{"access_token":"a","refresh_token":"r","expires_at":1900000000}"#).unwrap();
        assert_eq!(session.refresh_token, "r");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode("base64-!!!"), Err(AuthError::MalformedCookie));
        assert_eq!(decode("not json"), Err(AuthError::MalformedCookie));
        assert_eq!(decode(""), Err(AuthError::MalformedCookie));
    }

    #[test]
    fn test_small_session_uses_single_cookie() {
        let session = session_with_token(32);
        let set = codec().write(&session, &CookieJar::new()).unwrap();

        assert_eq!(set.len(), 1);
        let cookie = set.get("sb-test-auth-token").unwrap();
        assert!(cookie.value().starts_with("base64-"));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn test_large_session_is_chunked_and_reassembled() {
        let session = session_with_token(8000);
        let set = codec().write(&session, &CookieJar::new()).unwrap();

        assert!(set.len() >= 3);
        assert!(set.get("sb-test-auth-token").is_none());
        assert!(set.iter().all(|c| c.value().len() <= COOKIE_CHUNK_SIZE));

        let pairs: Vec<(String, String)> = set
            .iter()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let loaded = codec().load(&jar_from(&borrowed)).unwrap().unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn test_write_removes_stale_chunks() {
        let jar = jar_from(&[
            ("sb-test-auth-token.0", "old"),
            ("sb-test-auth-token.1", "old"),
        ]);
        let set = codec().write(&session_with_token(16), &jar).unwrap();

        assert!(set.get("sb-test-auth-token").is_some());
        for stale in ["sb-test-auth-token.0", "sb-test-auth-token.1"] {
            let cookie = set.get(stale).unwrap();
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
        }
    }

    #[test]
    fn test_clear_removes_everything_present() {
        let jar = jar_from(&[
            ("sb-test-auth-token.0", "x"),
            ("sb-test-auth-token.1", "y"),
            ("theme", "dark"),
        ]);
        let set = codec().clear(&jar);
        assert_eq!(set.len(), 2);
        assert!(set.get("theme").is_none());
    }

    #[test]
    fn test_clear_without_cookies_still_removes_base_name() {
        let set = codec().clear(&CookieJar::new());
        assert_eq!(set.len(), 1);
        assert!(set.get("sb-test-auth-token").is_some());
    }

    #[test]
    fn test_load_missing_cookie_is_none() {
        let jar = jar_from(&[("theme", "dark")]);
        assert_eq!(codec().load(&jar), Ok(None));
    }

    #[test]
    fn test_cookie_set_replaces_same_name() {
        let mut set = CookieSet::new();
        set.set(Cookie::new("a", "1"));
        set.set(Cookie::new("a", "2"));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("a").unwrap().value(), "2");
    }

    #[test]
    fn test_apply_emits_one_header_per_cookie() {
        let mut set = CookieSet::new();
        set.set(Cookie::new("a", "1"));
        set.set(Cookie::new("b", "2"));
        let mut headers = HeaderMap::new();
        set.apply(&mut headers);
        assert_eq!(headers.get_all(SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn test_apply_unset_defers_to_response_cookies() {
        let codec = codec();
        let jar = jar_from(&[("sb-test-auth-token", "stale")]);
        let removal = codec.clear(&jar);

        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("sb-test-auth-token=fresh; Path=/; HttpOnly"),
        );
        removal.apply_unset(&mut headers);

        let values: Vec<_> = headers.get_all(SET_COOKIE).iter().collect();
        assert_eq!(values.len(), 1);
        assert!(values[0].to_str().unwrap().contains("fresh"));

        let mut empty = HeaderMap::new();
        removal.apply_unset(&mut empty);
        assert_eq!(empty.get_all(SET_COOKIE).iter().count(), 1);
    }
}
