//! Request extractors for logging context.
//!
//! ```ignore
//! async fn sign_in(ClientIp(ip): ClientIp, CorrelationId(id): CorrelationId) {
//!     tracing::info!(client_ip = %ip, correlation_id = %id, "Sign-in attempt");
//! }
//! ```

use crate::middleware::CorrelationIdExt;
use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{request::Parts, Extensions, HeaderMap};
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use uuid::Uuid;

/// Correlation ID assigned by [`correlation_id_layer`](crate::correlation_id_layer).
///
/// Without the layer every extraction yields a fresh ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CorrelationId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.correlation_id().unwrap_or_else(Uuid::new_v4)))
    }
}

/// Whether `X-Forwarded-For` / `X-Real-IP` may name the client.
///
/// Read from request extensions; absent means [`ProxyHeaders::Ignore`]. Only
/// trust them when every request arrives through a proxy that overwrites
/// those headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyHeaders {
    /// Use the peer address only.
    #[default]
    Ignore,
    /// Prefer the proxy headers over the peer address.
    Trust,
}

impl ProxyHeaders {
    /// `Trust` when `trusted`, else `Ignore`.
    #[must_use]
    pub const fn from_trusted(trusted: bool) -> Self {
        if trusted { Self::Trust } else { Self::Ignore }
    }
}

/// Client IP address, for logs only.
///
/// Advisory: with [`ProxyHeaders::Trust`] any client that reaches the server
/// directly can put an arbitrary address here. Never use it for access
/// decisions or rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(client_ip(&parts.headers, &parts.extensions)))
    }
}

/// Resolve the client address.
///
/// With [`ProxyHeaders::Trust`] in `extensions`: first `X-Forwarded-For`
/// entry, then `X-Real-IP`. Otherwise, or when neither parses, the peer
/// address when the server was started with connect info, then loopback.
#[must_use]
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> IpAddr {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let parse = |s: &str| s.trim().parse::<IpAddr>().ok();
    let trusted = extensions.get::<ProxyHeaders>().copied().unwrap_or_default() == ProxyHeaders::Trust;

    let forwarded = || {
        header("X-Forwarded-For")
            .and_then(|list| list.split(',').next())
            .and_then(parse)
            .or_else(|| header("X-Real-IP").and_then(parse))
    };

    trusted
        .then(forwarded)
        .flatten()
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
