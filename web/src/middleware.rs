//! Request span and correlation ID middleware.
//!
//! Every dashboard request runs inside one `http_request` span so the gate's
//! session decision, the handler's backend calls and the response status
//! land on the same log context.
//!
//! # Flow
//!
//! 1. **Extract** the ID from `X-Correlation-ID` (or generate a UUID v4)
//! 2. **Store** it in request extensions
//! 3. **Run** the inner service inside the span; the session gate fills in
//!    the `session` field
//! 4. **Record** the response status and echo the ID in the response header
//!
//! Install it inside `TraceLayer` so that inner layers see this span as
//! current:
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/dashboard", get(dashboard))
//!     .layer(correlation_id_layer())
//!     .layer(TraceLayer::new_for_http());
//! ```

use crate::extractors::client_ip;
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::response::Response;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::field::Empty;
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Span field the session gate records its session state into.
pub const SESSION_SPAN_FIELD: &str = "session";

/// Create the request span layer.
#[must_use]
pub const fn correlation_id_layer() -> CorrelationIdLayer {
    CorrelationIdLayer
}

/// Layer for [`CorrelationIdMiddleware`].
#[derive(Clone, Copy, Debug)]
pub struct CorrelationIdLayer;

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdMiddleware { inner }
    }
}

/// Opens the request span around the inner service.
#[derive(Clone, Debug)]
pub struct CorrelationIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for CorrelationIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let correlation_id = header_correlation_id(&req).unwrap_or_else(Uuid::new_v4);
        req.extensions_mut().insert(correlation_id);

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %req.method(),
            path = %req.uri().path(),
            client_ip = %client_ip(req.headers(), req.extensions()),
            session = Empty,
            status = Empty,
        );

        let fut = {
            let _entered = span.enter();
            self.inner.call(req)
        };

        Box::pin(async move {
            let mut response = fut.instrument(span.clone()).await?;
            span.record("status", response.status().as_u16());

            if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
                response.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
            Ok(response)
        })
    }
}

fn header_correlation_id<B>(req: &axum::http::Request<B>) -> Option<Uuid> {
    req.headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
}

/// Read the correlation ID stored by [`correlation_id_layer`].
pub trait CorrelationIdExt {
    /// The request's correlation ID, or `None` when the layer is not installed.
    fn correlation_id(&self) -> Option<Uuid>;
}

impl<B> CorrelationIdExt for axum::http::Request<B> {
    fn correlation_id(&self) -> Option<Uuid> {
        self.extensions().get::<Uuid>().copied()
    }
}

impl CorrelationIdExt for axum::http::request::Parts {
    fn correlation_id(&self) -> Option<Uuid> {
        self.extensions.get::<Uuid>().copied()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        async fn echo(req: Request) -> String {
            req.correlation_id()
                .map_or_else(|| "missing".to_string(), |id| id.to_string())
        }

        Router::new()
            .route("/dashboard", get(echo))
            .layer(correlation_id_layer())
    }

    async fn call(header: Option<&str>) -> (String, String) {
        let mut builder = axum::http::Request::builder().uri("/dashboard");
        if let Some(value) = header {
            builder = builder.header(CORRELATION_ID_HEADER, value);
        }
        let response = app().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();

        let echoed = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("Correlation ID header should be present")
            .to_str()
            .unwrap()
            .to_string();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        (echoed, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_incoming_id_is_kept() {
        let id = Uuid::new_v4().to_string();
        let (header, seen_by_handler) = call(Some(&id)).await;
        assert_eq!(header, id);
        assert_eq!(seen_by_handler, id);
    }

    #[tokio::test]
    async fn test_missing_or_invalid_id_is_replaced() {
        for incoming in [None, Some("not-a-uuid")] {
            let (header, seen_by_handler) = call(incoming).await;
            assert!(Uuid::parse_str(&header).is_ok(), "{incoming:?}");
            assert_eq!(header, seen_by_handler);
        }
    }
}
