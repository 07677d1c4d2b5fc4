//! Webhook receiver.
//!
//! Integrations post here without a session. Payloads are acknowledged and
//! logged by source; processing them is out of scope for the dashboard.

use axum::body::Bytes;
use axum::extract::Path;
use axum::http::StatusCode;
use dbr_web::{ClientIp, CorrelationId};

/// Longest source name that is logged verbatim.
const MAX_SOURCE_LEN: usize = 64;

/// `POST /api/webhooks/:source`
#[allow(clippy::unused_async)]
pub async fn receive(
    CorrelationId(receipt): CorrelationId,
    ClientIp(client_ip): ClientIp,
    Path(source): Path<String>,
    body: Bytes,
) -> StatusCode {
    let source: String = source.chars().take(MAX_SOURCE_LEN).collect();
    tracing::info!(%source, %receipt, %client_ip, bytes = body.len(), "Webhook received");
    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_webhook_is_acknowledged() {
        let status = receive(
            CorrelationId(uuid::Uuid::new_v4()),
            ClientIp(std::net::Ipv4Addr::LOCALHOST.into()),
            Path("twilio".to_string()),
            Bytes::from_static(b"{}"),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
}
