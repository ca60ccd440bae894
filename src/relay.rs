//! Forwards live scans to the backend's `store_qr` intake endpoint.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::ApiClient;
use crate::scanner::ScanEvent;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub forwarded: usize,
    pub failed: usize,
}

/// Relays one scan. Returns whether the backend accepted it.
pub async fn relay_scan(client: &ApiClient, scan: &ScanEvent) -> bool {
    match client.store_qr(&scan.value).await {
        Ok(response) if response.is_success() => {
            info!("QR data sent to backend: {}", String::from_utf8_lossy(&response.body));
            true
        }
        Ok(response) => {
            warn!(
                "Failed to send QR data. Status: {} Response content: {}",
                response.status,
                String::from_utf8_lossy(&response.body)
            );
            false
        }
        Err(err) => {
            error!("Error sending QR data via HTTP: {}", err);
            false
        }
    }
}

/// Relays scans in arrival order until cancelled or the feed closes.
pub async fn run_relay(
    client: ApiClient,
    mut scans: broadcast::Receiver<ScanEvent>,
    cancel_token: CancellationToken,
) -> RelayStats {
    let mut stats = RelayStats::default();

    loop {
        let received = tokio::select! {
            _ = cancel_token.cancelled() => break,
            received = scans.recv() => received,
        };

        match received {
            Ok(scan) => {
                if relay_scan(&client, &scan).await {
                    stats.forwarded += 1;
                } else {
                    stats.failed += 1;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("relay fell behind, {} scans were not forwarded", skipped);
                stats.failed += skipped as usize;
            }
            Err(RecvError::Closed) => break,
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeTransport;
    use crate::scanner::{FeedEvent, ScanHub};
    use crate::session::MemorySessionStore;
    use chrono::Local;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    const STORE_QR: &str = "http://erp.test/api/store_qr/";

    #[tokio::test]
    async fn forwards_each_scan_in_order_and_counts_failures() {
        let transport = Arc::new(FakeTransport::new());
        transport
            .respond(STORE_QR, StatusCode::OK, json!({"success": "stored"}))
            .respond(STORE_QR, StatusCode::BAD_REQUEST, json!({"error": "Invalid QR Code data"}));
        let client = ApiClient::new("http://erp.test", transport.clone(), Arc::new(MemorySessionStore::new()));

        let hub = ScanHub::new();
        let scans = hub.scans();
        for value in ["name=A|category=X|quantity=1\r\n", "bogus"] {
            hub.publish(FeedEvent::Message {
                payload: value.as_bytes().to_vec(),
                received_at: Local::now(),
            });
        }
        drop(hub);

        let stats = run_relay(client, scans, CancellationToken::new()).await;

        assert_eq!(stats, RelayStats { forwarded: 1, failed: 1 });
        let bodies: Vec<_> = transport
            .requests_to(STORE_QR)
            .into_iter()
            .map(|request| request.body)
            .collect();
        assert_eq!(
            bodies,
            vec![
                Some(json!({"qr_text": "name=A|category=X|quantity=1"})),
                Some(json!({"qr_text": "bogus"})),
            ]
        );
    }

    #[tokio::test]
    async fn cancellation_stops_an_idle_relay() {
        let client = ApiClient::new(
            "http://erp.test",
            Arc::new(FakeTransport::new()),
            Arc::new(MemorySessionStore::new()),
        );
        let hub = ScanHub::new();
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();

        let stats = run_relay(client, hub.scans(), cancel_token).await;
        assert_eq!(stats, RelayStats::default());
    }
}
