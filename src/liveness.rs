use tracing::{info, warn};

use crate::peer::{PeerInfo, PeerTable};
use crate::transport::{HttpTransport, PeerStatusPayload};
use std::sync::Arc;

/// Sanity-gated dead-peer declaration (C4). This is the partition-safety
/// lever: a coordinator that cannot reach `sanity_check_url` refuses to
/// evict anyone, on the assumption that it, not the peer, is partitioned.
pub struct LivenessReporter {
    transport: HttpTransport,
    sanity_check_url: Option<String>,
    peer_status_url: Option<String>,
    peer_table: Option<Arc<PeerTable>>,
}

impl LivenessReporter {
    pub fn new(
        transport: HttpTransport,
        sanity_check_url: Option<String>,
        peer_status_url: Option<String>,
    ) -> Self {
        Self {
            transport,
            sanity_check_url,
            peer_status_url,
            peer_table: None,
        }
    }

    /// Attaches the peer table this reporter mutates on a confirmed dead
    /// peer. Split from `new` so `ElectionCore` and `LivenessReporter` can be
    /// constructed independently and wired together afterwards.
    pub fn with_peer_table(mut self, peer_table: Arc<PeerTable>) -> Self {
        self.peer_table = Some(peer_table);
        self
    }

    /// Called when the Election Core has exhausted its retries sending to a
    /// formerly-alive peer while this node is coordinator.
    ///
    /// An empty or unset `sanity_check_url` is treated as "sanity failed":
    /// the safer default when this node cannot verify its own network
    /// health before evicting someone else.
    pub async fn mark_dead_and_inform(
        &self,
        peer_id: &str,
        peer_address: &str,
        coordinator: &str,
        coordinator_address: &str,
    ) {
        let Some(url) = self.sanity_check_url.as_deref() else {
            warn!(peer = %peer_id, "no sanity-check url configured, suppressing dead declaration");
            return;
        };

        match self.transport.sanity_check(url).await {
            Ok(()) => {
                info!(peer = %peer_id, "sanity check passed, marking peer dead");
                if let Some(peer_table) = &self.peer_table {
                    peer_table.update_status(peer_id, false).await;
                }
                if let Some(peer_status_url) = &self.peer_status_url {
                    let payload = PeerStatusPayload {
                        peer: PeerInfo {
                            id: peer_id.to_string(),
                            address: peer_address.to_string(),
                            alive: false,
                        },
                        coordinator: coordinator.to_string(),
                        coordinator_address: coordinator_address.to_string(),
                    };
                    if let Err(err) = self.transport.post_status(peer_status_url, &payload).await
                    {
                        warn!(%err, "failed to post peer status");
                    }
                }
            }
            Err(err) => {
                warn!(peer = %peer_id, %err, "sanity check failed, suppressing dead declaration");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn no_sanity_url_suppresses_dead_declaration() {
        let peer_table = Arc::new(PeerTable::new());
        peer_table.add("n1", "10.0.0.1:8080").await;
        let reporter =
            LivenessReporter::new(HttpTransport::new(), None, None).with_peer_table(peer_table.clone());

        reporter
            .mark_dead_and_inform("n1", "10.0.0.1:8080", "n2", "10.0.0.2:8080")
            .await;

        assert_eq!(peer_table.get_status("n1").await, Some(true));
    }

    #[tokio::test]
    async fn failed_sanity_check_suppresses_dead_declaration() {
        let peer_table = Arc::new(PeerTable::new());
        peer_table.add("n1", "10.0.0.1:8080").await;
        let reporter = LivenessReporter::new(
            HttpTransport::new(),
            Some("http://127.0.0.1:0/healthz".into()),
            None,
        )
        .with_peer_table(peer_table.clone());

        reporter
            .mark_dead_and_inform("n1", "10.0.0.1:8080", "n2", "10.0.0.2:8080")
            .await;

        assert_eq!(peer_table.get_status("n1").await, Some(true));
    }

    #[tokio::test]
    async fn successful_sanity_check_marks_peer_dead_and_posts_status() {
        let sanity_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&sanity_server)
            .await;

        let status_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/peer-status"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&status_server)
            .await;

        let peer_table = Arc::new(PeerTable::new());
        peer_table.add("n1", "10.0.0.1:8080").await;

        let reporter = LivenessReporter::new(
            HttpTransport::new(),
            Some(format!("{}/healthz", sanity_server.uri())),
            Some(format!("{}/peer-status", status_server.uri())),
        )
        .with_peer_table(peer_table.clone());

        reporter
            .mark_dead_and_inform("n1", "10.0.0.1:8080", "n2", "10.0.0.2:8080")
            .await;

        assert_eq!(peer_table.get_status("n1").await, Some(false));
    }
}
