use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::liveness::LivenessReporter;
use crate::peer::PeerTable;
use crate::transport::{ClusterStatusPayload, HttpTransport};

/// Tunables that only the election round needs, split out of `Config` so
/// `ElectionCore` doesn't have to depend on the whole process configuration.
#[derive(Debug, Clone)]
pub struct ElectionParams {
    pub send_max_retries: u32,
    pub send_cooldown_period: Duration,
    pub cluster_status_url: Option<String>,
}

/// Implements the Bully election protocol (C3): responds to coordinator
/// announcements, challenges superiors, claims leadership, notifies
/// inferiors.
pub struct ElectionCore {
    id: String,
    address: String,
    transport: HttpTransport,
    peer_table: Arc<PeerTable>,
    coordinator_id: RwLock<String>,
    liveness: Arc<LivenessReporter>,
    params: ElectionParams,
}

impl ElectionCore {
    pub fn new(
        id: String,
        address: String,
        transport: HttpTransport,
        peer_table: Arc<PeerTable>,
        liveness: Arc<LivenessReporter>,
        params: ElectionParams,
    ) -> Self {
        let coordinator_id = RwLock::new(id.clone());
        Self {
            id,
            address,
            transport,
            peer_table,
            coordinator_id,
            liveness,
            params,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Applies the monotonic rule: accept `id` as the new coordinator if it
    /// is lexicographically greater than the current value, or equals this
    /// node's own id (self-promotion). Otherwise ignored silently.
    pub async fn set_coordinator(&self, id: &str) {
        let mut coordinator = self.coordinator_id.write().await;
        if id > coordinator.as_str() || id == self.id {
            info!(new_coordinator = %id, old_coordinator = %*coordinator, "setting coordinator");
            *coordinator = id.to_string();
        }
    }

    pub async fn coordinator(&self) -> String {
        self.coordinator_id.read().await.clone()
    }

    /// Announces this node as coordinator to `address`, retrying up to
    /// `send_max_retries` times with `send_cooldown_period` between
    /// attempts. On exhaustion, if this node is currently coordinator and
    /// `to` was previously alive, hands off to the Liveness Reporter.
    pub async fn send(&self, to: &str, address: &str) -> Result<(), ()> {
        info!(peer = %to, "sending coordinator announcement");
        for attempt in 1..=self.params.send_max_retries {
            match self.transport.announce_coordinator(address, &self.id).await {
                Ok(()) => {
                    info!(peer = %to, "announcement delivered");
                    self.peer_table.update_status(to, true).await;
                    return Ok(());
                }
                Err(err) => {
                    debug!(peer = %to, %attempt, %err, "announcement attempt failed");
                    if attempt >= self.params.send_max_retries {
                        break;
                    }
                    tokio::time::sleep(self.params.send_cooldown_period).await;
                }
            }
        }

        info!(peer = %to, retries = self.params.send_max_retries, "exhausted retries sending to peer");
        let was_alive = self.peer_table.get_status(to).await.unwrap_or(false);
        if self.coordinator().await == self.id && was_alive {
            self.liveness
                .mark_dead_and_inform(to, address, &self.id, &self.address)
                .await;
        }
        Err(())
    }

    /// Runs one Bully election round.
    pub async fn elect(&self) {
        info!("electing coordinator");
        let snapshot = self.peer_table.peer_data().await;

        for peer in snapshot.iter().filter(|p| p.id.as_str() > self.id.as_str()) {
            debug!(superior = %peer.id, "pinging superior");
            if self.transport.ping(&peer.address).await.is_ok() {
                debug!(superior = %peer.id, "superior responded, standing down");
                return;
            }
            debug!(superior = %peer.id, "superior did not respond");
        }

        info!("no superior responded, claiming coordinator");
        self.set_coordinator(&self.id).await;

        for peer in snapshot.iter() {
            let _ = self.send(&peer.id, &peer.address).await;
        }

        if let Some(url) = self.params.cluster_status_url.clone() {
            let coordinator = self.id.clone();
            let coordinator_address = self.address.clone();
            let transport = self.transport.clone();
            let payload = ClusterStatusPayload {
                peer_map: snapshot,
                coordinator,
                coordinator_address,
            };
            tokio::spawn(async move {
                if let Err(err) = transport.post_status(&url, &payload).await {
                    tracing::warn!(%url, %err, "failed to post cluster status");
                }
            });
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(id: impl Into<String>, peer_table: Arc<PeerTable>) -> Self {
        Self::new(
            id.into(),
            "127.0.0.1:0".into(),
            HttpTransport::new(),
            peer_table,
            Arc::new(LivenessReporter::new(HttpTransport::new(), None, None)),
            ElectionParams {
                send_max_retries: 3,
                send_cooldown_period: Duration::from_millis(1),
                cluster_status_url: None,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn self_promotion_always_applies() {
        let core = ElectionCore::for_test("n2", Arc::new(PeerTable::new()));
        core.set_coordinator("n9").await;
        assert_eq!(core.coordinator().await, "n9");
        core.set_coordinator("n2").await;
        assert_eq!(core.coordinator().await, "n2");
    }

    #[tokio::test]
    async fn lesser_id_is_ignored() {
        let core = ElectionCore::for_test("n5", Arc::new(PeerTable::new()));
        core.set_coordinator("n9").await;
        core.set_coordinator("n3").await;
        assert_eq!(core.coordinator().await, "n9");
    }

    #[tokio::test]
    async fn equal_id_is_idempotent() {
        let core = ElectionCore::for_test("n5", Arc::new(PeerTable::new()));
        core.set_coordinator("n5").await;
        core.set_coordinator("n5").await;
        assert_eq!(core.coordinator().await, "n5");
    }

    #[tokio::test]
    async fn empty_peer_set_self_promotes_with_no_announcements() {
        let core = ElectionCore::for_test("n1", Arc::new(PeerTable::new()));
        core.elect().await;
        assert_eq!(core.coordinator().await, "n1");
    }

    #[tokio::test]
    async fn unreachable_superior_falls_through_to_self_promotion() {
        let peer_table = Arc::new(PeerTable::new());
        // Port 0 never accepts connections; ping will fail as a transport error.
        peer_table.add("n9", "127.0.0.1:0").await;
        let core = ElectionCore::for_test("n1", peer_table);
        core.elect().await;
        assert_eq!(core.coordinator().await, "n1");
    }
}
