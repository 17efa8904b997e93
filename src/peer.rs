use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// A remote node, as tracked by this node's peer table.
#[derive(Debug, Clone)]
struct Peer {
    address: String,
    alive: bool,
}

/// The JSON-serializable view of a `Peer`, used in snapshots and status
/// payloads exchanged with peers and status sinks over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerInfo {
    pub id: String,
    pub address: String,
    pub alive: bool,
}

/// Thread-safe mapping of peer-id to peer record (C1).
///
/// Every operation takes the lock only for its own duration; callers compose
/// sequences of calls without external locking and accept that the table may
/// change between two calls.
pub struct PeerTable {
    peers: RwLock<HashMap<String, Peer>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Insert-or-overwrite. Always resets `alive` to `true`.
    pub async fn add(&self, id: &str, address: &str) {
        let mut peers = self.peers.write().await;
        peers.insert(
            id.to_string(),
            Peer {
                address: address.to_string(),
                alive: true,
            },
        );
    }

    pub async fn delete(&self, id: &str) {
        self.peers.write().await.remove(id);
    }

    pub async fn delete_all(&self) {
        let mut peers = self.peers.write().await;
        for (id, peer) in peers.drain() {
            debug!(peer_id = %id, address = %peer.address, "deleted peer");
        }
    }

    pub async fn find(&self, id: &str) -> bool {
        self.peers.read().await.contains_key(id)
    }

    /// Sets the alive bit for `id`. A no-op if `id` is absent: unlike the Go
    /// source (which indexes the map unconditionally and would panic on a
    /// nil entry), callers here only ever update ids they just observed, but
    /// the table itself does not trust that contract blindly.
    pub async fn update_status(&self, id: &str, alive: bool) {
        if let Some(peer) = self.peers.write().await.get_mut(id) {
            peer.alive = alive;
        }
    }

    pub async fn get_status(&self, id: &str) -> Option<bool> {
        self.peers.read().await.get(id).map(|p| p.alive)
    }

    /// Point-in-time copy. Order is unspecified.
    pub async fn peer_data(&self) -> Vec<PeerInfo> {
        self.peers
            .read()
            .await
            .iter()
            .map(|(id, peer)| PeerInfo {
                id: id.clone(),
                address: peer.address.clone(),
                alive: peer.alive,
            })
            .collect()
    }
}

impl Default for PeerTable {
    fn default() -> Self {
        Self::new()
    }
}
