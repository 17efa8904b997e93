use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::MembershipError;
use crate::peer::PeerTable;
use crate::transport::HttpTransport;

/// A membership snapshot: `id -> host:port`, as produced by whatever
/// discovers the orchestrator's service endpoints. Discovery itself is an
/// external collaborator: this crate only consumes snapshots through this
/// trait, never talks to the orchestrator directly.
#[async_trait::async_trait]
pub trait MembershipSource: Send + Sync {
    /// Blocks (asynchronously) until a new snapshot is available.
    async fn next_snapshot(&self) -> Result<HashMap<String, String>, MembershipError>;
}

/// Returns a fixed snapshot exactly once, then never resolves again. Useful
/// for bring-up with a single node or for tests that only care about the
/// initial seed.
pub struct StaticMembershipSource {
    snapshot: HashMap<String, String>,
    served: Mutex<bool>,
}

impl StaticMembershipSource {
    pub fn new(snapshot: HashMap<String, String>) -> Self {
        Self {
            snapshot,
            served: Mutex::new(false),
        }
    }
}

#[async_trait::async_trait]
impl MembershipSource for StaticMembershipSource {
    async fn next_snapshot(&self) -> Result<HashMap<String, String>, MembershipError> {
        let mut served = self.served.lock().await;
        if *served {
            std::future::pending::<()>().await;
            unreachable!("pending future never resolves");
        }
        *served = true;
        Ok(self.snapshot.clone())
    }
}

/// Wraps an external discovery process's channel of snapshots. A Kubernetes
/// endpoint-informer, a DNS poller, anything that can produce `{id ->
/// host:port}` feeds this independently of this crate.
pub struct ChannelMembershipSource {
    receiver: Mutex<tokio::sync::mpsc::Receiver<HashMap<String, String>>>,
}

impl ChannelMembershipSource {
    pub fn new(receiver: tokio::sync::mpsc::Receiver<HashMap<String, String>>) -> Self {
        Self {
            receiver: Mutex::new(receiver),
        }
    }
}

#[async_trait::async_trait]
impl MembershipSource for ChannelMembershipSource {
    async fn next_snapshot(&self) -> Result<HashMap<String, String>, MembershipError> {
        self.receiver
            .lock()
            .await
            .recv()
            .await
            .ok_or(MembershipError::Exhausted)
    }
}

/// Consumes membership snapshots and reseeds the Peer Table (C5). Reseeding
/// is destructive by design: a replica absent from the new snapshot must not
/// linger in the table.
pub struct MembershipDriver {
    self_id: String,
    peer_table: Arc<PeerTable>,
    transport: HttpTransport,
    source: Arc<dyn MembershipSource>,
    connect_max_retries: u32,
    connect_cooldown_period: Duration,
}

/// Bound on consecutive `MembershipError::Source` failures before `run`
/// gives up and propagates. An `Exhausted` error is terminal immediately,
/// since the source has told us in no uncertain terms it will never
/// produce again.
const MAX_CONSECUTIVE_SOURCE_FAILURES: u32 = 5;

impl MembershipDriver {
    pub fn new(
        self_id: String,
        peer_table: Arc<PeerTable>,
        transport: HttpTransport,
        source: Arc<dyn MembershipSource>,
        connect_max_retries: u32,
        connect_cooldown_period: Duration,
    ) -> Self {
        Self {
            self_id,
            peer_table,
            transport,
            source,
            connect_max_retries,
            connect_cooldown_period,
        }
    }

    /// Applies one snapshot to the Peer Table: `DeleteAll`, then probe and
    /// insert every entry other than this node's own id.
    pub async fn apply_snapshot(&self, snapshot: HashMap<String, String>) {
        self.peer_table.delete_all().await;

        for (id, address) in snapshot {
            if id == self.self_id {
                continue;
            }

            let mut connected = false;
            for attempt in 1..=self.connect_max_retries {
                match self.transport.ping(&address).await {
                    Ok(()) => {
                        debug!(peer = %id, %address, "connected to peer");
                        self.peer_table.add(&id, &address).await;
                        connected = true;
                        break;
                    }
                    Err(err) => {
                        debug!(peer = %id, %address, %attempt, %err, "failed to connect to peer");
                        if attempt < self.connect_max_retries {
                            tokio::time::sleep(self.connect_cooldown_period).await;
                        }
                    }
                }
            }

            if !connected {
                warn!(peer = %id, %address, retries = self.connect_max_retries, "skipping unreachable peer");
            }
        }
    }

    /// Runs forever, applying each snapshot as it arrives. A `Source` error
    /// is retried, with a cooldown between attempts, up to
    /// `MAX_CONSECUTIVE_SOURCE_FAILURES` times in a row before this task
    /// gives up and returns an error; a successful snapshot resets the
    /// failure count. `Exhausted` is never retried: it means the source has
    /// permanently stopped producing.
    pub async fn run(&self) -> Result<(), MembershipError> {
        let mut consecutive_failures = 0;
        loop {
            match self.source.next_snapshot().await {
                Ok(snapshot) => {
                    consecutive_failures = 0;
                    self.apply_snapshot(snapshot).await;
                }
                Err(MembershipError::Exhausted) => return Err(MembershipError::Exhausted),
                Err(err @ MembershipError::Source(_)) => {
                    consecutive_failures += 1;
                    warn!(%err, consecutive_failures, "membership source failed");
                    if consecutive_failures >= MAX_CONSECUTIVE_SOURCE_FAILURES {
                        return Err(err);
                    }
                    tokio::time::sleep(self.connect_cooldown_period).await;
                }
            }
        }
    }
}
