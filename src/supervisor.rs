use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use crate::election::ElectionCore;
use crate::error::AppError;
use crate::membership::MembershipDriver;
use crate::transport::build_router;

/// Periodic election trigger and startup wiring (C6).
pub struct Supervisor {
    election: Arc<ElectionCore>,
    membership: Arc<MembershipDriver>,
    election_cooldown_period: Duration,
}

impl Supervisor {
    pub fn new(
        election: Arc<ElectionCore>,
        membership: Arc<MembershipDriver>,
        election_cooldown_period: Duration,
    ) -> Self {
        Self {
            election,
            membership,
            election_cooldown_period,
        }
    }

    /// Sleeps `election_cooldown_period`, then calls `elect()`; repeats
    /// forever. No jitter, no overlapping `elect()` calls: the next tick
    /// fires only after the previous `elect()` has fully completed.
    async fn election_loop(&self) {
        loop {
            tokio::time::sleep(self.election_cooldown_period).await;
            self.election.elect().await;
        }
    }

    /// Binds the inbound HTTP server and runs the election loop and
    /// membership driver concurrently. Returns only on a fatal error (listener
    /// bind failure or membership source exhaustion); the caller is expected
    /// to exit the process in that case.
    pub async fn run(&self, listen_address: std::net::SocketAddr) -> Result<(), AppError> {
        let listener = TcpListener::bind(listen_address)
            .await
            .map_err(|e| AppError::Bind(listen_address, e))?;
        info!(%listen_address, "listening");

        let router = build_router(self.election.clone());
        let server = axum::serve(listener, router);

        tokio::select! {
            result = server => {
                result.expect("hyper server future does not return an error for this configuration");
                Ok(())
            }
            () = self.election_loop() => {
                unreachable!("election_loop never returns")
            }
            result = self.membership.run() => {
                Err(AppError::Membership(result.unwrap_err()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::election::ElectionParams;
    use crate::liveness::LivenessReporter;
    use crate::membership::StaticMembershipSource;
    use crate::peer::PeerTable;
    use crate::transport::HttpTransport;
    use std::collections::HashMap;

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let peer_table = Arc::new(PeerTable::new());
        let liveness = Arc::new(LivenessReporter::new(HttpTransport::new(), None, None));
        let election = Arc::new(ElectionCore::new(
            "n1".into(),
            "127.0.0.1:0".into(),
            HttpTransport::new(),
            peer_table.clone(),
            liveness,
            ElectionParams {
                send_max_retries: 1,
                send_cooldown_period: Duration::from_millis(1),
                cluster_status_url: None,
            },
        ));
        let membership = Arc::new(MembershipDriver::new(
            "n1".into(),
            peer_table,
            HttpTransport::new(),
            Arc::new(StaticMembershipSource::new(HashMap::new())),
            1,
            Duration::from_millis(1),
        ));
        let supervisor = Supervisor::new(election, membership, Duration::from_secs(3600));

        // Bind to an address, then try to bind again on the same port.
        let first = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken_addr = first.local_addr().unwrap();
        drop(first);
        let _occupy = TcpListener::bind(taken_addr).await.unwrap();

        let result = supervisor.run(taken_addr).await;
        assert!(matches!(result, Err(AppError::Bind(_, _))));
    }
}
