use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cluster_bully::config::Config;
use cluster_bully::election::{ElectionCore, ElectionParams};
use cluster_bully::error::AppError;
use cluster_bully::liveness::LivenessReporter;
use cluster_bully::membership::{ChannelMembershipSource, MembershipDriver, MembershipSource};
use cluster_bully::peer::PeerTable;
use cluster_bully::supervisor::Supervisor;
use cluster_bully::transport::HttpTransport;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        error!(%err, "fatal error, exiting");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let id = config.node_id();
    let address = config.address();

    info!(
        %id,
        %address,
        connect_max_retries = config.connect_max_retries,
        send_max_retries = config.send_max_retries,
        election_cooldown_period_s = config.election_cooldown_period.as_secs(),
        "starting bully election node",
    );

    let transport = HttpTransport::new();
    let peer_table = Arc::new(PeerTable::new());

    let liveness = Arc::new(
        LivenessReporter::new(
            transport.clone(),
            config.sanity_check_url.clone(),
            config.peer_status_url.clone(),
        )
        .with_peer_table(peer_table.clone()),
    );

    let election = Arc::new(ElectionCore::new(
        id.clone(),
        address.clone(),
        transport.clone(),
        peer_table.clone(),
        liveness,
        ElectionParams {
            send_max_retries: config.send_max_retries,
            send_cooldown_period: config.send_cooldown_period,
            cluster_status_url: config.cluster_status_url.clone(),
        },
    ));

    // Discovery of peers from the orchestrator's endpoint API is an external
    // collaborator: this crate only consumes snapshots fed in over a
    // channel. Wiring a real Kubernetes informer onto `tx` is the job of the
    // deployment, not this binary.
    let (tx, rx) = mpsc::channel::<HashMap<String, String>>(4);
    let source: Arc<dyn MembershipSource> = Arc::new(ChannelMembershipSource::new(rx));

    let membership = Arc::new(MembershipDriver::new(
        id.clone(),
        peer_table.clone(),
        transport.clone(),
        source,
        config.connect_max_retries,
        config.connect_cooldown_period,
    ));

    // Seed a single-node snapshot so the binary can start even with no
    // discovery process wired up yet. A real deployment pushes richer
    // snapshots onto `tx` (from a Kubernetes endpoint informer, a DNS
    // poller, or similar) as it observes the true replica set. Startup
    // blocks on applying this snapshot directly, mirroring the source's
    // `blockTillEpRefresh` wait for the first snapshot that contains this
    // node's own id, so the election loop and HTTP server never see an
    // empty peer table.
    let mut initial = HashMap::new();
    initial.insert(id.clone(), address.clone());
    membership.apply_snapshot(initial).await;

    // `tx` is kept alive for the process lifetime: dropping it would close
    // `rx`, and the next `recv` would report the membership source as
    // exhausted even though no real discovery process has failed.
    let _tx = tx;

    let supervisor = Supervisor::new(election, membership, config.election_cooldown_period);
    supervisor.run(config.listen_address).await
}
