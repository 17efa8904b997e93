use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::election::ElectionCore;
use crate::error::TransportError;
use crate::peer::PeerInfo;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Body posted to `peer_status_url` when a single peer's liveness changes.
#[derive(Debug, Serialize)]
pub struct PeerStatusPayload {
    pub peer: PeerInfo,
    pub coordinator: String,
    pub coordinator_address: String,
}

/// Body posted to `cluster_status_url` after an election round settles.
#[derive(Debug, Serialize)]
pub struct ClusterStatusPayload {
    pub peer_map: Vec<PeerInfo>,
    pub coordinator: String,
    pub coordinator_address: String,
}

/// Outbound HTTP client (C2, client side). One instance is shared by the
/// whole process; `reqwest::Client` is internally `Arc`-backed and cheap to
/// clone.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .expect("static reqwest client configuration is always valid");
        Self { client }
    }

    /// `GET http://<address>/ping`. Only transport-level success/failure is
    /// observed; the response status code is not inspected, matching the
    /// source's plain `http.Get` error check.
    pub async fn ping(&self, address: &str) -> Result<(), TransportError> {
        self.client
            .get(format!("http://{address}/ping"))
            .send()
            .await?;
        Ok(())
    }

    /// `GET http://<address>/coordinator?id=<my_id>`.
    pub async fn announce_coordinator(
        &self,
        address: &str,
        my_id: &str,
    ) -> Result<(), TransportError> {
        self.client
            .get(format!("http://{address}/coordinator"))
            .query(&[("id", my_id)])
            .send()
            .await?;
        Ok(())
    }

    /// A bare `GET <url>` used as a self-health probe. The URL is used
    /// verbatim (it is not necessarily a peer address), and only
    /// transport-level success/failure is observed.
    pub async fn sanity_check(&self, url: &str) -> Result<(), TransportError> {
        self.client.get(url).send().await?;
        Ok(())
    }

    /// `POST <url>` with a JSON body. Success requires a 2xx response.
    pub async fn post_status<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<(), TransportError> {
        let response = self.client.post(url).json(body).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(response.status()))
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
pub struct CoordinatorQuery {
    id: String,
}

async fn handle_ping() -> &'static str {
    "pong"
}

async fn handle_coordinator(
    State(election): State<Arc<ElectionCore>>,
    Query(query): Query<CoordinatorQuery>,
) -> &'static str {
    election.set_coordinator(&query.id).await;
    ""
}

/// Builds the inbound HTTP server (C2, server side): `/ping` and
/// `/coordinator`.
pub fn build_router(election: Arc<ElectionCore>) -> Router {
    Router::new()
        .route("/ping", get(handle_ping))
        .route("/coordinator", get(handle_coordinator))
        .with_state(election)
}
