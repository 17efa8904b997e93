//! Bully leader election for a dynamic, orchestrator-managed replica set.
//!
//! `peer` tracks known replicas, `transport` carries HTTP between them,
//! `election` runs the Bully algorithm itself, `liveness` gates dead-peer
//! declarations on a sanity check, `membership` reseeds the peer table from
//! discovery snapshots, and `supervisor` wires all of it into one running
//! process. `config` and `error` are the ambient plumbing underneath.

pub mod config;
pub mod election;
pub mod error;
pub mod liveness;
pub mod membership;
pub mod peer;
pub mod supervisor;
pub mod transport;
