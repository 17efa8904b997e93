use std::net::SocketAddr;

use reqwest::StatusCode;
use thiserror::Error;

/// Failures that can occur while assembling the process configuration from
/// the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingRequired(&'static str),

    #[error("{0} is not a valid listen address: {1}")]
    InvalidListenAddress(String, std::net::AddrParseError),
}

/// Failures from a single outbound HTTP call.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("sink responded with non-success status {0}")]
    Status(StatusCode),

    #[error("no URL configured for this sink")]
    NoUrl,
}

/// Failures surfaced by a `MembershipSource`.
#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("membership source failed: {0}")]
    Source(String),

    #[error("membership source is exhausted and will not produce further snapshots")]
    Exhausted,
}

/// Fatal, process-ending errors. Only the startup path and the supervisor's
/// top-level join return this; everything inside an election round is
/// absorbed per the error handling design.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind listener on {0}: {1}")]
    Bind(SocketAddr, std::io::Error),

    #[error("membership driver exited: {0}")]
    Membership(#[from] MembershipError),

    #[error("supervisor task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}
