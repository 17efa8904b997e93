use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;

/// Process-wide tunables, assembled once at startup from the environment.
///
/// Mirrors the shape of the original `ParseEnvElseDefault` helper, but fixes
/// the source's own documented defect: an override is applied whenever the
/// variable parses, not only when parsing fails.
#[derive(Debug, Clone)]
pub struct Config {
    pub connect_cooldown_period: Duration,
    pub connect_max_retries: u32,
    pub send_cooldown_period: Duration,
    pub send_max_retries: u32,
    pub election_cooldown_period: Duration,
    pub peer_status_url: Option<String>,
    pub cluster_status_url: Option<String>,
    pub sanity_check_url: Option<String>,
    pub listen_address: SocketAddr,
    pub node_name: String,
    pub pod_ip: String,
}

impl Config {
    /// Loads configuration from the environment, applying the defaults
    /// documented on each field below. Fails if a required variable is
    /// missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        let node_name = required("NODE_NAME")?;
        let pod_ip = required("POD_IP")?;
        let port = parse_env_else_default("CONTAINER_PORT", 8080);

        let listen_address = format!("0.0.0.0:{port}")
            .parse()
            .map_err(|e| ConfigError::InvalidListenAddress(format!("0.0.0.0:{port}"), e))?;

        Ok(Self {
            connect_cooldown_period: Duration::from_secs(
                parse_env_else_default("CONNECT_COOLDOWN_PERIOD", 2) as u64,
            ),
            connect_max_retries: parse_env_else_default("CONNECT_MAX_RETRIES", 5),
            send_cooldown_period: Duration::from_secs(
                parse_env_else_default("SEND_COOLDOWN_PERIOD", 1) as u64,
            ),
            send_max_retries: parse_env_else_default("SEND_MAX_RETRIES", 5),
            election_cooldown_period: Duration::from_secs(
                parse_env_else_default("ELECTION_COOLDOWN_PERIOD", 15) as u64,
            ),
            peer_status_url: optional("PEER_STATUS_URL"),
            cluster_status_url: optional("CLUSTER_STATUS_URL"),
            sanity_check_url: optional("SANITY_CHECK_URL"),
            listen_address,
            node_name,
            pod_ip,
        })
    }

    /// This node's id, deterministic from its name and address: `name@digits`.
    /// Matches the Go source's `strings.Replace(addr, ".", "", -1)`.
    pub fn node_id(&self) -> String {
        format!("{}@{}", self.node_name, self.pod_ip.replace('.', ""))
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.pod_ip, self.listen_address.port())
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingRequired(name)),
    }
}

fn optional(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Some(v),
        _ => None,
    }
}

/// Applies an environment override on successful parse, falling back to
/// `default` when the variable is absent or fails to parse (with a warning
/// in the latter case, so a malformed override is visible).
fn parse_env_else_default(name: &str, default: u32) -> u32 {
    match env::var(name) {
        Ok(raw) if !raw.is_empty() => match raw.parse() {
            Ok(v) => v,
            Err(err) => {
                warn!(%name, %raw, %err, "failed to parse environment override, using default");
                default
            }
        },
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for k in [
            "NODE_NAME",
            "POD_IP",
            "CONTAINER_PORT",
            "CONNECT_COOLDOWN_PERIOD",
            "CONNECT_MAX_RETRIES",
            "SEND_COOLDOWN_PERIOD",
            "SEND_MAX_RETRIES",
            "ELECTION_COOLDOWN_PERIOD",
            "PEER_STATUS_URL",
            "CLUSTER_STATUS_URL",
            "SANITY_CHECK_URL",
        ] {
            unsafe { env::remove_var(k) };
        }
    }

    #[test]
    fn missing_required_fails() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired("NODE_NAME")));
    }

    #[test]
    fn defaults_apply_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        unsafe {
            env::set_var("NODE_NAME", "node-a");
            env::set_var("POD_IP", "10.0.0.1");
        }
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.election_cooldown_period, Duration::from_secs(15));
        assert_eq!(cfg.send_max_retries, 5);
        assert_eq!(cfg.node_id(), "node-a@10001");
        assert_eq!(cfg.listen_address.port(), 8080);
        clear_all();
    }

    #[test]
    fn successful_override_applies() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        unsafe {
            env::set_var("NODE_NAME", "node-a");
            env::set_var("POD_IP", "10.0.0.1");
            env::set_var("ELECTION_COOLDOWN_PERIOD", "30");
        }
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.election_cooldown_period, Duration::from_secs(30));
        clear_all();
    }

    #[test]
    fn unparsable_override_falls_back_to_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        unsafe {
            env::set_var("NODE_NAME", "node-a");
            env::set_var("POD_IP", "10.0.0.1");
            env::set_var("SEND_MAX_RETRIES", "not-a-number");
        }
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.send_max_retries, 5);
        clear_all();
    }
}
