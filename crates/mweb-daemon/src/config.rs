//! Daemon configuration

use crate::{Error, Result};
use mweb_params::Chain;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variables consulted by [`DaemonConfig::with_env_overrides`]
pub mod env {
    /// Path to the mwebd binary
    pub const BINARY: &str = "MWEBD_BINARY";
    /// Chain identifier
    pub const CHAIN: &str = "MWEBD_CHAIN";
    /// Data directory
    pub const DATA_DIR: &str = "MWEBD_DATA_DIR";
    /// Peer address
    pub const PEER: &str = "MWEBD_PEER";
    /// Proxy address
    pub const PROXY: &str = "MWEBD_PROXY";
    /// Loopback RPC port, 0 for ephemeral
    pub const LISTEN_PORT: &str = "MWEBD_LISTEN_PORT";
    /// Startup timeout in seconds
    pub const STARTUP_TIMEOUT_SECS: &str = "MWEBD_STARTUP_TIMEOUT_SECS";
}

/// mwebd launch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Chain the daemon syncs
    pub chain: Chain,
    /// Header and UTXO storage
    pub data_dir: PathBuf,
    /// Litecoin node to sync from, `host:port`
    pub peer_addr: String,
    /// Optional SOCKS proxy, `host:port`
    pub proxy_addr: Option<String>,
    /// Loopback RPC port; 0 picks a free one
    pub listen_port: u16,
    /// Daemon executable
    pub binary_path: PathBuf,
    /// How long to wait for the RPC to answer after launch
    #[serde(with = "duration_ms")]
    pub startup_timeout: Duration,
    /// Delay between readiness probes
    #[serde(with = "duration_ms")]
    pub ready_poll_interval: Duration,
    /// How long to wait for the process to exit on stop
    #[serde(with = "duration_ms")]
    pub shutdown_timeout: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::for_chain(Chain::Mainnet, "mwebd-data")
    }
}

impl DaemonConfig {
    /// Defaults for `chain`, with the chain's default peer when it has one
    pub fn for_chain(chain: Chain, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            chain,
            data_dir: data_dir.into(),
            peer_addr: chain.network().default_peer.unwrap_or_default().to_string(),
            proxy_addr: None,
            listen_port: 0,
            binary_path: PathBuf::from("mwebd"),
            startup_timeout: Duration::from_secs(60),
            ready_poll_interval: Duration::from_millis(250),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    /// Load from a JSON file; missing fields take defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    /// Apply `MWEBD_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by the names in [`env`]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(chain) = lookup(env::CHAIN) {
            let chain: Chain = chain
                .parse()
                .map_err(|e: mweb_params::Error| Error::InvalidConfig(e.to_string()))?;
            if chain != self.chain {
                // Peer default follows the chain unless set explicitly below
                self.peer_addr = chain.network().default_peer.unwrap_or_default().to_string();
            }
            self.chain = chain;
        }
        if let Some(binary) = lookup(env::BINARY) {
            self.binary_path = PathBuf::from(binary);
        }
        if let Some(dir) = lookup(env::DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(peer) = lookup(env::PEER) {
            self.peer_addr = peer;
        }
        if let Some(proxy) = lookup(env::PROXY) {
            self.proxy_addr = if proxy.trim().is_empty() {
                None
            } else {
                Some(proxy)
            };
        }
        if let Some(port) = lookup(env::LISTEN_PORT) {
            self.listen_port = port.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("{} is not a port: {}", env::LISTEN_PORT, port))
            })?;
        }
        if let Some(secs) = lookup(env::STARTUP_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!(
                    "{} is not a number of seconds: {}",
                    env::STARTUP_TIMEOUT_SECS,
                    secs
                ))
            })?;
            self.startup_timeout = Duration::from_secs(secs);
        }
        Ok(self)
    }

    /// Reject configurations the daemon cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.binary_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("binary path is empty".to_string()));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("data directory is empty".to_string()));
        }
        if self.peer_addr.trim().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "no peer address set and {} has no default peer",
                self.chain
            )));
        }
        validate_host_port("peer address", &self.peer_addr)?;
        if let Some(proxy) = &self.proxy_addr {
            validate_host_port("proxy address", proxy)?;
        }
        if self.startup_timeout.is_zero() {
            return Err(Error::InvalidConfig("startup timeout is zero".to_string()));
        }
        if self.ready_poll_interval.is_zero() {
            return Err(Error::InvalidConfig("ready poll interval is zero".to_string()));
        }
        Ok(())
    }
}

fn validate_host_port(what: &str, addr: &str) -> Result<()> {
    let invalid = || Error::InvalidConfig(format!("{} must be host:port, got '{}'", what, addr));
    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(invalid());
    }
    match port.parse::<u16>() {
        Ok(p) if p != 0 => Ok(()),
        _ => Err(invalid()),
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
