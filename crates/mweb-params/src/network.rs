//! Litecoin chain definitions as understood by `mwebd`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default local port for the daemon's gRPC listener
pub const DEFAULT_RPC_PORT: u16 = 9332;

/// Purpose level of the MWEB key derivation path (`m/1000'/...`)
pub const MWEB_PURPOSE: u32 = 1000;

/// Coin type level of the MWEB key derivation path (`m/1000'/2'/...`)
pub const MWEB_COIN_TYPE: u32 = 2;

/// Child index of the scan key below the account node
pub const DEFAULT_SCAN_INDEX: u32 = 0;

/// Child index of the spend key below the account node
pub const DEFAULT_SPEND_INDEX: u32 = 1;

/// Chain identifier passed to the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Mainnet
    #[default]
    Mainnet,
    /// Testnet
    Testnet,
    /// Regtest (local development)
    Regtest,
}

impl Chain {
    /// Identifier string the daemon expects
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Regtest => "regtest",
        }
    }

    /// Network parameters for this chain
    pub const fn network(&self) -> Network {
        Network::from_chain(*self)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Self::Mainnet),
            "testnet" | "test" | "testnet4" => Ok(Self::Testnet),
            "regtest" => Ok(Self::Regtest),
            other => Err(Error::InvalidChain(other.to_string())),
        }
    }
}

/// Network configuration
#[derive(Debug, Clone)]
pub struct Network {
    /// Chain identifier
    pub chain: Chain,
    /// P2P port
    pub p2p_port: u16,
    /// Peer used when none is configured. Must advertise NODE_MWEB_LIGHT_CLIENT.
    pub default_peer: Option<&'static str>,
    /// First block carrying MWEB data; default start height for UTXO scans
    pub mweb_activation_height: u32,
}

impl Network {
    /// Get mainnet parameters
    pub const fn mainnet() -> Self {
        Self {
            chain: Chain::Mainnet,
            p2p_port: 9333,
            default_peer: Some("88.198.50.4:9333"),
            mweb_activation_height: 2_265_984,
        }
    }

    /// Get testnet parameters
    pub const fn testnet() -> Self {
        Self {
            chain: Chain::Testnet,
            p2p_port: 19335,
            default_peer: None,
            mweb_activation_height: 2_215_584,
        }
    }

    /// Get regtest parameters
    pub const fn regtest() -> Self {
        Self {
            chain: Chain::Regtest,
            p2p_port: 19444,
            default_peer: Some("127.0.0.1:19444"),
            // Regtest activates MWEB through deployment params, scan from genesis
            mweb_activation_height: 0,
        }
    }

    /// Get network by chain
    pub const fn from_chain(chain: Chain) -> Self {
        match chain {
            Chain::Mainnet => Self::mainnet(),
            Chain::Testnet => Self::testnet(),
            Chain::Regtest => Self::regtest(),
        }
    }

    /// Check if MWEB is active at given height
    pub const fn is_mweb_active(&self, height: u32) -> bool {
        height >= self.mweb_activation_height
    }
}
