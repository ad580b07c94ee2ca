//! Litecoin MWEB chain parameters and constants
//!
//! This crate provides chain identifiers understood by `mwebd`, default
//! daemon/peer ports, MWEB activation heights and the key derivation path
//! constants shared by every MWEB wallet.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consensus;
pub mod network;

pub use consensus::{is_valid_amount, COIN, MAX_MONEY};
pub use network::{
    Chain, Network, DEFAULT_RPC_PORT, MWEB_COIN_TYPE, MWEB_PURPOSE, DEFAULT_SCAN_INDEX,
    DEFAULT_SPEND_INDEX,
};

/// Error types for parameter operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown chain identifier
    #[error("Invalid chain: {0}")]
    InvalidChain(String),
}

/// Result type for parameter operations
pub type Result<T> = std::result::Result<T, Error>;
