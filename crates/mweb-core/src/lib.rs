//! MWEB wallet core
//!
//! This crate implements the client-side wallet model: deterministic scan and
//! spend key derivation, the deduplicated UTXO set with balance accounting,
//! daemon status snapshots, address batches and display formatting.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
pub mod display;
pub mod error;
pub mod keys;
pub mod status;
pub mod utxo;

pub use address::AddressBatch;
pub use error::{Error, ErrorCategory, Result};
pub use keys::{
    derive, generate_mnemonic, KeyPair, ScanSecret, Seed, SpendPublicKey, SpendSecret,
};
pub use status::StatusSnapshot;
pub use utxo::{Balance, Utxo, UtxoSet};
