//! MWEB wallet session
//!
//! Ties the pieces together for one wallet account: supervises mwebd,
//! derives the account keys and drives the client and UTXO stream against
//! the daemon's port.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::result_large_err)]

pub mod error;
pub mod session;

pub use error::{Error, Result};
pub use session::{RpcFactory, WalletSession};
