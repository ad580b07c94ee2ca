//! mwebd gRPC sync client
//!
//! Talks to a local MWEB light-client daemon: status polling, address
//! derivation, the server-streamed UTXO feed with deduplication, spentness
//! checks and transaction create/broadcast.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::result_large_err)]

pub mod cancel;
pub mod client;
pub mod error;
pub mod proto_types;
pub mod stream;
pub mod transport;

pub use cancel::CancelToken;
pub use client::{
    CreateRequest, CreatedTransaction, MwebRpc, MwebdClient, MwebdClientConfig, RetryConfig,
    UtxoStream,
};
pub use error::{Error, Result, RpcError};
pub use stream::{StreamOutcome, StreamState, UtxoStreamConsumer, UtxoStreamEvent};
pub use transport::{connect, ChannelTarget, Security, TlsConfig, TransportOptions};
