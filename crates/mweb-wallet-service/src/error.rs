//! Error types

use mweb_core::StatusSnapshot;
use std::time::Duration;

/// Wallet session errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Key or amount error
    #[error(transparent)]
    Core(#[from] mweb_core::Error),

    /// Daemon RPC error
    #[error(transparent)]
    Sync(#[from] mweb_sync_mwebd::Error),

    /// Daemon supervision error
    #[error(transparent)]
    Daemon(#[from] mweb_daemon::Error),

    /// No daemon connection yet
    #[error("mwebd is not started")]
    NotStarted,

    /// Daemon still behind when the wait ran out
    #[error("mwebd not synced after {waited:?} ({})", describe_last(.last))]
    SyncTimeout {
        /// How long the wait ran
        waited: Duration,
        /// Last status seen
        last: Option<StatusSnapshot>,
    },
}

fn describe_last(last: &Option<StatusSnapshot>) -> String {
    match last {
        Some(status) => format!("{} blocks behind", status.blocks_remaining()),
        None => "no status received".to_string(),
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
