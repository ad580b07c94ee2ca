//! Error types

/// Daemon supervision errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The daemon could not be brought up
    #[error("mwebd failed to start: {reason}")]
    Start {
        /// What went wrong, including the daemon's stderr when it exited
        reason: String,
    },

    /// Configuration rejected before launch
    #[error("Invalid daemon configuration: {0}")]
    InvalidConfig(String),

    /// Process I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// RPC error while probing the daemon
    #[error("RPC error: {0}")]
    Rpc(#[from] mweb_sync_mwebd::Error),
}

impl Error {
    pub(crate) fn start(reason: impl Into<String>) -> Self {
        Error::Start {
            reason: reason.into(),
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
