//! Error types for daemon RPC operations

use tonic::Code;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// A failed remote call: daemon-side rejection or malformed response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct RpcError {
    /// gRPC status code
    pub code: Code,
    /// Daemon or client supplied message
    pub message: String,
}

impl RpcError {
    /// Build from code and message
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Response that does not satisfy the wire contract
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, format!("malformed response: {}", message.into()))
    }
}

impl From<tonic::Status> for RpcError {
    fn from(status: tonic::Status) -> Self {
        Self::new(status.code(), status.message())
    }
}

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Could not reach the daemon
    #[error("Connection error: {0}")]
    Connection(String),

    /// Remote call failed
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// UTXO stream broke after delivering `received` messages
    #[error("Stream failed after {received} messages: {source}")]
    StreamFailure {
        /// Messages delivered before the failure
        received: usize,
        /// Underlying cause
        source: RpcError,
    },

    /// Request rejected before any network activity
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Operation cancelled
    #[error("Cancelled")]
    Cancelled,

    /// Deadline elapsed
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Key material error
    #[error(transparent)]
    Core(#[from] mweb_core::Error),
}

impl From<tonic::Status> for Error {
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            Code::DeadlineExceeded => Error::Timeout(status.message().to_string()),
            Code::Cancelled => Error::Cancelled,
            _ => Error::Rpc(status.into()),
        }
    }
}

impl Error {
    /// Shorthand for a malformed-response error
    pub fn malformed(message: impl Into<String>) -> Self {
        Error::Rpc(RpcError::malformed(message))
    }

    /// Whether an idempotent call may be retried after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Connection(_) | Error::Timeout(_) | Error::Transport(_) => true,
            Error::Rpc(rpc) => matches!(
                rpc.code,
                Code::Unavailable | Code::ResourceExhausted | Code::Aborted | Code::DeadlineExceeded
            ),
            Error::StreamFailure { .. }
            | Error::InvalidRequest(_)
            | Error::Cancelled
            | Error::Core(_) => false,
        }
    }

    /// Status-code view of this error
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Error::Rpc(rpc) => rpc.clone(),
            Error::StreamFailure { source, .. } => source.clone(),
            Error::Connection(msg) => RpcError::new(Code::Unavailable, msg.clone()),
            Error::Timeout(msg) => RpcError::new(Code::DeadlineExceeded, msg.clone()),
            Error::Cancelled => RpcError::new(Code::Cancelled, "cancelled"),
            Error::InvalidRequest(msg) => RpcError::new(Code::InvalidArgument, msg.clone()),
            Error::Transport(e) => RpcError::new(Code::Unavailable, e.to_string()),
            Error::Core(e) => RpcError::new(Code::InvalidArgument, e.to_string()),
        }
    }
}
