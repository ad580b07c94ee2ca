//! mwebd process supervision
//!
//! Launches the MWEB light-client daemon bound to loopback, waits until its
//! RPC answers, reports health and shuts it down again.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::result_large_err)]

pub mod config;
pub mod error;
pub mod launcher;
pub mod manager;
pub mod probe;

pub use config::DaemonConfig;
pub use error::{Error, Result};
pub use launcher::{DaemonLauncher, DaemonProcess, ExitInfo, LaunchSpec, ProcessLauncher};
pub use manager::{DaemonHealth, DaemonManager, DaemonState};
pub use probe::{ReadinessProbe, RpcReadinessProbe};
