//! Process launching
//!
//! [`DaemonLauncher`] is the seam between the manager and the operating
//! system. [`ProcessLauncher`] spawns the real binary; tests substitute a
//! fake that never touches a process table.

use crate::config::DaemonConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Lines of stderr kept for startup failure reports
const STDERR_TAIL_LINES: usize = 20;

/// A resolved launch: program, arguments and the port it will listen on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable
    pub program: PathBuf,
    /// Command-line arguments
    pub args: Vec<String>,
    /// Loopback RPC port
    pub port: u16,
}

impl LaunchSpec {
    /// Command line for `config` listening on `port`
    pub fn for_config(config: &DaemonConfig, port: u16) -> Self {
        let mut args = vec![
            "-c".to_string(),
            config.chain.as_str().to_string(),
            "-d".to_string(),
            config.data_dir.display().to_string(),
            "-l".to_string(),
            format!("127.0.0.1:{}", port),
            "-p".to_string(),
            config.peer_addr.clone(),
        ];
        if let Some(proxy) = &config.proxy_addr {
            args.push("-proxy".to_string());
            args.push(proxy.clone());
        }
        Self {
            program: config.binary_path.clone(),
            args,
            port,
        }
    }
}

/// How a daemon process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit status as reported by the OS
    pub status: String,
    /// Last lines the process wrote to stderr
    pub stderr_tail: String,
}

/// A launched daemon
#[async_trait]
pub trait DaemonProcess: Send {
    /// OS process id, if still known
    fn id(&self) -> Option<u32>;

    /// `Some` once the process has exited
    fn try_exit(&mut self) -> Result<Option<ExitInfo>>;

    /// Stop the process, waiting up to `timeout` for it to be reaped
    async fn terminate(&mut self, timeout: Duration) -> Result<()>;
}

/// Starts daemon processes
#[async_trait]
pub trait DaemonLauncher: Send + Sync {
    /// Spawn the daemon described by `spec`
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn DaemonProcess>>;
}

/// Launches the real mwebd binary
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

#[async_trait]
impl DaemonLauncher for ProcessLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn DaemonProcess>> {
        debug!(
            program = %spec.program.display(),
            args = ?spec.args,
            "Spawning mwebd"
        );

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::start(format!(
                    "failed to spawn {}: {}",
                    spec.program.display(),
                    e
                ))
            })?;

        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let reader = child.stderr.take().map(|stderr| {
            let tail = Arc::clone(&stderr_tail);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "mwebd", "{}", line);
                    let mut tail = tail.lock();
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            })
        });

        Ok(Box::new(ChildProcess {
            child,
            stderr_tail,
            reader,
        }))
    }
}

struct ChildProcess {
    child: Child,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    reader: Option<tokio::task::JoinHandle<()>>,
}

impl ChildProcess {
    fn stderr_tail(&self) -> String {
        self.stderr_tail
            .lock()
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl DaemonProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn try_exit(&mut self) -> Result<Option<ExitInfo>> {
        match self.child.try_wait()? {
            Some(status) => Ok(Some(ExitInfo {
                status: status.to_string(),
                stderr_tail: self.stderr_tail(),
            })),
            None => Ok(None),
        }
    }

    async fn terminate(&mut self, timeout: Duration) -> Result<()> {
        if self.child.try_wait()?.is_none() {
            self.child.start_kill()?;
        }
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(%status, "mwebd exited");
            }
            Err(_) => {
                warn!(
                    pid = ?self.child.id(),
                    timeout_ms = timeout.as_millis() as u64,
                    "mwebd not reaped before shutdown timeout"
                );
            }
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        Ok(())
    }
}
