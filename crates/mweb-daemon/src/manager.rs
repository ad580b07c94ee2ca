//! mwebd lifecycle manager
//!
//! At most one daemon runs per manager. `start` and `stop` serialize on a
//! single lock, so overlapping calls never leave two processes alive.

use crate::config::DaemonConfig;
use crate::launcher::{DaemonLauncher, DaemonProcess, LaunchSpec, ProcessLauncher};
use crate::probe::{ReadinessProbe, RpcReadinessProbe};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::net::{Ipv4Addr, TcpListener};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const WRITE_CHECK_FILE: &str = ".mwebd-write-check";

/// Daemon process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DaemonState {
    /// Not started
    #[default]
    Stopped,
    /// Launched, waiting for RPC
    Starting,
    /// Serving RPC
    Running,
    /// Shutting down
    Stopping,
    /// Failed to start or exited unexpectedly
    Failed,
}

/// Daemon health snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonHealth {
    /// Current state
    pub state: DaemonState,
    /// Loopback RPC port while running
    pub port: Option<u16>,
    /// Seconds since the daemon became ready
    pub uptime_secs: u64,
    /// Whether a Status call succeeded just now
    pub rpc_reachable: bool,
}

struct DaemonHandle {
    process: Box<dyn DaemonProcess>,
    config: DaemonConfig,
}

#[derive(Debug, Clone)]
struct RunningInfo {
    port: u16,
    config: DaemonConfig,
    started_at: Instant,
}

/// Owns the mwebd process
pub struct DaemonManager {
    launcher: Arc<dyn DaemonLauncher>,
    probe: Arc<dyn ReadinessProbe>,
    handle: Mutex<Option<DaemonHandle>>,
    state: RwLock<DaemonState>,
    running: RwLock<Option<RunningInfo>>,
}

impl Default for DaemonManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DaemonManager {
    /// Manager that spawns the real binary and probes with Status
    pub fn new() -> Self {
        Self::with_components(
            Arc::new(ProcessLauncher),
            Arc::new(RpcReadinessProbe::default()),
        )
    }

    /// Manager with a custom launcher and readiness probe
    pub fn with_components(
        launcher: Arc<dyn DaemonLauncher>,
        probe: Arc<dyn ReadinessProbe>,
    ) -> Self {
        Self {
            launcher,
            probe,
            handle: Mutex::new(None),
            state: RwLock::new(DaemonState::Stopped),
            running: RwLock::new(None),
        }
    }

    /// Start the daemon and return its RPC port.
    ///
    /// A daemon already running under this manager is stopped first. The
    /// call returns once the daemon answers RPC, or fails with
    /// [`Error::Start`] when it exits early or misses `startup_timeout`.
    pub async fn start(&self, config: DaemonConfig) -> Result<u16> {
        let mut handle = self.handle.lock().await;
        if let Some(existing) = handle.take() {
            info!("Stopping running mwebd before restart");
            self.shutdown(existing).await?;
        }

        self.set_state(DaemonState::Starting);
        info!(chain = %config.chain, peer = %config.peer_addr, "Starting mwebd");

        match self.launch(&config).await {
            Ok((process, port)) => {
                *self.running.write() = Some(RunningInfo {
                    port,
                    config: config.clone(),
                    started_at: Instant::now(),
                });
                *handle = Some(DaemonHandle { process, config });
                self.set_state(DaemonState::Running);
                info!(port, "mwebd is running and ready");
                Ok(port)
            }
            Err(e) => {
                error!("mwebd failed to start: {}", e);
                self.set_state(DaemonState::Failed);
                Err(e)
            }
        }
    }

    /// Stop the daemon. No-op when nothing is running.
    pub async fn stop(&self) -> Result<()> {
        let mut handle = self.handle.lock().await;
        match handle.take() {
            Some(existing) => self.shutdown(existing).await,
            None => {
                debug!("mwebd not running; nothing to stop");
                Ok(())
            }
        }
    }

    /// RPC port of the running daemon
    pub fn bound_port(&self) -> Option<u16> {
        self.running.read().as_ref().map(|r| r.port)
    }

    /// Whether a daemon is serving RPC
    pub fn is_running(&self) -> bool {
        self.state() == DaemonState::Running
    }

    /// Current state
    pub fn state(&self) -> DaemonState {
        *self.state.read()
    }

    /// Configuration of the running daemon
    pub fn config(&self) -> Option<DaemonConfig> {
        self.running.read().as_ref().map(|r| r.config.clone())
    }

    /// Check the process and its RPC.
    ///
    /// A daemon that exited on its own is reaped here and reported `Failed`.
    pub async fn health(&self) -> DaemonHealth {
        {
            let mut handle = self.handle.lock().await;
            let exited = match handle.as_mut() {
                Some(h) => match h.process.try_exit() {
                    Ok(exit) => exit,
                    Err(e) => {
                        warn!("Could not check mwebd process: {}", e);
                        None
                    }
                },
                None => None,
            };
            if let Some(exit) = exited {
                error!(
                    status = %exit.status,
                    stderr = %exit.stderr_tail,
                    "mwebd exited unexpectedly"
                );
                *handle = None;
                *self.running.write() = None;
                self.set_state(DaemonState::Failed);
            }
        }

        let state = self.state();
        let running = self.running.read().clone();
        let (port, uptime_secs) = match &running {
            Some(r) => (Some(r.port), r.started_at.elapsed().as_secs()),
            None => (None, 0),
        };
        let rpc_reachable = match port {
            Some(port) => self.probe.probe(port).await.is_ok(),
            None => false,
        };

        DaemonHealth {
            state,
            port,
            uptime_secs,
            rpc_reachable,
        }
    }

    async fn launch(&self, config: &DaemonConfig) -> Result<(Box<dyn DaemonProcess>, u16)> {
        config.validate()?;
        prepare_data_dir(&config.data_dir)?;
        let port = resolve_port(config.listen_port)?;

        let spec = LaunchSpec::for_config(config, port);
        let mut process = self.launcher.launch(&spec).await?;
        info!(pid = ?process.id(), port, "mwebd process spawned");

        if let Err(e) = self.wait_for_ready(process.as_mut(), port, config).await {
            if let Err(kill_err) = process.terminate(config.shutdown_timeout).await {
                warn!("Failed to terminate mwebd after failed start: {}", kill_err);
            }
            return Err(e);
        }
        Ok((process, port))
    }

    async fn wait_for_ready(
        &self,
        process: &mut dyn DaemonProcess,
        port: u16,
        config: &DaemonConfig,
    ) -> Result<()> {
        let deadline = Instant::now() + config.startup_timeout;
        let mut attempts = 0u32;

        loop {
            if let Some(exit) = process.try_exit()? {
                let mut reason = format!("mwebd exited during startup ({})", exit.status);
                if !exit.stderr_tail.is_empty() {
                    reason.push_str(": ");
                    reason.push_str(&exit.stderr_tail);
                }
                return Err(Error::start(reason));
            }

            attempts += 1;
            match self.probe.probe(port).await {
                Ok(()) => {
                    debug!(attempts, "mwebd RPC ready");
                    return Ok(());
                }
                Err(e) => debug!(attempts, "mwebd not ready yet: {}", e),
            }

            if Instant::now() >= deadline {
                return Err(Error::start(format!(
                    "mwebd did not become ready on port {} within {:?}",
                    port, config.startup_timeout
                )));
            }
            tokio::time::sleep(config.ready_poll_interval).await;
        }
    }

    async fn shutdown(&self, mut handle: DaemonHandle) -> Result<()> {
        self.set_state(DaemonState::Stopping);
        info!("Stopping mwebd...");

        let result = handle
            .process
            .terminate(handle.config.shutdown_timeout)
            .await;
        *self.running.write() = None;

        match result {
            Ok(()) => {
                self.set_state(DaemonState::Stopped);
                info!("mwebd stopped");
                Ok(())
            }
            Err(e) => {
                error!("Failed to stop mwebd: {}", e);
                self.set_state(DaemonState::Failed);
                Err(e)
            }
        }
    }

    fn set_state(&self, state: DaemonState) {
        *self.state.write() = state;
    }
}

/// Create `dir` if needed and confirm it is writable
fn prepare_data_dir(dir: &Path) -> Result<()> {
    let unusable = |e: std::io::Error| {
        Error::start(format!("data directory {} is unusable: {}", dir.display(), e))
    };

    if dir.exists() && !dir.is_dir() {
        return Err(Error::start(format!(
            "data directory {} is not a directory",
            dir.display()
        )));
    }
    std::fs::create_dir_all(dir).map_err(unusable)?;

    let check = dir.join(WRITE_CHECK_FILE);
    std::fs::write(&check, b"").map_err(unusable)?;
    std::fs::remove_file(&check).map_err(unusable)?;
    Ok(())
}

/// `requested`, or a free loopback port when 0
fn resolve_port(requested: u16) -> Result<u16> {
    if requested != 0 {
        return Ok(requested);
    }
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .map_err(|e| Error::start(format!("no free loopback port: {}", e)))?;
    Ok(listener.local_addr()?.port())
}
