//! Readiness probing

use crate::Result;
use async_trait::async_trait;
use mweb_sync_mwebd::{MwebRpc, MwebdClient, MwebdClientConfig, RetryConfig};
use std::time::Duration;

/// Decides whether a launched daemon is serving RPC
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// `Ok` when the daemon on `port` answers
    async fn probe(&self, port: u16) -> Result<()>;
}

/// Probes with a single Status call
#[derive(Debug, Clone)]
pub struct RpcReadinessProbe {
    timeout: Duration,
}

impl RpcReadinessProbe {
    /// Probe whose calls give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for RpcReadinessProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl ReadinessProbe for RpcReadinessProbe {
    async fn probe(&self, port: u16) -> Result<()> {
        let client = MwebdClient::new(MwebdClientConfig {
            connect_timeout: self.timeout,
            request_timeout: self.timeout,
            retry: RetryConfig::none(),
            ..MwebdClientConfig::loopback(port)
        });
        client.status().await?;
        Ok(())
    }
}
