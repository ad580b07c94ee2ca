//! Wallet session
//!
//! One account's view of the MWEB chain. The session owns the daemon
//! manager and, once a daemon is up (or attached), a client and UTXO stream
//! consumer bound to its port. Dropping the connection keeps the last UTXO
//! snapshot readable.

use crate::{Error, Result};
use mweb_core::{AddressBatch, Balance, KeyPair, Seed, StatusSnapshot, UtxoSet};
use mweb_daemon::{DaemonConfig, DaemonManager};
use mweb_params::{Chain, Network};
use mweb_sync_mwebd::{
    CancelToken, CreateRequest, CreatedTransaction, MwebRpc, MwebdClient, StreamOutcome,
    StreamState, UtxoStreamConsumer, UtxoStreamEvent,
};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Builds the RPC client for a daemon on a loopback port
pub type RpcFactory = Arc<dyn Fn(u16) -> Arc<dyn MwebRpc> + Send + Sync>;

struct Connection {
    port: u16,
    rpc: Arc<dyn MwebRpc>,
    stream: Arc<UtxoStreamConsumer>,
}

/// A wallet account talking to mwebd
pub struct WalletSession {
    keys: KeyPair,
    network: Network,
    daemon: DaemonManager,
    rpc_factory: RpcFactory,
    connection: RwLock<Option<Arc<Connection>>>,
    retained: RwLock<UtxoSet>,
}

impl WalletSession {
    /// Session for `keys` on `chain` using the real daemon and client
    pub fn new(keys: KeyPair, chain: Chain) -> Self {
        Self::with_components(
            keys,
            chain,
            DaemonManager::new(),
            Arc::new(|port| Arc::new(MwebdClient::loopback(port)) as Arc<dyn MwebRpc>),
        )
    }

    /// Session deriving account `account` from a BIP-39 phrase
    pub fn from_mnemonic(phrase: &str, passphrase: &str, account: u32, chain: Chain) -> Result<Self> {
        let seed = Seed::from_mnemonic(phrase, passphrase)?;
        let keys = KeyPair::derive_default(&seed, account)?;
        Ok(Self::new(keys, chain))
    }

    /// Session with a custom daemon manager and client factory
    pub fn with_components(
        keys: KeyPair,
        chain: Chain,
        daemon: DaemonManager,
        rpc_factory: RpcFactory,
    ) -> Self {
        Self {
            keys,
            network: chain.network(),
            daemon,
            rpc_factory,
            connection: RwLock::new(None),
            retained: RwLock::new(UtxoSet::new()),
        }
    }

    /// Account keys
    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// Chain parameters
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Daemon manager
    pub fn daemon(&self) -> &DaemonManager {
        &self.daemon
    }

    /// Port of the connected daemon
    pub fn port(&self) -> Option<u16> {
        self.connection.read().as_ref().map(|c| c.port)
    }

    /// Height scanning starts from by default: MWEB activation
    pub fn default_scan_height(&self) -> u32 {
        self.network.mweb_activation_height
    }

    /// Start mwebd and connect to it, returning the RPC port
    pub async fn start_daemon(&self, config: DaemonConfig) -> Result<u16> {
        if config.chain != self.network.chain {
            return Err(mweb_daemon::Error::InvalidConfig(format!(
                "daemon chain {} does not match wallet chain {}",
                config.chain, self.network.chain
            ))
            .into());
        }
        self.disconnect().await;
        let port = self.daemon.start(config).await?;
        self.bind(port);
        Ok(port)
    }

    /// Connect to a daemon this session does not supervise
    pub async fn attach(&self, port: u16) {
        self.disconnect().await;
        self.bind(port);
    }

    /// Stop the UTXO stream and the daemon
    pub async fn stop_daemon(&self) -> Result<()> {
        self.disconnect().await;
        self.daemon.stop().await?;
        Ok(())
    }

    /// Daemon sync status
    pub async fn status(&self) -> Result<StatusSnapshot> {
        Ok(self.connection()?.rpc.status().await?)
    }

    /// Poll Status until the daemon is synced.
    ///
    /// Retryable errors while polling are logged and polled through; others
    /// end the wait. Fails with [`Error::SyncTimeout`] after `timeout`.
    pub async fn wait_for_sync(
        &self,
        poll: Duration,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<StatusSnapshot> {
        let rpc = Arc::clone(&self.connection()?.rpc);
        let started = Instant::now();
        let mut last = None;

        loop {
            match cancel.run_until_cancelled(rpc.status()).await {
                Ok(status) => {
                    debug!(
                        block_header_height = status.block_header_height,
                        mweb_utxos_height = status.mweb_utxos_height,
                        progress = status.sync_progress(),
                        "Sync status"
                    );
                    if status.is_synced() {
                        info!(height = status.mweb_utxos_height, "mwebd synced");
                        return Ok(status);
                    }
                    last = Some(status);
                }
                Err(e) if e.is_retryable() => warn!("Status poll failed: {}", e),
                Err(e) => return Err(e.into()),
            }

            if started.elapsed() >= timeout {
                return Err(Error::SyncTimeout {
                    waited: started.elapsed(),
                    last,
                });
            }
            cancel
                .run_until_cancelled(async {
                    tokio::time::sleep(poll).await;
                    Ok(())
                })
                .await?;
        }
    }

    /// Receive addresses `[from, to)` for this account
    pub async fn addresses(&self, from: u32, to: u32) -> Result<AddressBatch> {
        let rpc = Arc::clone(&self.connection()?.rpc);
        Ok(rpc
            .addresses(from, to, self.keys.scan_secret(), self.keys.spend_pubkey())
            .await?)
    }

    /// Restart the UTXO stream from `from_height` with an empty set
    pub async fn start_utxo_stream(&self, from_height: u32) -> Result<()> {
        let stream = Arc::clone(&self.connection()?.stream);
        stream.start(from_height, self.keys.scan_secret()).await?;
        Ok(())
    }

    /// Stop the UTXO stream; received outputs are kept
    pub async fn stop_utxo_stream(&self) {
        let stream = self.connection.read().as_ref().map(|c| Arc::clone(&c.stream));
        if let Some(stream) = stream {
            stream.stop().await;
        }
    }

    /// Wait for the current stream run to end
    pub async fn wait_utxo_stream(&self) -> Result<StreamOutcome> {
        let stream = Arc::clone(&self.connection()?.stream);
        Ok(stream.wait().await?)
    }

    /// Stream state; `Idle` when disconnected
    pub fn stream_state(&self) -> StreamState {
        self.connection
            .read()
            .as_ref()
            .map(|c| c.stream.state())
            .unwrap_or_default()
    }

    /// Subscribe to UTXO stream events of the current connection
    pub fn subscribe(&self) -> Result<broadcast::Receiver<UtxoStreamEvent>> {
        Ok(self.connection()?.stream.subscribe())
    }

    /// Observed outputs; spent ones stay until the next stream restart
    pub fn utxos(&self) -> UtxoSet {
        match self.connection.read().as_ref() {
            Some(c) => c.stream.snapshot(),
            None => self.retained.read().clone(),
        }
    }

    /// Balance over [`utxos`](Self::utxos)
    pub fn balance(&self) -> Balance {
        match self.connection.read().as_ref() {
            Some(c) => c.stream.balance(),
            None => self.retained.read().balance(),
        }
    }

    /// Ask the daemon which known outputs are spent
    pub async fn check_spent(&self) -> Result<Vec<String>> {
        let rpc = Arc::clone(&self.connection()?.rpc);
        let ids: Vec<String> = self.utxos().output_ids().map(str::to_string).collect();
        let spent = rpc.spent(&ids).await?;
        debug!(checked = ids.len(), spent = spent.len(), "Spent check");
        Ok(spent)
    }

    /// Build without committing, to see the resulting transaction and fee
    pub async fn estimate_fee(&self, raw_tx: Vec<u8>, fee_rate_per_kb: u64) -> Result<CreatedTransaction> {
        let rpc = Arc::clone(&self.connection()?.rpc);
        let request = CreateRequest::new(raw_tx, &self.keys, fee_rate_per_kb).dry_run(true);
        Ok(rpc.create(request).await?)
    }

    /// Build and sign a transaction spending this account's outputs
    pub async fn create_transaction(
        &self,
        raw_tx: Vec<u8>,
        fee_rate_per_kb: u64,
    ) -> Result<CreatedTransaction> {
        let rpc = Arc::clone(&self.connection()?.rpc);
        let request = CreateRequest::new(raw_tx, &self.keys, fee_rate_per_kb);
        Ok(rpc.create(request).await?)
    }

    /// Relay a signed transaction, returning its txid
    pub async fn broadcast(&self, raw_tx: &[u8]) -> Result<String> {
        let rpc = Arc::clone(&self.connection()?.rpc);
        Ok(rpc.broadcast(raw_tx).await?)
    }

    fn connection(&self) -> Result<Arc<Connection>> {
        self.connection.read().clone().ok_or(Error::NotStarted)
    }

    fn bind(&self, port: u16) {
        let rpc = (self.rpc_factory)(port);
        let stream = Arc::new(UtxoStreamConsumer::new(Arc::clone(&rpc)));
        info!(port, account = self.keys.account(), "Wallet connected to mwebd");
        *self.connection.write() = Some(Arc::new(Connection { port, rpc, stream }));
    }

    async fn disconnect(&self) {
        let previous = self.connection.write().take();
        if let Some(previous) = previous {
            previous.stream.stop().await;
            *self.retained.write() = previous.stream.snapshot();
            debug!(port = previous.port, "Wallet disconnected from mwebd");
        }
    }
}
