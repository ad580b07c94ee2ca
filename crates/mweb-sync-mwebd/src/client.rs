//! Typed mwebd RPC client
//!
//! Each operation opens its own channel, performs one call (or opens one
//! stream) and drops the channel afterwards. Responses are validated before
//! they are turned into wallet types; anything that breaks the wire contract
//! is reported as an [`crate::RpcError`] with code `Internal`.

use crate::cancel::CancelToken;
use crate::proto_types::{self as proto, rpc_client::RpcClient};
use crate::transport::{self, ChannelTarget, TlsConfig, TransportOptions};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use mweb_core::{
    AddressBatch, KeyPair, ScanSecret, SpendPublicKey, SpendSecret, StatusSnapshot, Utxo,
};
use mweb_params::{is_valid_amount, DEFAULT_RPC_PORT};
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tonic::transport::Channel;
use tracing::{debug, info, warn};

/// Outputs delivered by the Utxos stream, in arrival order
pub type UtxoStream = BoxStream<'static, Result<Utxo>>;

/// Retry configuration for idempotent calls
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts, including the first
    pub max_attempts: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
    /// Randomize each backoff by ±20%
    pub jitter: bool,
}

impl RetryConfig {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct MwebdClientConfig {
    /// Daemon address and wire security
    pub target: ChannelTarget,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Deadline for each unary call, and for opening the Utxos stream
    pub request_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
    /// TLS configuration
    pub tls: TlsConfig,
}

impl MwebdClientConfig {
    /// Plaintext config for a daemon on `127.0.0.1:port`
    pub fn loopback(port: u16) -> Self {
        Self {
            target: ChannelTarget::loopback(port),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            tls: TlsConfig::default(),
        }
    }

    /// TLS config for a remote daemon
    pub fn tls(host: &str, port: u16) -> Self {
        Self {
            target: ChannelTarget::tls(host, port),
            connect_timeout: Duration::from_secs(15),
            ..Self::loopback(port)
        }
    }

    fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            connect_timeout: self.connect_timeout,
            tls: self.tls.clone(),
        }
    }
}

impl Default for MwebdClientConfig {
    fn default() -> Self {
        Self::loopback(DEFAULT_RPC_PORT)
    }
}

/// Input to the Create call
#[derive(Clone)]
pub struct CreateRequest {
    /// Unsigned transaction to augment with MWEB inputs/outputs
    pub raw_tx: Vec<u8>,
    /// Scan private key
    pub scan_secret: ScanSecret,
    /// Spend private key
    pub spend_secret: SpendSecret,
    /// Fee rate in litoshis per kilobyte
    pub fee_rate_per_kb: u64,
    /// Compute the result without committing daemon-side state
    pub dry_run: bool,
}

impl CreateRequest {
    /// Request signed with `keys`
    pub fn new(raw_tx: Vec<u8>, keys: &KeyPair, fee_rate_per_kb: u64) -> Self {
        Self {
            raw_tx,
            scan_secret: keys.scan_secret().clone(),
            spend_secret: keys.spend_secret().clone(),
            fee_rate_per_kb,
            dry_run: false,
        }
    }

    /// Set the dry-run flag
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl fmt::Debug for CreateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateRequest")
            .field("raw_tx_len", &self.raw_tx.len())
            .field("fee_rate_per_kb", &self.fee_rate_per_kb)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

/// Output of the Create call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTransaction {
    /// Signed transaction
    pub raw_tx: Vec<u8>,
    /// Ids of the MWEB outputs the transaction creates
    pub output_ids: Vec<String>,
}

/// The daemon's RPC surface
#[async_trait]
pub trait MwebRpc: Send + Sync {
    /// Current sync heights
    async fn status(&self) -> Result<StatusSnapshot>;

    /// Addresses for `[from_index, to_index)`
    async fn addresses(
        &self,
        from_index: u32,
        to_index: u32,
        scan_secret: &ScanSecret,
        spend_pubkey: &SpendPublicKey,
    ) -> Result<AddressBatch>;

    /// Open the Utxos stream at `from_height`
    async fn utxos(&self, from_height: u32, scan_secret: &ScanSecret) -> Result<UtxoStream>;

    /// Subset of `output_ids` that are spent
    async fn spent(&self, output_ids: &[String]) -> Result<Vec<String>>;

    /// Build and sign a transaction
    async fn create(&self, request: CreateRequest) -> Result<CreatedTransaction>;

    /// Relay a transaction, returning its txid
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<String>;
}

/// mwebd gRPC client
#[derive(Debug, Clone)]
pub struct MwebdClient {
    config: MwebdClientConfig,
    cancel: Option<CancelToken>,
}

impl MwebdClient {
    /// Create client with config
    pub fn new(config: MwebdClientConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Plaintext client for a daemon on `127.0.0.1:port`
    pub fn loopback(port: u16) -> Self {
        Self::new(MwebdClientConfig::loopback(port))
    }

    /// Client whose unary calls give up as soon as `token` is cancelled
    pub fn with_cancel_token(&self, token: CancelToken) -> Self {
        Self {
            config: self.config.clone(),
            cancel: Some(token),
        }
    }

    /// Get config
    pub fn config(&self) -> &MwebdClientConfig {
        &self.config
    }

    async fn rpc(&self) -> Result<RpcClient<Channel>> {
        let channel = transport::connect(&self.config.target, &self.config.transport_options()).await?;
        Ok(RpcClient::new(channel))
    }

    /// Apply the request deadline and the cancel token to one attempt
    async fn call<T, Fut>(&self, method: &'static str, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>> + Send,
    {
        let deadline = self.config.request_timeout;
        let timed = async move {
            match tokio::time::timeout(deadline, fut).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(format!(
                    "{} did not complete within {:?}",
                    method, deadline
                ))),
            }
        };
        match &self.cancel {
            Some(token) => token.run_until_cancelled(timed).await,
            None => timed.await,
        }
    }

    /// Execute an idempotent operation with retry logic
    async fn with_retry<F, Fut, T>(&self, method: &'static str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let retry = &self.config.retry;
        let mut attempt = 0;
        let mut backoff = retry.initial_backoff;

        loop {
            match self.call(method, operation()).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;
                    let cancelled = self.cancel.as_ref().is_some_and(CancelToken::is_cancelled);
                    if attempt >= retry.max_attempts || !e.is_retryable() || cancelled {
                        return Err(e);
                    }

                    warn!(
                        method,
                        attempt,
                        "Operation failed, retrying in {:?}: {}",
                        backoff,
                        e
                    );

                    let delay = if retry.jitter {
                        jitter_duration(backoff)
                    } else {
                        backoff
                    };
                    match &self.cancel {
                        Some(token) => {
                            token
                                .run_until_cancelled(async {
                                    tokio::time::sleep(delay).await;
                                    Ok(())
                                })
                                .await?
                        }
                        None => tokio::time::sleep(delay).await,
                    }

                    backoff = std::cmp::min(
                        Duration::from_millis(
                            (backoff.as_millis() as f64 * retry.backoff_multiplier) as u64,
                        ),
                        retry.max_backoff,
                    );
                }
            }
        }
    }

    async fn create_once(&self, request: &CreateRequest) -> Result<CreatedTransaction> {
        let mut rpc = self.rpc().await?;
        let response = rpc
            .create(proto::CreateRequest {
                raw_tx: request.raw_tx.clone(),
                scan_secret: request.scan_secret.as_bytes().to_vec(),
                spend_secret: request.spend_secret.as_bytes().to_vec(),
                fee_rate_per_kb: request.fee_rate_per_kb,
                dry_run: request.dry_run,
            })
            .await?
            .into_inner();
        created_from_proto(response)
    }
}

#[async_trait]
impl MwebRpc for MwebdClient {
    async fn status(&self) -> Result<StatusSnapshot> {
        let status = self
            .with_retry("Status", || async {
                let mut rpc = self.rpc().await?;
                let response = rpc.status(proto::StatusRequest {}).await?.into_inner();
                status_from_proto(response)
            })
            .await?;
        debug!(
            block_header_height = status.block_header_height,
            mweb_header_height = status.mweb_header_height,
            mweb_utxos_height = status.mweb_utxos_height,
            "Status"
        );
        Ok(status)
    }

    async fn addresses(
        &self,
        from_index: u32,
        to_index: u32,
        scan_secret: &ScanSecret,
        spend_pubkey: &SpendPublicKey,
    ) -> Result<AddressBatch> {
        if from_index > to_index {
            return Err(Error::InvalidRequest(format!(
                "address range {}..{} is reversed",
                from_index, to_index
            )));
        }
        if from_index == to_index {
            return Ok(AddressBatch::new(from_index, Vec::new()));
        }

        let request = proto::AddressRequest {
            from_index,
            to_index,
            scan_secret: scan_secret.as_bytes().to_vec(),
            spend_pubkey: spend_pubkey.as_bytes().to_vec(),
        };
        let addresses = self
            .with_retry("Addresses", || async {
                let mut rpc = self.rpc().await?;
                Ok(rpc.addresses(request.clone()).await?.into_inner().address)
            })
            .await?;

        let expected = (to_index - from_index) as usize;
        if addresses.len() != expected {
            return Err(Error::malformed(format!(
                "expected {} addresses, got {}",
                expected,
                addresses.len()
            )));
        }
        if let Some(offset) = addresses.iter().position(|a| a.is_empty()) {
            return Err(Error::malformed(format!(
                "empty address at index {}",
                from_index as usize + offset
            )));
        }
        debug!(from_index, to_index, "Addresses");
        Ok(AddressBatch::new(from_index, addresses))
    }

    async fn utxos(&self, from_height: u32, scan_secret: &ScanSecret) -> Result<UtxoStream> {
        let from_height = i32::try_from(from_height).map_err(|_| {
            Error::InvalidRequest(format!("from_height {} exceeds int32", from_height))
        })?;
        let request = proto::UtxosRequest {
            from_height,
            scan_secret: scan_secret.as_bytes().to_vec(),
        };

        let (rpc, streaming) = self
            .call("Utxos", async {
                let mut rpc = self.rpc().await?;
                let streaming = rpc.utxos(request).await?.into_inner();
                Ok((rpc, streaming))
            })
            .await?;
        debug!(from_height, "Utxos stream opened");

        // The client owns the channel; keep it alive for as long as the stream is.
        let stream = streaming.map(move |item| {
            let _channel = &rpc;
            match item {
                Ok(utxo) => utxo_from_proto(utxo),
                Err(status) => Err(Error::from(status)),
            }
        });
        Ok(stream.boxed())
    }

    async fn spent(&self, output_ids: &[String]) -> Result<Vec<String>> {
        if output_ids.is_empty() {
            return Ok(Vec::new());
        }
        let request = proto::SpentRequest {
            output_id: output_ids.to_vec(),
        };
        let spent = self
            .with_retry("Spent", || async {
                let mut rpc = self.rpc().await?;
                Ok(rpc.spent(request.clone()).await?.into_inner().output_id)
            })
            .await?;

        if let Some(unknown) = spent.iter().find(|id| !output_ids.contains(id)) {
            return Err(Error::malformed(format!(
                "spent output {} was not queried",
                unknown
            )));
        }
        debug!(queried = output_ids.len(), spent = spent.len(), "Spent");
        Ok(spent)
    }

    /// Build and sign a transaction.
    ///
    /// Dry runs are retried like any idempotent call. A real create
    /// (`dry_run = false`) is attempted exactly once: after an ambiguous
    /// failure such as a timeout the caller must check daemon state before
    /// trying again.
    async fn create(&self, request: CreateRequest) -> Result<CreatedTransaction> {
        let created = if request.dry_run {
            self.with_retry("Create", || self.create_once(&request))
                .await?
        } else {
            self.call("Create", self.create_once(&request)).await?
        };
        debug!(
            dry_run = request.dry_run,
            outputs = created.output_ids.len(),
            "Create"
        );
        Ok(created)
    }

    /// Relay a transaction.
    ///
    /// Never retried automatically. A timeout leaves the outcome unknown;
    /// re-broadcasting an accepted transaction has network-level side
    /// effects, so the caller must check status first.
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<String> {
        if raw_tx.is_empty() {
            return Err(Error::InvalidRequest("raw transaction is empty".to_string()));
        }
        info!("Broadcasting transaction ({} bytes)", raw_tx.len());

        let request = proto::BroadcastRequest {
            raw_tx: raw_tx.to_vec(),
        };
        let txid = self
            .call("Broadcast", async {
                let mut rpc = self.rpc().await?;
                Ok(rpc.broadcast(request).await?.into_inner().txid)
            })
            .await?;

        if txid.is_empty() {
            return Err(Error::malformed("empty txid"));
        }
        info!("Transaction broadcast successful: {}", txid);
        Ok(txid)
    }
}

fn height_from_wire(height: i32, field: &str) -> Result<u32> {
    u32::try_from(height)
        .map_err(|_| Error::malformed(format!("negative {} {}", field, height)))
}

pub(crate) fn status_from_proto(response: proto::StatusResponse) -> Result<StatusSnapshot> {
    Ok(StatusSnapshot {
        block_header_height: height_from_wire(response.block_header_height, "block_header_height")?,
        mweb_header_height: height_from_wire(response.mweb_header_height, "mweb_header_height")?,
        mweb_utxos_height: height_from_wire(response.mweb_utxos_height, "mweb_utxos_height")?,
        block_time: u64::from(response.block_time),
    })
}

pub(crate) fn utxo_from_proto(utxo: proto::Utxo) -> Result<Utxo> {
    if utxo.output_id.is_empty() {
        return Err(Error::malformed("utxo with empty output id"));
    }
    if !is_valid_amount(utxo.value) {
        return Err(Error::malformed(format!(
            "utxo {} value {} out of range",
            utxo.output_id, utxo.value
        )));
    }
    Ok(Utxo {
        height: height_from_wire(utxo.height, "utxo height")?,
        value: utxo.value,
        address: utxo.address,
        output_id: utxo.output_id,
        block_time: u64::from(utxo.block_time),
    })
}

fn created_from_proto(response: proto::CreateResponse) -> Result<CreatedTransaction> {
    if response.output_id.iter().any(String::is_empty) {
        return Err(Error::malformed("created transaction has an empty output id"));
    }
    Ok(CreatedTransaction {
        raw_tx: response.raw_tx,
        output_ids: response.output_id,
    })
}

fn jitter_duration(duration: Duration) -> Duration {
    let millis = duration.as_millis() as u64;
    if millis == 0 {
        return duration;
    }
    let jitter = rand::thread_rng().gen_range(0.8..1.2);
    let jittered = (millis as f64 * jitter) as u64;
    Duration::from_millis(jittered.max(1))
}
