//! Wallet session scenarios against an in-memory daemon

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mweb_core::{AddressBatch, KeyPair, ScanSecret, Seed, SpendPublicKey, StatusSnapshot, Utxo};
use mweb_daemon::DaemonManager;
use mweb_params::Chain;
use mweb_sync_mwebd::{
    CancelToken, CreateRequest, CreatedTransaction, MwebRpc, StreamOutcome, UtxoStream,
};
use mweb_wallet_service::{Error, RpcFactory, WalletSession};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

// ============================================================================
// In-memory daemon
// ============================================================================

struct FakeDaemon {
    status: Mutex<StatusSnapshot>,
    /// Status values served before `status`, one per call
    status_script: Mutex<Vec<StatusSnapshot>>,
    utxos: Vec<Utxo>,
    spent: Vec<String>,
    creates: Mutex<Vec<bool>>,
    broadcasts: Mutex<Vec<Vec<u8>>>,
}

impl FakeDaemon {
    fn new(status: StatusSnapshot) -> Self {
        Self {
            status: Mutex::new(status),
            status_script: Mutex::new(Vec::new()),
            utxos: Vec::new(),
            spent: Vec::new(),
            creates: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MwebRpc for FakeDaemon {
    async fn status(&self) -> mweb_sync_mwebd::Result<StatusSnapshot> {
        let mut script = self.status_script.lock();
        if !script.is_empty() {
            return Ok(script.remove(0));
        }
        Ok(*self.status.lock())
    }

    async fn addresses(
        &self,
        from_index: u32,
        to_index: u32,
        _scan_secret: &ScanSecret,
        spend_pubkey: &SpendPublicKey,
    ) -> mweb_sync_mwebd::Result<AddressBatch> {
        let addresses = (from_index..to_index)
            .map(|i| format!("ltcmweb1{}{}", &spend_pubkey.to_hex()[..8], i))
            .collect();
        Ok(AddressBatch::new(from_index, addresses))
    }

    async fn utxos(
        &self,
        _from_height: u32,
        _scan_secret: &ScanSecret,
    ) -> mweb_sync_mwebd::Result<UtxoStream> {
        Ok(stream::iter(self.utxos.clone().into_iter().map(Ok)).boxed())
    }

    async fn spent(&self, output_ids: &[String]) -> mweb_sync_mwebd::Result<Vec<String>> {
        Ok(output_ids
            .iter()
            .filter(|id| self.spent.contains(id))
            .cloned()
            .collect())
    }

    async fn create(&self, request: CreateRequest) -> mweb_sync_mwebd::Result<CreatedTransaction> {
        self.creates.lock().push(request.dry_run);
        Ok(CreatedTransaction {
            raw_tx: request.raw_tx.iter().rev().copied().collect(),
            output_ids: vec!["change".to_string()],
        })
    }

    async fn broadcast(&self, raw_tx: &[u8]) -> mweb_sync_mwebd::Result<String> {
        self.broadcasts.lock().push(raw_tx.to_vec());
        Ok("ab".repeat(32))
    }
}

fn status(header: u32, mweb_header: u32, utxos: u32) -> StatusSnapshot {
    StatusSnapshot {
        block_header_height: header,
        mweb_header_height: mweb_header,
        mweb_utxos_height: utxos,
        block_time: 1_700_000_000,
    }
}

fn utxo(id: &str, value: u64, height: u32) -> Utxo {
    Utxo {
        output_id: id.to_string(),
        value,
        address: format!("ltcmweb1{}", id),
        height,
        block_time: 0,
    }
}

fn keys() -> KeyPair {
    let seed = Seed::from_mnemonic(PHRASE, "").unwrap();
    KeyPair::derive_default(&seed, 0).unwrap()
}

async fn session_with(daemon: Arc<FakeDaemon>) -> WalletSession {
    let factory: RpcFactory = Arc::new(move |_port| Arc::clone(&daemon) as Arc<dyn MwebRpc>);
    let session = WalletSession::with_components(keys(), Chain::Regtest, DaemonManager::new(), factory);
    session.attach(9332).await;
    session
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_not_started() {
    let session = WalletSession::new(keys(), Chain::Mainnet);
    assert!(session.port().is_none());
    assert!(matches!(session.status().await, Err(Error::NotStarted)));
    assert!(matches!(session.addresses(0, 1).await, Err(Error::NotStarted)));
    assert!(session.utxos().is_empty());
    assert_eq!(session.balance().total, 0);

    // Stopping a never-started session is fine
    session.stop_utxo_stream().await;
    session.stop_daemon().await.unwrap();
}

#[tokio::test]
async fn test_first_address() {
    let session = session_with(Arc::new(FakeDaemon::new(status(100, 100, 100)))).await;
    let batch = session.addresses(0, 1).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert!(!batch.addresses()[0].is_empty());
    assert_eq!(session.port(), Some(9332));
}

#[tokio::test]
async fn test_sync_status() {
    let daemon = Arc::new(FakeDaemon::new(status(100, 100, 100)));
    let session = session_with(Arc::clone(&daemon)).await;
    assert!(session.status().await.unwrap().is_synced());

    *daemon.status.lock() = status(100, 100, 80);
    let snapshot = session.status().await.unwrap();
    assert!(!snapshot.is_synced());
    assert_eq!(snapshot.blocks_remaining(), 20);
}

#[tokio::test]
async fn test_dry_run_creates_are_side_effect_free() {
    let daemon = Arc::new(FakeDaemon {
        utxos: vec![utxo("a", 10, 5), utxo("b", 20, 0)],
        ..FakeDaemon::new(status(100, 100, 100))
    });
    let session = session_with(Arc::clone(&daemon)).await;
    session.start_utxo_stream(0).await.unwrap();
    session.wait_utxo_stream().await.unwrap();

    let status_before = session.status().await.unwrap();
    let balance_before = session.balance();

    let first = session.estimate_fee(vec![1, 2, 3], 1000).await.unwrap();
    let second = session.estimate_fee(vec![1, 2, 3], 1000).await.unwrap();
    assert_eq!(first, second);

    assert_eq!(session.status().await.unwrap(), status_before);
    assert_eq!(session.balance(), balance_before);
    assert_eq!(*daemon.creates.lock(), vec![true, true]);
    assert!(daemon.broadcasts.lock().is_empty());
}

#[tokio::test]
async fn test_create_then_broadcast() {
    let daemon = Arc::new(FakeDaemon::new(status(100, 100, 100)));
    let session = session_with(Arc::clone(&daemon)).await;

    let created = session.create_transaction(vec![1, 2, 3], 1000).await.unwrap();
    let txid = session.broadcast(&created.raw_tx).await.unwrap();

    assert_eq!(txid.len(), 64);
    assert_eq!(*daemon.creates.lock(), vec![false]);
    assert_eq!(*daemon.broadcasts.lock(), vec![vec![3, 2, 1]]);
}

#[tokio::test]
async fn test_stream_and_spent_check() {
    let daemon = Arc::new(FakeDaemon {
        utxos: vec![
            utxo("a", 10, 5),
            utxo("b", 20, 0),
            utxo("a", 10, 5),
            utxo("c", 30, 0),
        ],
        spent: vec!["b".to_string(), "zz".to_string()],
        ..FakeDaemon::new(status(100, 100, 100))
    });
    let session = session_with(daemon).await;

    session.start_utxo_stream(session.default_scan_height()).await.unwrap();
    assert_eq!(
        session.wait_utxo_stream().await.unwrap(),
        StreamOutcome::Completed {
            outputs: 3,
            duplicates: 1
        }
    );

    let balance = session.balance();
    assert_eq!((balance.confirmed, balance.unconfirmed, balance.total), (10, 50, 60));
    assert_eq!(session.check_spent().await.unwrap(), vec!["b".to_string()]);
    // Spent outputs are not dropped from the set
    assert!(session.utxos().output_ids().any(|id| id == "b"));

    // Snapshot survives disconnecting
    session.stop_daemon().await.unwrap();
    assert!(session.port().is_none());
    assert_eq!(session.utxos().len(), 3);
    assert_eq!(session.balance().total, 60);
}

#[tokio::test]
async fn test_wait_for_sync_polls_until_synced() {
    let daemon = Arc::new(FakeDaemon::new(status(100, 100, 100)));
    *daemon.status_script.lock() = vec![status(100, 90, 80), status(100, 100, 95)];
    let session = session_with(Arc::clone(&daemon)).await;

    let synced = session
        .wait_for_sync(
            Duration::from_millis(5),
            Duration::from_secs(5),
            &CancelToken::new(),
        )
        .await
        .unwrap();
    assert!(synced.is_synced());
    assert!(daemon.status_script.lock().is_empty());
}

#[tokio::test]
async fn test_wait_for_sync_times_out() {
    let daemon = Arc::new(FakeDaemon::new(status(100, 100, 80)));
    let session = session_with(daemon).await;

    match session
        .wait_for_sync(
            Duration::from_millis(5),
            Duration::from_millis(50),
            &CancelToken::new(),
        )
        .await
    {
        Err(Error::SyncTimeout { last, .. }) => {
            assert_eq!(last.unwrap().blocks_remaining(), 20);
        }
        other => panic!("expected sync timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_wait_for_sync_cancelled() {
    let daemon = Arc::new(FakeDaemon::new(status(100, 100, 80)));
    let session = session_with(daemon).await;
    let cancel = CancelToken::new();
    cancel.cancel();

    assert!(matches!(
        session
            .wait_for_sync(Duration::from_millis(5), Duration::from_secs(5), &cancel)
            .await,
        Err(Error::Sync(mweb_sync_mwebd::Error::Cancelled))
    ));
}

#[tokio::test]
async fn test_daemon_chain_must_match_wallet() {
    let session = WalletSession::new(keys(), Chain::Regtest);
    let config = mweb_daemon::DaemonConfig::for_chain(Chain::Mainnet, "unused");
    assert!(matches!(
        session.start_daemon(config).await,
        Err(Error::Daemon(mweb_daemon::Error::InvalidConfig(_)))
    ));
}
