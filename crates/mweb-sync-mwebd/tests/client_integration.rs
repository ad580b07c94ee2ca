//! Integration tests for MwebdClient
//!
//! Run live tests with:
//!   MWEBD_RPC_PORT=9332 cargo test --package mweb-sync-mwebd --features live_mwebd -- --ignored
//!
//! The remaining tests need no daemon.

use mweb_core::{ScanSecret, SpendPublicKey};
use mweb_sync_mwebd::{
    CancelToken, ChannelTarget, Error, MwebRpc, MwebdClient, MwebdClientConfig, RetryConfig,
};
use std::net::TcpListener;
use std::time::Duration;

/// A loopback port with nothing listening on it
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn client_for(port: u16) -> MwebdClient {
    let config = MwebdClientConfig {
        connect_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(5),
        retry: RetryConfig::none(),
        ..MwebdClientConfig::loopback(port)
    };
    MwebdClient::new(config)
}

fn keys() -> (ScanSecret, SpendPublicKey) {
    let mut pubkey = [3u8; 33];
    pubkey[0] = 0x02;
    (ScanSecret::from_bytes([1u8; 32]), SpendPublicKey::from_bytes(pubkey))
}

// ============================================================================
// Unit tests (no network required)
// ============================================================================

#[test]
fn test_client_config_defaults() {
    let config = MwebdClientConfig::default();
    assert_eq!(config.target, ChannelTarget::loopback(9332));
    assert_eq!(config.target.uri(), "http://127.0.0.1:9332");
    assert!(config.retry.jitter);
}

#[tokio::test]
async fn test_reversed_address_range_is_rejected_locally() {
    let client = client_for(closed_port());
    let (scan, spend) = keys();
    let err = client.addresses(5, 1, &scan, &spend).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}

#[tokio::test]
async fn test_empty_requests_skip_the_network() {
    let client = client_for(closed_port());
    let (scan, spend) = keys();

    let batch = client.addresses(3, 3, &scan, &spend).await.unwrap();
    assert!(batch.is_empty());
    assert_eq!(batch.from_index(), 3);

    assert!(client.spent(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_broadcast_is_rejected_locally() {
    let client = client_for(closed_port());
    assert!(matches!(
        client.broadcast(&[]).await,
        Err(Error::InvalidRequest(_))
    ));
}

// ============================================================================
// Loopback transport tests
// ============================================================================

#[tokio::test]
async fn test_connection_refused() {
    let client = client_for(closed_port());
    match client.status().await {
        Err(Error::Connection(msg)) => assert!(msg.contains("127.0.0.1")),
        other => panic!("expected connection error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stream_open_connection_refused() {
    let client = client_for(closed_port());
    let (scan, _) = keys();
    let err = client.utxos(0, &scan).await.err().expect("open should fail");
    assert!(matches!(err, Error::Connection(_)));
}

#[tokio::test]
async fn test_cancelled_token_short_circuits_calls() {
    let token = CancelToken::new();
    token.cancel();
    let client = client_for(closed_port()).with_cancel_token(token);
    assert!(matches!(client.status().await, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_retries_stop_after_max_attempts() {
    let port = closed_port();
    let config = MwebdClientConfig {
        connect_timeout: Duration::from_secs(2),
        retry: RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(20),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..MwebdClientConfig::loopback(port)
    };
    let client = MwebdClient::new(config);

    let started = std::time::Instant::now();
    assert!(matches!(client.status().await, Err(Error::Connection(_))));
    // Two backoffs: 10ms + 20ms
    assert!(started.elapsed() >= Duration::from_millis(30));
}

// ============================================================================
// Live tests (require a running mwebd)
// ============================================================================

#[cfg(feature = "live_mwebd")]
mod live {
    use super::*;

    fn live_port() -> u16 {
        std::env::var("MWEBD_RPC_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(9332)
    }

    #[tokio::test]
    #[ignore = "Requires running mwebd"]
    async fn test_live_status() {
        let client = MwebdClient::loopback(live_port());
        let status = client.status().await.expect("status");
        assert!(status.mweb_utxos_height <= status.block_header_height);
    }

    #[tokio::test]
    #[ignore = "Requires running mwebd"]
    async fn test_live_addresses() {
        let seed = mweb_core::Seed::from_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            "",
        )
        .unwrap();
        let keys = mweb_core::KeyPair::derive_default(&seed, 0).unwrap();
        let client = MwebdClient::loopback(live_port());
        let batch = client
            .addresses(0, 1, keys.scan_secret(), keys.spend_pubkey())
            .await
            .expect("addresses");
        assert_eq!(batch.len(), 1);
        assert!(!batch.addresses()[0].is_empty());
    }
}
