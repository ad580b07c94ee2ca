//! MwebdClient and UtxoStreamConsumer against an in-process gRPC server
//!
//! The server speaks the daemon's `Rpc` service over a loopback socket, so
//! these tests cover the hand-written proto types, method paths and codec
//! end to end.

use futures::stream::{self, BoxStream, StreamExt};
use mweb_core::{ScanSecret, SpendPublicKey};
use mweb_sync_mwebd::proto_types as proto;
use mweb_sync_mwebd::{
    Error, MwebRpc, MwebdClient, MwebdClientConfig, RetryConfig, StreamState, UtxoStreamConsumer,
};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::body::BoxBody;
use tonic::codec::ProstCodec;
use tonic::codegen::{BoxFuture, Service};
use tonic::server::{Grpc, NamedService, ServerStreamingService, UnaryService};
use tonic::{Code, Status};

// ============================================================================
// In-process daemon
// ============================================================================

#[derive(Default)]
struct Seen {
    utxos_from: Vec<i32>,
    address_ranges: Vec<(u32, u32)>,
}

#[derive(Clone, Default)]
struct FakeMwebd {
    seen: Arc<Mutex<Seen>>,
}

fn wire_utxo(id: &str, value: u64, height: i32) -> proto::Utxo {
    proto::Utxo {
        height,
        value,
        address: format!("ltcmweb1{}", id),
        output_id: id.to_string(),
        block_time: if height > 0 { 1_700_000_000 } else { 0 },
    }
}

struct StatusMethod;

impl UnaryService<proto::StatusRequest> for StatusMethod {
    type Response = proto::StatusResponse;
    type Future = BoxFuture<tonic::Response<Self::Response>, Status>;

    fn call(&mut self, _request: tonic::Request<proto::StatusRequest>) -> Self::Future {
        Box::pin(async {
            Ok(tonic::Response::new(proto::StatusResponse {
                block_header_height: 100,
                mweb_header_height: 100,
                mweb_utxos_height: 80,
                block_time: 1_700_000_000,
            }))
        })
    }
}

struct AddressesMethod(Arc<Mutex<Seen>>);

impl UnaryService<proto::AddressRequest> for AddressesMethod {
    type Response = proto::AddressResponse;
    type Future = BoxFuture<tonic::Response<Self::Response>, Status>;

    fn call(&mut self, request: tonic::Request<proto::AddressRequest>) -> Self::Future {
        let seen = Arc::clone(&self.0);
        Box::pin(async move {
            let request = request.into_inner();
            if request.scan_secret.len() != 32 || request.spend_pubkey.len() != 33 {
                return Err(Status::invalid_argument("bad key length"));
            }
            seen.lock()
                .address_ranges
                .push((request.from_index, request.to_index));
            Ok(tonic::Response::new(proto::AddressResponse {
                address: (request.from_index..request.to_index)
                    .map(|i| format!("ltcmweb1{}", i))
                    .collect(),
            }))
        })
    }
}

struct SpentMethod;

impl UnaryService<proto::SpentRequest> for SpentMethod {
    type Response = proto::SpentResponse;
    type Future = BoxFuture<tonic::Response<Self::Response>, Status>;

    fn call(&mut self, request: tonic::Request<proto::SpentRequest>) -> Self::Future {
        Box::pin(async move {
            let output_id = request
                .into_inner()
                .output_id
                .into_iter()
                .filter(|id| id == "b")
                .collect();
            Ok(tonic::Response::new(proto::SpentResponse { output_id }))
        })
    }
}

struct UtxosMethod(Arc<Mutex<Seen>>);

impl ServerStreamingService<proto::UtxosRequest> for UtxosMethod {
    type Response = proto::Utxo;
    type ResponseStream = BoxStream<'static, Result<proto::Utxo, Status>>;
    type Future = BoxFuture<tonic::Response<Self::ResponseStream>, Status>;

    fn call(&mut self, request: tonic::Request<proto::UtxosRequest>) -> Self::Future {
        let seen = Arc::clone(&self.0);
        Box::pin(async move {
            let request = request.into_inner();
            if request.scan_secret.len() != 32 {
                return Err(Status::invalid_argument("bad scan secret"));
            }
            seen.lock().utxos_from.push(request.from_height);
            let items = vec![
                Ok(wire_utxo("a", 10, 5)),
                Ok(wire_utxo("b", 20, 0)),
                Ok(wire_utxo("a", 10, 5)),
                Ok(wire_utxo("c", 30, 0)),
                Err(Status::unavailable("reset")),
            ];
            Ok(tonic::Response::new(stream::iter(items).boxed()))
        })
    }
}

impl Service<http::Request<BoxBody>> for FakeMwebd {
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<BoxBody>) -> Self::Future {
        let seen = Arc::clone(&self.seen);
        match req.uri().path() {
            "/Rpc/Status" => Box::pin(async move {
                let mut grpc = Grpc::new(ProstCodec::default());
                Ok(grpc.unary(StatusMethod, req).await)
            }),
            "/Rpc/Addresses" => Box::pin(async move {
                let mut grpc = Grpc::new(ProstCodec::default());
                Ok(grpc.unary(AddressesMethod(seen), req).await)
            }),
            "/Rpc/Spent" => Box::pin(async move {
                let mut grpc = Grpc::new(ProstCodec::default());
                Ok(grpc.unary(SpentMethod, req).await)
            }),
            "/Rpc/Utxos" => Box::pin(async move {
                let mut grpc = Grpc::new(ProstCodec::default());
                Ok(grpc.server_streaming(UtxosMethod(seen), req).await)
            }),
            _ => Box::pin(async move {
                let mut response = http::Response::new(tonic::body::empty_body());
                let headers = response.headers_mut();
                headers.insert(
                    http::HeaderName::from_static("grpc-status"),
                    http::HeaderValue::from(Code::Unimplemented as i32),
                );
                headers.insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/grpc"),
                );
                Ok(response)
            }),
        }
    }
}

impl NamedService for FakeMwebd {
    const NAME: &'static str = "Rpc";
}

/// Serve `daemon` on an ephemeral loopback port
async fn serve(daemon: FakeMwebd) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(
        tonic::transport::Server::builder()
            .add_service(daemon)
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );
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
// Tests
// ============================================================================

#[tokio::test]
async fn test_status_over_the_wire() {
    let port = serve(FakeMwebd::default()).await;
    let status = client_for(port).status().await.unwrap();

    assert_eq!(status.block_header_height, 100);
    assert_eq!(status.mweb_header_height, 100);
    assert_eq!(status.mweb_utxos_height, 80);
    assert_eq!(status.block_time, 1_700_000_000);
    assert!(!status.is_synced());
    assert_eq!(status.blocks_remaining(), 20);
}

#[tokio::test]
async fn test_addresses_over_the_wire() {
    let daemon = FakeMwebd::default();
    let port = serve(daemon.clone()).await;
    let (scan, spend) = keys();

    let batch = client_for(port).addresses(0, 1, &scan, &spend).await.unwrap();

    assert_eq!(batch.addresses().to_vec(), vec!["ltcmweb10".to_string()]);
    assert_eq!(daemon.seen.lock().address_ranges, vec![(0, 1)]);
}

#[tokio::test]
async fn test_spent_over_the_wire() {
    let port = serve(FakeMwebd::default()).await;
    let ids = vec!["a".to_string(), "b".to_string()];
    assert_eq!(client_for(port).spent(&ids).await.unwrap(), vec!["b".to_string()]);
}

#[tokio::test]
async fn test_stream_reset_after_outputs() {
    let daemon = FakeMwebd::default();
    let port = serve(daemon.clone()).await;
    let (scan, _) = keys();
    let consumer = UtxoStreamConsumer::new(Arc::new(client_for(port)));

    consumer.start(2_265_984, &scan).await.unwrap();
    match consumer.wait().await {
        Err(Error::StreamFailure { received, source }) => {
            assert_eq!(received, 4);
            assert_eq!(source.code, Code::Unavailable);
            assert_eq!(source.message, "reset");
        }
        other => panic!("expected stream failure, got {:?}", other),
    }

    assert_eq!(daemon.seen.lock().utxos_from, vec![2_265_984]);
    assert_eq!(consumer.state(), StreamState::Failed);

    let set = consumer.snapshot();
    assert_eq!(set.output_ids().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    let balance = consumer.balance();
    assert_eq!(
        (balance.confirmed, balance.unconfirmed, balance.total),
        (10, 50, 60)
    );
}

#[tokio::test]
async fn test_unknown_method_is_unimplemented() {
    // No Broadcast handler is registered
    let port = serve(FakeMwebd::default()).await;
    let err = client_for(port).broadcast(&[1, 2, 3]).await.unwrap_err();
    assert_eq!(err.to_rpc_error().code, Code::Unimplemented);
}
