//! mwebd gRPC proto type definitions
//!
//! These types mirror `mwebd.proto` for the daemon's `Rpc` service. The
//! service is declared without a proto package, so method paths are
//! `/Rpc/<Method>`.
//!
//! Types are written by hand instead of generated with tonic-build so the
//! build needs no protoc. If the proto changes, update the structs and tags
//! here to match.
//!
//! Heights are `int32` on the wire and indices `uint32`; values and fee
//! rates are `uint64`; keys and transactions are opaque `bytes`.

#![allow(missing_docs)] // Proto fields don't need individual docs

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatusRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatusResponse {
    #[prost(int32, tag = "1")]
    pub block_header_height: i32,
    #[prost(int32, tag = "2")]
    pub mweb_header_height: i32,
    #[prost(int32, tag = "3")]
    pub mweb_utxos_height: i32,
    #[prost(uint32, tag = "4")]
    pub block_time: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UtxosRequest {
    #[prost(int32, tag = "1")]
    pub from_height: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub scan_secret: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Utxo {
    #[prost(int32, tag = "1")]
    pub height: i32,
    #[prost(uint64, tag = "2")]
    pub value: u64,
    #[prost(string, tag = "3")]
    pub address: String,
    #[prost(string, tag = "4")]
    pub output_id: String,
    #[prost(uint32, tag = "5")]
    pub block_time: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AddressRequest {
    #[prost(uint32, tag = "1")]
    pub from_index: u32,
    #[prost(uint32, tag = "2")]
    pub to_index: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub scan_secret: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub spend_pubkey: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AddressResponse {
    #[prost(string, repeated, tag = "1")]
    pub address: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpentRequest {
    #[prost(string, repeated, tag = "1")]
    pub output_id: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpentResponse {
    #[prost(string, repeated, tag = "1")]
    pub output_id: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub raw_tx: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub scan_secret: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub spend_secret: Vec<u8>,
    #[prost(uint64, tag = "4")]
    pub fee_rate_per_kb: u64,
    #[prost(bool, tag = "5")]
    pub dry_run: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub raw_tx: Vec<u8>,
    #[prost(string, repeated, tag = "2")]
    pub output_id: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BroadcastRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub raw_tx: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BroadcastResponse {
    #[prost(string, tag = "1")]
    pub txid: String,
}

/// Generated-style client for the `Rpc` service
pub mod rpc_client {
    #![allow(unused_variables, dead_code, clippy::wildcard_imports, clippy::let_unit_value)]

    use super::*;
    use ::http::uri::{PathAndQuery, Uri};
    use tonic::codegen::*;

    const SERVICE: &str = "Rpc";

    /// mwebd `Rpc` gRPC client.
    #[derive(Debug, Clone)]
    pub struct RpcClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl RpcClient<tonic::transport::Channel> {
        /// Create a new client from a channel.
        pub fn new(channel: tonic::transport::Channel) -> Self {
            let inner = tonic::client::Grpc::new(channel);
            Self { inner }
        }
    }

    impl<T> RpcClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        /// Create client with a custom transport.
        pub fn with_inner(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        /// Create client with origin URI.
        pub fn with_origin(inner: T, origin: Uri) -> Self {
            let inner = tonic::client::Grpc::with_origin(inner, origin);
            Self { inner }
        }

        async fn ready(&mut self) -> std::result::Result<(), tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })
        }

        fn request<M>(
            request: impl tonic::IntoRequest<M>,
            method: &'static str,
        ) -> tonic::Request<M> {
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new(SERVICE, method));
            req
        }

        /// Daemon sync heights.
        pub async fn status(
            &mut self,
            request: impl tonic::IntoRequest<StatusRequest>,
        ) -> std::result::Result<tonic::Response<StatusResponse>, tonic::Status> {
            self.ready().await?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/Rpc/Status");
            self.inner
                .unary(Self::request(request, "Status"), path, codec)
                .await
        }

        /// Stream outputs owned by the scan key, starting at a height.
        ///
        /// The stream does not end on its own once the daemon catches up; it
        /// keeps delivering new outputs as they are seen.
        pub async fn utxos(
            &mut self,
            request: impl tonic::IntoRequest<UtxosRequest>,
        ) -> std::result::Result<tonic::Response<tonic::codec::Streaming<Utxo>>, tonic::Status>
        {
            self.ready().await?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/Rpc/Utxos");
            self.inner
                .server_streaming(Self::request(request, "Utxos"), path, codec)
                .await
        }

        /// Derive addresses for `[from_index, to_index)`.
        pub async fn addresses(
            &mut self,
            request: impl tonic::IntoRequest<AddressRequest>,
        ) -> std::result::Result<tonic::Response<AddressResponse>, tonic::Status> {
            self.ready().await?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/Rpc/Addresses");
            self.inner
                .unary(Self::request(request, "Addresses"), path, codec)
                .await
        }

        /// Filter output ids down to the spent ones.
        pub async fn spent(
            &mut self,
            request: impl tonic::IntoRequest<SpentRequest>,
        ) -> std::result::Result<tonic::Response<SpentResponse>, tonic::Status> {
            self.ready().await?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/Rpc/Spent");
            self.inner
                .unary(Self::request(request, "Spent"), path, codec)
                .await
        }

        /// Add MWEB inputs/outputs to a raw transaction and sign them.
        pub async fn create(
            &mut self,
            request: impl tonic::IntoRequest<CreateRequest>,
        ) -> std::result::Result<tonic::Response<CreateResponse>, tonic::Status> {
            self.ready().await?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/Rpc/Create");
            self.inner
                .unary(Self::request(request, "Create"), path, codec)
                .await
        }

        /// Relay a finished transaction to the network.
        pub async fn broadcast(
            &mut self,
            request: impl tonic::IntoRequest<BroadcastRequest>,
        ) -> std::result::Result<tonic::Response<BroadcastResponse>, tonic::Status> {
            self.ready().await?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/Rpc/Broadcast");
            self.inner
                .unary(Self::request(request, "Broadcast"), path, codec)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_utxo_field_tags() {
        // height=7 (tag 1, varint), output_id="ab" (tag 4, length-delimited)
        let bytes = [0x08, 0x07, 0x22, 0x02, b'a', b'b'];
        let utxo = Utxo::decode(&bytes[..]).unwrap();
        assert_eq!(utxo.height, 7);
        assert_eq!(utxo.output_id, "ab");
        assert_eq!(utxo.value, 0);
    }

    #[test]
    fn test_negative_height_is_representable() {
        let status = StatusResponse {
            block_header_height: -1,
            ..Default::default()
        };
        let decoded = StatusResponse::decode(&status.encode_to_vec()[..]).unwrap();
        assert_eq!(decoded.block_header_height, -1);
    }

    #[test]
    fn test_create_request_dry_run_tag() {
        let request = CreateRequest {
            dry_run: true,
            ..Default::default()
        };
        // tag 5, varint 1
        assert_eq!(request.encode_to_vec(), vec![0x28, 0x01]);
    }
}
