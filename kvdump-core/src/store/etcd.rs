//! etcd v3 connector over gRPC
//!
//! Speaks the three unary calls the pipelines need (`KV/Range`, `KV/Put`,
//! `Auth/Authenticate`) directly through tonic, with the request and
//! response messages declared by hand below.

use super::{Connector, KvSession, RangeResponse};
use crate::config::{ConnectionConfig, Credentials};
use crate::error::{DumpError, Result};
use async_trait::async_trait;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::Status;
use tracing::{debug, info};

const RANGE_PATH: &str = "/etcdserverpb.KV/Range";
const PUT_PATH: &str = "/etcdserverpb.KV/Put";
const AUTHENTICATE_PATH: &str = "/etcdserverpb.Auth/Authenticate";

/// Metadata key etcd reads the auth token from
const TOKEN_METADATA: &str = "token";

/// Per-message limit in both directions, the same ceiling etcd's own client
/// uses. A whole prefix comes back in one range response.
const MAX_MESSAGE_SIZE: usize = i32::MAX as usize;

/// Wire messages from etcd's `rpc.proto`, limited to the fields used here.
/// Unset fields keep their proto3 defaults.
pub mod proto {
    use crate::record::Record;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ResponseHeader {
        #[prost(uint64, tag = "1")]
        pub cluster_id: u64,
        #[prost(uint64, tag = "2")]
        pub member_id: u64,
        #[prost(int64, tag = "3")]
        pub revision: i64,
        #[prost(uint64, tag = "4")]
        pub raft_term: u64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RangeRequest {
        #[prost(bytes = "vec", tag = "1")]
        pub key: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub range_end: Vec<u8>,
        #[prost(int64, tag = "3")]
        pub limit: i64,
        #[prost(int64, tag = "4")]
        pub revision: i64,
        #[prost(bool, tag = "7")]
        pub serializable: bool,
        #[prost(bool, tag = "8")]
        pub keys_only: bool,
        #[prost(bool, tag = "9")]
        pub count_only: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RangeResponse {
        #[prost(message, optional, tag = "1")]
        pub header: Option<ResponseHeader>,
        #[prost(message, repeated, tag = "2")]
        pub kvs: Vec<Record>,
        #[prost(bool, tag = "3")]
        pub more: bool,
        #[prost(int64, tag = "4")]
        pub count: i64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PutRequest {
        #[prost(bytes = "vec", tag = "1")]
        pub key: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub value: Vec<u8>,
        #[prost(int64, tag = "3")]
        pub lease: i64,
        #[prost(bool, tag = "4")]
        pub prev_kv: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PutResponse {
        #[prost(message, optional, tag = "1")]
        pub header: Option<ResponseHeader>,
        #[prost(message, optional, tag = "2")]
        pub prev_kv: Option<Record>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AuthenticateRequest {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(string, tag = "2")]
        pub password: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AuthenticateResponse {
        #[prost(message, optional, tag = "1")]
        pub header: Option<ResponseHeader>,
        #[prost(string, tag = "2")]
        pub token: String,
    }
}

/// Turn `host:port` into a URI tonic accepts; full URIs pass through
fn endpoint_uri(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

fn describe(status: &Status) -> String {
    format!("{:?}: {}", status.code(), status.message())
}

/// Opens authenticated sessions to an etcd v3 endpoint
#[derive(Debug, Clone, Copy, Default)]
pub struct EtcdConnector;

impl EtcdConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for EtcdConnector {
    type Session = EtcdSession;

    async fn connect(&self, config: &ConnectionConfig) -> Result<EtcdSession> {
        let uri = endpoint_uri(&config.address);
        let mut endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| {
                DumpError::connection(format!("invalid address {}: {}", config.address, e))
            })?
            .connect_timeout(config.dial_timeout)
            .timeout(config.request_timeout);

        if uri.starts_with("https://") {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new())
                .map_err(|e| DumpError::connection(format!("TLS setup failed: {}", e)))?;
        }

        let channel = endpoint.connect().await.map_err(|e| {
            DumpError::connection(format!("failed to connect to {}: {}", config.address, e))
        })?;

        let mut session = EtcdSession {
            grpc: Some(
                Grpc::new(channel)
                    .max_decoding_message_size(MAX_MESSAGE_SIZE)
                    .max_encoding_message_size(MAX_MESSAGE_SIZE),
            ),
            token: None,
            address: config.address.clone(),
        };
        session.authenticate(&config.credentials).await?;

        info!(
            "Connected to etcd at {} as {}",
            config.address, config.credentials.username
        );
        Ok(session)
    }
}

/// Session holding one gRPC channel and the auth token issued for it
pub struct EtcdSession {
    grpc: Option<Grpc<Channel>>,
    token: Option<AsciiMetadataValue>,
    address: String,
}

impl EtcdSession {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        let request = proto::AuthenticateRequest {
            name: credentials.username.clone(),
            password: credentials.password.clone(),
        };
        let response: proto::AuthenticateResponse = self
            .unary(AUTHENTICATE_PATH, request)
            .await
            .map_err(|s| DumpError::connection(format!("authentication failed: {}", describe(&s))))?;

        let token = response
            .token
            .parse::<AsciiMetadataValue>()
            .map_err(|e| DumpError::connection(format!("server issued an unusable token: {}", e)))?;
        self.token = Some(token);
        Ok(())
    }

    async fn unary<Req, Resp>(&mut self, path: &'static str, message: Req) -> std::result::Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let grpc = self
            .grpc
            .as_mut()
            .ok_or_else(|| Status::unavailable("session is closed"))?;
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("service was not ready: {}", e)))?;

        let mut request = tonic::Request::new(message);
        if let Some(token) = &self.token {
            request.metadata_mut().insert(TOKEN_METADATA, token.clone());
        }

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = grpc
            .unary(request, PathAndQuery::from_static(path), codec)
            .await?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl KvSession for EtcdSession {
    async fn range(&mut self, key: &[u8], range_end: &[u8]) -> Result<RangeResponse> {
        let request = proto::RangeRequest {
            key: key.to_vec(),
            range_end: range_end.to_vec(),
            ..Default::default()
        };
        let response: proto::RangeResponse = self
            .unary(RANGE_PATH, request)
            .await
            .map_err(|s| DumpError::read(format!("range request failed: {}", describe(&s))))?;

        debug!("Range returned {} keys (count {})", response.kvs.len(), response.count);
        Ok(RangeResponse {
            revision: response.header.map(|h| h.revision).unwrap_or_default(),
            records: response.kvs,
        })
    }

    async fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let request = proto::PutRequest {
            key: key.to_vec(),
            value: value.to_vec(),
            ..Default::default()
        };
        let _response: proto::PutResponse = self
            .unary(PUT_PATH, request)
            .await
            .map_err(|s| DumpError::write(key, describe(&s)))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.grpc.take().is_some() {
            self.token = None;
            debug!("Closed etcd session to {}", self.address);
        }
        Ok(())
    }
}
