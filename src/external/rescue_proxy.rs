// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! gRPC client for the rescue-proxy API.
//!
//! The proxy exposes two unary methods used here: the current Rocket Pool
//! node list and the solo-validator withdrawal-address list. The message
//! shapes and method paths below are the wire contract with the proxy;
//! they are small enough that the generated-code equivalent is written out
//! by hand rather than produced from a build-time protoc run.
//!
//! Deadlines: 1 second to establish a connection, 5 seconds per call.
//! Connections are lazy, so a refresh cycle pays the dial cost on its
//! first call.

use std::time::Duration;

use async_trait::async_trait;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::debug;

use crate::models::{node_id_from_bytes, NodeId};

use super::{NodeListSource, SourceError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const GET_ROCKET_POOL_NODES: &str = "/api.Api/GetRocketPoolNodes";
const GET_SOLO_VALIDATORS: &str = "/api.Api/GetSoloValidators";

// =============================================================================
// Wire messages
// =============================================================================

#[derive(Clone, PartialEq, prost::Message)]
pub struct RocketPoolNodesRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RocketPoolNodesResponse {
    /// Raw 20-byte node addresses.
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub node_ids: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SoloValidatorsRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SoloValidatorsResponse {
    /// Raw 20-byte withdrawal addresses.
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub withdrawal_addresses: Vec<Vec<u8>>,
}

// =============================================================================
// Client
// =============================================================================

/// A lazily connected client for one rescue-proxy endpoint.
pub struct RescueProxyClient {
    address: String,
    secure: bool,
    grpc: Option<Grpc<Channel>>,
}

impl RescueProxyClient {
    /// `address` is a `host:port` pair; `secure` selects TLS with the
    /// system's root certificates.
    pub fn new(address: impl Into<String>, secure: bool) -> Self {
        Self {
            address: address.into(),
            secure,
            grpc: None,
        }
    }

    fn endpoint(&self) -> Result<Endpoint, SourceError> {
        let scheme = if self.secure { "https" } else { "http" };
        let mut endpoint = Endpoint::from_shared(format!("{scheme}://{}", self.address))
            .map_err(|e| SourceError::Transport(e.to_string()))?
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT);

        if self.secure {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(|e| SourceError::Transport(e.to_string()))?;
        }

        Ok(endpoint)
    }

    fn ensure_connected(&mut self) -> Result<&mut Grpc<Channel>, SourceError> {
        if self.grpc.is_none() {
            debug!(address = %self.address, tls = self.secure, "connecting to rescue-proxy");
            let channel = self.endpoint()?.connect_lazy();
            self.grpc = Some(Grpc::new(channel));
        }
        self.grpc
            .as_mut()
            .ok_or_else(|| SourceError::Transport("connection unavailable".into()))
    }

    async fn unary<Req, Resp>(
        &mut self,
        path: &'static str,
        request: Req,
    ) -> Result<Resp, SourceError>
    where
        Req: prost::Message + 'static,
        Resp: prost::Message + Default + 'static,
    {
        let grpc = self.ensure_connected()?;
        grpc.ready()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = grpc
            .unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(path),
                codec,
            )
            .await
            .map_err(|status| SourceError::Remote(status.to_string()))?;
        Ok(response.into_inner())
    }

    /// The current Rocket Pool node addresses.
    pub async fn rocket_pool_nodes(&mut self) -> Result<Vec<Vec<u8>>, SourceError> {
        debug!("requesting rocket pool nodes");
        let response: RocketPoolNodesResponse = self
            .unary(GET_ROCKET_POOL_NODES, RocketPoolNodesRequest {})
            .await?;
        Ok(response.node_ids)
    }

    /// The current solo-validator withdrawal addresses.
    pub async fn withdrawal_addresses(&mut self) -> Result<Vec<Vec<u8>>, SourceError> {
        debug!("requesting solo validator withdrawal addresses");
        let response: SoloValidatorsResponse = self
            .unary(GET_SOLO_VALIDATORS, SoloValidatorsRequest {})
            .await?;
        Ok(response.withdrawal_addresses)
    }

    /// Drop the connection; the next call re-dials.
    pub fn close(&mut self) {
        self.grpc = None;
    }
}

// =============================================================================
// Source adapters
// =============================================================================

/// Rocket Pool node list via the rescue-proxy API.
///
/// A fresh connection is made per fetch and dropped afterwards, so a
/// refresher that sleeps for minutes does not hold an idle stream.
pub struct RescueProxyNodeSource {
    address: String,
    secure: bool,
}

impl RescueProxyNodeSource {
    pub fn new(address: impl Into<String>, secure: bool) -> Self {
        Self {
            address: address.into(),
            secure,
        }
    }
}

#[async_trait]
impl NodeListSource for RescueProxyNodeSource {
    fn name(&self) -> &'static str {
        "rescue-proxy"
    }

    async fn fetch(&mut self) -> Result<Vec<NodeId>, SourceError> {
        let mut client = RescueProxyClient::new(self.address.clone(), self.secure);
        let nodes = client.rocket_pool_nodes().await?;
        client.close();
        Ok(nodes.iter().map(|n| node_id_from_bytes(n)).collect())
    }
}

/// Solo-validator withdrawal addresses via the rescue-proxy API.
pub struct RescueProxyWithdrawalSource {
    address: String,
    secure: bool,
}

impl RescueProxyWithdrawalSource {
    pub fn new(address: impl Into<String>, secure: bool) -> Self {
        Self {
            address: address.into(),
            secure,
        }
    }
}

#[async_trait]
impl NodeListSource for RescueProxyWithdrawalSource {
    fn name(&self) -> &'static str {
        "rescue-proxy"
    }

    async fn fetch(&mut self) -> Result<Vec<NodeId>, SourceError> {
        let mut client = RescueProxyClient::new(self.address.clone(), self.secure);
        let addresses = client.withdrawal_addresses().await?;
        client.close();
        Ok(addresses.iter().map(|a| node_id_from_bytes(a)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn response_messages_decode_repeated_bytes() {
        let encoded = RocketPoolNodesResponse {
            node_ids: vec![vec![0x11; 20], vec![0x22; 20]],
        }
        .encode_to_vec();

        let decoded = RocketPoolNodesResponse::decode(encoded.as_slice()).unwrap();
        assert_eq!(decoded.node_ids.len(), 2);
        assert_eq!(decoded.node_ids[0], vec![0x11; 20]);
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_within_deadlines() {
        // Reserved TEST-NET address; nothing listens there.
        let mut source = RescueProxyNodeSource::new("192.0.2.1:50051", false);
        let started = std::time::Instant::now();
        let result = source.fetch().await;
        assert!(result.is_err());
        // Bounded by the connect deadline, with generous slack for CI.
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn tls_toggle_changes_scheme() {
        let plain = RescueProxyClient::new("proxy.example:50051", false);
        assert!(plain.endpoint().is_ok());

        let secure = RescueProxyClient::new("proxy.example:50051", true);
        assert!(secure.endpoint().is_ok());
    }
}
