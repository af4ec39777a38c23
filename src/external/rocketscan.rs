// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! REST fallback for the Rocket Pool node list.
//!
//! Rocketscan publishes the node list as a JSON array of objects with an
//! `address` field. The average response is around 3 MiB; anything past
//! 10 MiB is treated as an error rather than buffered.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::models::NodeId;

use super::{NodeListSource, SourceError};

const NODES_PATH: &str = "/nodes/list/";

/// Maximum response body size.
const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct RocketscanNode {
    address: String,
}

/// Rocket Pool node list via the Rocketscan REST API.
pub struct RocketscanNodeSource {
    url: String,
    client: reqwest::Client,
}

impl RocketscanNodeSource {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("HTTP client construction only fails on TLS backend misconfiguration");
        Self {
            url: url.into(),
            client,
        }
    }

    fn nodes_url(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), NODES_PATH)
    }
}

#[async_trait]
impl NodeListSource for RocketscanNodeSource {
    fn name(&self) -> &'static str {
        "rocketscan"
    }

    async fn fetch(&mut self) -> Result<Vec<NodeId>, SourceError> {
        let response = self
            .client
            .get(self.nodes_url())
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Remote(format!(
                "request failed with status {status}"
            )));
        }

        if let Some(length) = response.content_length() {
            if length as usize > MAX_RESPONSE_BYTES {
                return Err(SourceError::ResponseTooLarge(length as usize));
            }
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        if body.len() > MAX_RESPONSE_BYTES {
            return Err(SourceError::ResponseTooLarge(body.len()));
        }

        let nodes: Vec<RocketscanNode> =
            serde_json::from_slice(&body).map_err(|e| SourceError::Decode(e.to_string()))?;

        // Entries with unparseable addresses are skipped, not fatal.
        let mut ids = Vec::with_capacity(nodes.len());
        for node in nodes {
            match NodeId::from_str(&node.address) {
                Ok(id) => ids.push(id),
                Err(_) => warn!(address = %node.address, "skipping malformed node address"),
            }
        }
        Ok(ids)
    }
}
