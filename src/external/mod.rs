// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! Clients for the remote address-list sources.
//!
//! The refresher tasks only care about one operation: fetch a list of
//! addresses. [`NodeListSource`] abstracts over the rescue-proxy gRPC API
//! and the Rocketscan REST API so the tasks can try sources in order and
//! tests can inject stubs.

pub mod rescue_proxy;
pub mod rocketscan;

use std::fmt;

use async_trait::async_trait;

use crate::models::NodeId;

pub use rescue_proxy::{RescueProxyNodeSource, RescueProxyWithdrawalSource};
pub use rocketscan::RocketscanNodeSource;

/// Failure fetching an address list from a remote source.
#[derive(Debug)]
pub enum SourceError {
    /// Could not reach or dial the remote endpoint.
    Transport(String),
    /// The remote answered with an error.
    Remote(String),
    /// The response could not be decoded.
    Decode(String),
    /// The response exceeded the allowed size.
    ResponseTooLarge(usize),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transport(msg) => write!(f, "transport error: {msg}"),
            SourceError::Remote(msg) => write!(f, "remote error: {msg}"),
            SourceError::Decode(msg) => write!(f, "decode error: {msg}"),
            SourceError::ResponseTooLarge(size) => {
                write!(f, "response body exceeded maximum size: {size} bytes")
            }
        }
    }
}

impl std::error::Error for SourceError {}

/// A remote source of node addresses.
#[async_trait]
pub trait NodeListSource: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Fetch the current address list.
    async fn fetch(&mut self) -> Result<Vec<NodeId>, SourceError>;
}
