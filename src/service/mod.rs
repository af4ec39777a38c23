// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! # Service Layer
//!
//! Business logic behind the two API endpoints. The service authenticates
//! signed requests, authorizes the recovered identity against the
//! registries and deny rules, and then either issues credentials
//! ([`credentials`]) or reports issuance history ([`operator_info`]).
//!
//! Both paths share the same pipeline: parse the request timestamp, check
//! its age, recover the signer, then authorize per operator type. Only the
//! issuance path writes to the store.

pub mod credentials;
pub mod operator_info;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta};
use regex::Regex;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::credentials::CredentialManager;
use crate::metrics::ServiceMetrics;
use crate::models::{NodeId, OperatorType, Resource};
use crate::registry::Registry;
use crate::signature;
use crate::store::Store;

pub use operator_info::{OperatorInfo, QuotaSettings};

/// The pattern for credential request messages. The captured digits are the
/// request timestamp in seconds.
const CREDENTIAL_REQUEST_PATTERN: &str = r"(?i)^Rescue Node ([0-9]{10})$";

/// The maximum age for a request to be considered fresh.
fn request_max_age() -> TimeDelta {
    TimeDelta::minutes(15)
}

/// The maximum age of a registry before membership checks fail closed.
fn registry_max_age() -> TimeDelta {
    TimeDelta::hours(1)
}

// =============================================================================
// Quotas
// =============================================================================

/// Issuance limits and credential lifetime for one operator type.
#[derive(Debug, Clone, Copy)]
pub struct Quota {
    /// Max number of new issuances per `window`.
    pub count: i64,
    /// Time window over which issuances are counted.
    pub window: TimeDelta,
    /// How long an issued credential is accepted by the relay.
    pub auth_validity_window: TimeDelta,
}

/// The quota record for an operator type.
pub fn quota_for(operator_type: OperatorType) -> Quota {
    match operator_type {
        OperatorType::Rocketpool => Quota {
            count: 4,
            window: TimeDelta::days(365),
            auth_validity_window: TimeDelta::days(15),
        },
        OperatorType::Solo => Quota {
            count: 3,
            window: TimeDelta::days(365),
            auth_validity_window: TimeDelta::days(10),
        },
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Request-level failures, tagged by kind.
///
/// The HTTP layer maps each kind to a status code; nothing here knows about
/// HTTP.
#[derive(Debug)]
pub enum ServiceError {
    /// The request body or message is malformed.
    Validation(String),
    /// The request could not be attributed to a signer.
    Authentication(String),
    /// The signer is not allowed to use the service right now.
    Authorization(String),
    /// The event store failed; possibly transient.
    Database(sqlx::Error),
    /// Anything else.
    Internal(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Validation(msg)
            | ServiceError::Authentication(msg)
            | ServiceError::Authorization(msg)
            | ServiceError::Internal(msg) => write!(f, "{msg}"),
            ServiceError::Database(e) => write!(f, "database error: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(err)
    }
}

impl ServiceError {
    fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    fn authentication(msg: impl Into<String>) -> Self {
        ServiceError::Authentication(msg.into())
    }

    fn authorization(msg: impl Into<String>) -> Self {
        ServiceError::Authorization(msg.into())
    }
}

// =============================================================================
// Service
// =============================================================================

/// Dependencies for [`Service::new`].
pub struct ServiceConfig {
    pub store: Store,
    pub credential_manager: CredentialManager,
    pub nodes: Arc<Registry>,
    pub withdrawal_addresses: Arc<Registry>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<ServiceMetrics>,
    pub enable_solo_validators: bool,
}

/// The credential issuance and operator-info engine.
pub struct Service {
    store: Store,
    credential_manager: CredentialManager,
    request_pattern: Regex,

    /// Active nodes on the Rocket Pool network.
    nodes: Arc<Registry>,
    /// Active validators' withdrawal addresses.
    withdrawal_addresses: Arc<Registry>,

    clock: Arc<dyn Clock>,
    metrics: Arc<ServiceMetrics>,
    enable_solo_validators: bool,
}

impl Service {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            store: config.store,
            credential_manager: config.credential_manager,
            request_pattern: Regex::new(CREDENTIAL_REQUEST_PATTERN)
                .expect("hard-coded request pattern compiles"),
            nodes: config.nodes,
            withdrawal_addresses: config.withdrawal_addresses,
            clock: config.clock,
            metrics: config.metrics,
            enable_solo_validators: config.enable_solo_validators,
        }
    }

    // =========================================================================
    // Shared request pipeline
    // =========================================================================

    /// Steps 1-5 of both request paths: freshness, signer recovery, and
    /// authorization. Returns the recovered identity.
    pub(crate) async fn authenticate_and_authorize(
        &self,
        msg: &[u8],
        sig: &[u8],
        operator_type: OperatorType,
    ) -> Result<NodeId, ServiceError> {
        self.check_request_age(msg)?;
        let node_id = self.recover_node_id(msg, sig)?;
        self.check_node_authorization(&node_id, operator_type)
            .await?;
        Ok(node_id)
    }

    fn timestamp_from_request(&self, msg: &[u8]) -> Option<i64> {
        let text = std::str::from_utf8(msg).ok()?;
        let captures = self.request_pattern.captures(text)?;
        captures[1].parse().ok()
    }

    /// Reject messages without a well-formed, fresh timestamp.
    fn check_request_age(&self, msg: &[u8]) -> Result<(), ServiceError> {
        let Some(secs) = self.timestamp_from_request(msg) else {
            self.metrics.invalid_timestamp.inc();
            return Err(ServiceError::validation("invalid timestamp"));
        };
        let Some(requested_at) = DateTime::from_timestamp(secs, 0) else {
            self.metrics.invalid_timestamp.inc();
            return Err(ServiceError::validation("invalid timestamp"));
        };

        if self.clock.now().signed_duration_since(requested_at) > request_max_age() {
            self.metrics.timestamp_too_old.inc();
            return Err(ServiceError::authentication("timestamp is too old"));
        }
        Ok(())
    }

    /// Recover the signer's address from the message and signature.
    fn recover_node_id(&self, msg: &[u8], sig: &[u8]) -> Result<NodeId, ServiceError> {
        match signature::recover_address(msg, sig) {
            Ok(node_id) => {
                info!(node_id = %node_id, "recovered node id from signature");
                Ok(node_id)
            }
            Err(e) => {
                warn!(error = %e, "failed to recover node id from signature");
                self.metrics.failed_auth.inc();
                Err(ServiceError::authentication(
                    "failed to recover node id from signature",
                ))
            }
        }
    }

    /// Whether a node is currently registered on the Rocket Pool network.
    ///
    /// A stale registry refuses everyone rather than answering from old
    /// data.
    fn is_node_registered(&self, node_id: &NodeId) -> bool {
        if self.clock.now() > self.nodes.last_updated() + registry_max_age() {
            error!(node_id = %node_id, "node registry is too old, refusing access to node");
            self.metrics.old_node_registry.inc();
            return false;
        }
        self.nodes.contains(node_id)
    }

    /// Whether an address is the withdrawal address of at least one active
    /// validator.
    fn is_withdrawal_address(&self, node_id: &NodeId) -> bool {
        if self.clock.now() > self.withdrawal_addresses.last_updated() + registry_max_age() {
            error!(
                withdrawal_address = %node_id,
                "withdrawal address registry is too old, refusing access to user"
            );
            self.metrics.old_withdrawal_address_registry.inc();
            return false;
        }
        self.withdrawal_addresses.contains(node_id)
    }

    /// Whether a deny rule bans this node from the credential service.
    ///
    /// Fails closed: a store error counts as denied.
    async fn is_banned(&self, node_id: &NodeId) -> bool {
        match self
            .store
            .is_denied(node_id, Resource::CredentialService)
            .await
        {
            Ok(denied) => denied,
            Err(e) => {
                error!(error = %e, "failed to query authorization rules");
                true
            }
        }
    }

    /// Authorize the recovered identity for the requested operator type.
    async fn check_node_authorization(
        &self,
        node_id: &NodeId,
        operator_type: OperatorType,
    ) -> Result<(), ServiceError> {
        match operator_type {
            OperatorType::Rocketpool => {
                if !self.is_node_registered(node_id) {
                    self.metrics.node_not_registered.inc();
                    return Err(ServiceError::authorization("node is not registered"));
                }
            }
            OperatorType::Solo => {
                if !self.enable_solo_validators {
                    self.metrics.solo_traffic_shedding.inc();
                    return Err(ServiceError::authorization(
                        "solo validators are currently not permitted",
                    ));
                }
                if !self.is_withdrawal_address(node_id) {
                    self.metrics.solo_not_withdrawal_address.inc();
                    return Err(ServiceError::authorization(
                        "wallet is not a withdrawal address for any validator",
                    ));
                }
            }
        }

        if self.is_banned(node_id).await {
            self.metrics.user_banned.inc();
            return Err(ServiceError::authorization("node is not authorized"));
        }

        Ok(())
    }
}

// =============================================================================
// Test support
// =============================================================================

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::clock::FakeClock;
    use chrono::Utc;

    /// A service wired to an in-memory store, with handles to everything a
    /// test wants to poke at.
    pub(crate) struct TestHarness {
        pub service: Arc<Service>,
        pub store: Store,
        pub nodes: Arc<Registry>,
        pub withdrawal_addresses: Arc<Registry>,
        pub metrics: Arc<ServiceMetrics>,
        pub clock: Arc<dyn Clock>,
    }

    impl TestHarness {
        /// Freshen both registries so staleness gating passes.
        pub fn touch_registries(&self) {
            let now = self.clock.now();
            self.nodes.mark_updated(now);
            self.withdrawal_addresses.mark_updated(now);
        }

        /// Register a wallet in the node registry.
        pub fn register_node(&self, node_id: NodeId) {
            self.nodes.extend([node_id]);
            self.nodes.mark_updated(self.clock.now());
        }

        /// Register a wallet in the withdrawal-address registry.
        pub fn register_withdrawal_address(&self, node_id: NodeId) {
            self.withdrawal_addresses.extend([node_id]);
            self.withdrawal_addresses.mark_updated(self.clock.now());
        }
    }

    /// Build a service over a fresh shared in-memory database.
    pub(crate) async fn harness(clock: Arc<dyn Clock>) -> TestHarness {
        harness_with(clock, true).await
    }

    pub(crate) async fn harness_with(
        clock: Arc<dyn Clock>,
        enable_solo_validators: bool,
    ) -> TestHarness {
        let name = format!("service-test-{}", uuid::Uuid::new_v4().simple());
        let store = Store::open_in_memory(&name)
            .await
            .expect("in-memory store opens");
        let nodes = Arc::new(Registry::new());
        let withdrawal_addresses = Arc::new(Registry::new());
        let metrics = Arc::new(ServiceMetrics::default());

        let service = Arc::new(Service::new(ServiceConfig {
            store: store.clone(),
            credential_manager: CredentialManager::new(&b"test"[..]),
            nodes: Arc::clone(&nodes),
            withdrawal_addresses: Arc::clone(&withdrawal_addresses),
            clock: Arc::clone(&clock),
            metrics: Arc::clone(&metrics),
            enable_solo_validators,
        }));

        TestHarness {
            service,
            store,
            nodes,
            withdrawal_addresses,
            metrics,
            clock,
        }
    }

    /// A fake clock pinned to the current wall time.
    pub(crate) fn fake_clock() -> Arc<FakeClock> {
        FakeClock::at(Utc::now())
    }

    /// The credential manager every harness is built with.
    pub(crate) fn credential_manager() -> CredentialManager {
        CredentialManager::new(&b"test"[..])
    }
}
