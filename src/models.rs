// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! # Core Data Model
//!
//! Identity, operator-type, and persisted-row vocabulary shared by the
//! service, store, and API layers.
//!
//! ## Node Identity
//!
//! A node is identified by its 20-byte Ethereum address ([`NodeId`]).
//! Equality is bytewise; the hex form appears only in logs and JSON.

use std::fmt;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A node operator's identity: a 20-byte Ethereum address.
pub type NodeId = Address;

/// Build a [`NodeId`] from a raw byte string of arbitrary length.
///
/// Follows the conventional address widening rules: longer inputs keep the
/// rightmost 20 bytes, shorter inputs are left-padded with zeroes. Remote
/// registry sources hand us raw byte lists, so this is deliberately lenient.
pub fn node_id_from_bytes(bytes: &[u8]) -> NodeId {
    let mut out = [0u8; 20];
    if bytes.len() >= 20 {
        out.copy_from_slice(&bytes[bytes.len() - 20..]);
    } else {
        out[20 - bytes.len()..].copy_from_slice(bytes);
    }
    NodeId::from(out)
}

// =============================================================================
// Operator Type
// =============================================================================

/// The population a request claims membership of.
///
/// Carried in the credential payload and in every persisted event row.
/// Requests that do not name a type are rocket-pool requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OperatorType {
    /// A node registered on the Rocket Pool network.
    #[default]
    Rocketpool,
    /// A solo validator identified by its withdrawal address.
    Solo,
}

impl OperatorType {
    /// Integer form used in event rows.
    pub fn as_i64(self) -> i64 {
        match self {
            OperatorType::Rocketpool => 0,
            OperatorType::Solo => 1,
        }
    }

    /// Single-byte form used in the credential payload.
    pub fn as_u8(self) -> u8 {
        self.as_i64() as u8
    }

    /// Decode the payload byte back into an operator type.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(OperatorType::Rocketpool),
            1 => Some(OperatorType::Solo),
            _ => None,
        }
    }

    /// Interpret the `operator_type` query parameter.
    ///
    /// Only a case-insensitive `solo` selects [`OperatorType::Solo`]; any
    /// other value, or no value at all, means rocket-pool.
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("solo") => OperatorType::Solo,
            _ => OperatorType::Rocketpool,
        }
    }
}

impl fmt::Display for OperatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorType::Rocketpool => write!(f, "rocketpool"),
            OperatorType::Solo => write!(f, "solo"),
        }
    }
}

// =============================================================================
// Credential Events
// =============================================================================

/// The kind of a persisted credential event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialEventType {
    Issued,
    Revoked,
}

impl CredentialEventType {
    pub fn as_i64(self) -> i64 {
        match self {
            CredentialEventType::Issued => 0,
            CredentialEventType::Revoked => 1,
        }
    }
}

// =============================================================================
// Authorization Rules
// =============================================================================

/// A resource an authorization rule can apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    CredentialService,
}

impl Resource {
    pub fn as_i64(self) -> i64 {
        match self {
            Resource::CredentialService => 0,
        }
    }
}

/// The effect of an authorization rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Allow,
    Deny,
}

impl Action {
    pub fn as_i64(self) -> i64 {
        match self {
            Action::Allow => 0,
            Action::Deny => 1,
        }
    }
}

/// A persisted rule applied to a node while accessing a resource.
///
/// A `Deny` rule for [`Resource::CredentialService`] forbids both issuance
/// and operator-info retrieval for that node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationRule {
    pub node_id: NodeId,
    pub resource: Resource,
    pub action: Action,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_from_bytes_handles_all_lengths() {
        let exact: Vec<u8> = (1..=20).collect();
        assert_eq!(node_id_from_bytes(&exact).as_slice(), exact.as_slice());

        let long: Vec<u8> = (0..32).collect();
        assert_eq!(node_id_from_bytes(&long).as_slice(), &long[12..]);

        let short = [0xaa, 0xbb];
        let id = node_id_from_bytes(&short);
        assert_eq!(&id.as_slice()[..18], &[0u8; 18]);
        assert_eq!(&id.as_slice()[18..], &short);
    }

    #[test]
    fn operator_type_query_parsing() {
        assert_eq!(OperatorType::from_query(None), OperatorType::Rocketpool);
        assert_eq!(OperatorType::from_query(Some("solo")), OperatorType::Solo);
        assert_eq!(OperatorType::from_query(Some("SOLO")), OperatorType::Solo);
        assert_eq!(
            OperatorType::from_query(Some("rocketpool")),
            OperatorType::Rocketpool
        );
        assert_eq!(
            OperatorType::from_query(Some("anything-else")),
            OperatorType::Rocketpool
        );
    }

    #[test]
    fn operator_type_byte_round_trip() {
        for ot in [OperatorType::Rocketpool, OperatorType::Solo] {
            assert_eq!(OperatorType::from_u8(ot.as_u8()), Some(ot));
        }
        assert_eq!(OperatorType::from_u8(2), None);
    }
}
