// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! # Credential Codec
//!
//! Builds, HMAC-signs, verifies, and encodes the short-lived credentials
//! handed to operators. A credential is presented to the downstream rescue
//! node as an HTTP basic-auth pair: the username is the encoded payload,
//! the password is the encoded MAC.
//!
//! ## Wire Contract
//!
//! The payload serialization is shared bit-exact with the relay that
//! verifies these credentials:
//!
//! ```text
//! node_id       20 bytes
//! timestamp      8 bytes, big-endian two's-complement seconds since epoch
//! operator_type  1 byte (0 = rocketpool, 1 = solo)
//! ```
//!
//! Both username and password use padded URL-safe base64.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::models::{NodeId, OperatorType};

type HmacSha256 = Hmac<Sha256>;

/// Serialized payload size: 20-byte node id, 8-byte timestamp, 1-byte type.
pub const PAYLOAD_LENGTH: usize = 29;

/// HMAC-SHA256 output size.
pub const MAC_LENGTH: usize = 32;

/// Errors produced while decoding or verifying credentials.
#[derive(Debug, PartialEq, Eq)]
pub enum CredentialError {
    /// A decoded payload was not exactly [`PAYLOAD_LENGTH`] bytes.
    InvalidPayloadLength(usize),
    /// The operator-type byte was not a known variant.
    InvalidOperatorType(u8),
    /// The username or password was not valid URL-safe base64.
    InvalidEncoding,
    /// The MAC did not match the payload.
    InvalidMac,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::InvalidPayloadLength(len) => {
                write!(f, "invalid credential payload length: {len}")
            }
            CredentialError::InvalidOperatorType(b) => {
                write!(f, "invalid operator type byte: {b}")
            }
            CredentialError::InvalidEncoding => write!(f, "invalid credential encoding"),
            CredentialError::InvalidMac => write!(f, "credential MAC mismatch"),
        }
    }
}

impl std::error::Error for CredentialError {}

// =============================================================================
// Payload
// =============================================================================

/// The signed portion of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialPayload {
    /// The operator's identity.
    pub node_id: NodeId,
    /// Issuance moment, seconds since epoch.
    pub timestamp: i64,
    /// Which population the credential was issued for.
    pub operator_type: OperatorType,
}

impl CredentialPayload {
    /// Serialize to the fixed 29-byte wire form.
    pub fn to_bytes(&self) -> [u8; PAYLOAD_LENGTH] {
        let mut out = [0u8; PAYLOAD_LENGTH];
        out[..20].copy_from_slice(self.node_id.as_slice());
        out[20..28].copy_from_slice(&self.timestamp.to_be_bytes());
        out[28] = self.operator_type.as_u8();
        out
    }

    /// Parse the fixed wire form back into a payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CredentialError> {
        if bytes.len() != PAYLOAD_LENGTH {
            return Err(CredentialError::InvalidPayloadLength(bytes.len()));
        }
        let node_id = NodeId::from_slice(&bytes[..20]);
        let timestamp = i64::from_be_bytes(
            bytes[20..28]
                .try_into()
                .expect("slice length checked above"),
        );
        let operator_type = OperatorType::from_u8(bytes[28])
            .ok_or(CredentialError::InvalidOperatorType(bytes[28]))?;
        Ok(Self {
            node_id,
            timestamp,
            operator_type,
        })
    }
}

// =============================================================================
// Authenticated Credential
// =============================================================================

/// A payload together with its MAC, ready to hand to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedCredential {
    pub credential: CredentialPayload,
    pub mac: [u8; MAC_LENGTH],
}

impl AuthenticatedCredential {
    /// Basic-auth username: the encoded payload.
    pub fn username(&self) -> String {
        URL_SAFE.encode(self.credential.to_bytes())
    }

    /// Basic-auth password: the encoded MAC.
    pub fn password(&self) -> String {
        URL_SAFE.encode(self.mac)
    }
}

/// Decode a basic-auth username back into the payload it encodes.
///
/// This is what the relay does on its side of the contract; exposed here so
/// tests can assert the round-trip.
pub fn decode_username(username: &str) -> Result<CredentialPayload, CredentialError> {
    let bytes = URL_SAFE
        .decode(username)
        .map_err(|_| CredentialError::InvalidEncoding)?;
    CredentialPayload::from_bytes(&bytes)
}

// =============================================================================
// Credential Manager
// =============================================================================

/// Creates and verifies credentials with a process-wide HMAC secret.
///
/// The secret is loaded once at startup and never rotated. It is
/// intentionally excluded from `Debug` output and never logged.
#[derive(Clone)]
pub struct CredentialManager {
    secret: Vec<u8>,
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager").finish_non_exhaustive()
    }
}

impl CredentialManager {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Build a credential for `node_id` issued at `issued_at`.
    pub fn create(
        &self,
        issued_at: DateTime<Utc>,
        node_id: NodeId,
        operator_type: OperatorType,
    ) -> AuthenticatedCredential {
        let credential = CredentialPayload {
            node_id,
            timestamp: issued_at.timestamp(),
            operator_type,
        };
        let mac = self.mac_for(&credential);
        AuthenticatedCredential { credential, mac }
    }

    /// Verify a credential's MAC in constant time.
    pub fn verify(&self, credential: &AuthenticatedCredential) -> Result<(), CredentialError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(&credential.credential.to_bytes());
        mac.verify_slice(&credential.mac)
            .map_err(|_| CredentialError::InvalidMac)
    }

    fn mac_for(&self, payload: &CredentialPayload) -> [u8; MAC_LENGTH] {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(&payload.to_bytes());
        mac.finalize().into_bytes().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> CredentialManager {
        CredentialManager::new(&b"test"[..])
    }

    fn node() -> NodeId {
        NodeId::from_slice(&[0x11; 20])
    }

    #[test]
    fn create_then_verify() {
        let cm = manager();
        let now = Utc::now();
        for ot in [OperatorType::Rocketpool, OperatorType::Solo] {
            let cred = cm.create(now, node(), ot);
            cm.verify(&cred).expect("fresh credential verifies");
        }
    }

    #[test]
    fn verify_rejects_tampered_mac() {
        let cm = manager();
        let mut cred = cm.create(Utc::now(), node(), OperatorType::Rocketpool);
        cred.mac[0] ^= 0x01;
        assert_eq!(cm.verify(&cred), Err(CredentialError::InvalidMac));
    }

    #[test]
    fn verify_rejects_tampered_payload() {
        let cm = manager();
        let mut cred = cm.create(Utc::now(), node(), OperatorType::Rocketpool);
        cred.credential.timestamp += 1;
        assert_eq!(cm.verify(&cred), Err(CredentialError::InvalidMac));
    }

    #[test]
    fn different_secrets_disagree() {
        let cred = manager().create(Utc::now(), node(), OperatorType::Rocketpool);
        let other = CredentialManager::new(&b"other-secret"[..]);
        assert_eq!(other.verify(&cred), Err(CredentialError::InvalidMac));
    }

    #[test]
    fn username_round_trips_payload() {
        let cm = manager();
        let issued = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let cred = cm.create(issued, node(), OperatorType::Solo);

        let decoded = decode_username(&cred.username()).expect("username decodes");
        assert_eq!(decoded, cred.credential);
        assert_eq!(decoded.node_id, node());
        assert_eq!(decoded.timestamp, 1_700_000_000);
        assert_eq!(decoded.operator_type, OperatorType::Solo);
    }

    #[test]
    fn username_is_deterministic_per_identity() {
        let cm = manager();
        let issued = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let a = cm.create(issued, node(), OperatorType::Rocketpool);
        let b = cm.create(issued, node(), OperatorType::Rocketpool);
        assert_eq!(a.username(), b.username());
        assert_eq!(a.password(), b.password());

        // Any change in the identity triple changes the username.
        let later = cm.create(issued + chrono::TimeDelta::seconds(1), node(), OperatorType::Rocketpool);
        assert_ne!(a.username(), later.username());
        let solo = cm.create(issued, node(), OperatorType::Solo);
        assert_ne!(a.username(), solo.username());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(
            decode_username("!!!not-base64!!!"),
            Err(CredentialError::InvalidEncoding)
        );
        let short = URL_SAFE.encode([0u8; 10]);
        assert_eq!(
            decode_username(&short),
            Err(CredentialError::InvalidPayloadLength(10))
        );
        let mut bytes = [0u8; PAYLOAD_LENGTH];
        bytes[28] = 9;
        assert_eq!(
            decode_username(&URL_SAFE.encode(bytes)),
            Err(CredentialError::InvalidOperatorType(9))
        );
    }
}
