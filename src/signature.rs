// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! Signer recovery for wallet-signed request messages.
//!
//! Requests carry an `eth_sign`-style signature: 65 bytes of `r ‖ s ‖ v`
//! over the EIP-191 ("personal sign") hash of the message. The recovery id
//! `v` is accepted both in its raw form (0/1) and in the legacy 27/28 form
//! produced by most wallets.

use std::fmt;

use alloy::primitives::{eip191_hash_message, keccak256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::models::NodeId;

/// Length of an `eth_sign` signature: 32-byte r, 32-byte s, 1-byte v.
pub const SIGNATURE_LENGTH: usize = 65;

/// Offset of the recovery id within the signature.
const RECOVERY_ID_OFFSET: usize = 64;

/// Failure modes of signature recovery.
///
/// All variants are surfaced to callers as authentication failures; the
/// distinction only matters for logs.
#[derive(Debug)]
pub enum SignatureError {
    /// The signature is not exactly 65 bytes long.
    InvalidLength(usize),
    /// The recovery id is not one of 0, 1, 27, 28.
    InvalidRecoveryId(u8),
    /// The curve arithmetic rejected the signature.
    Recovery(k256::ecdsa::Error),
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::InvalidLength(len) => {
                write!(f, "invalid signature length: {len}")
            }
            SignatureError::InvalidRecoveryId(v) => {
                write!(f, "invalid recovery id: {v}")
            }
            SignatureError::Recovery(e) => write!(f, "signature recovery failed: {e}"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// Recover the address of the signer from a message and signature.
///
/// The message is hashed with the Ethereum signed-message prefix before
/// recovery, matching what wallets produce for `personal_sign`. Per the
/// Yellow Paper the recovery id is 27 or 28; some wallets emit the raw
/// 0/1 instead, so both are accepted.
pub fn recover_address(msg: &[u8], sig: &[u8]) -> Result<NodeId, SignatureError> {
    if sig.len() != SIGNATURE_LENGTH {
        return Err(SignatureError::InvalidLength(sig.len()));
    }

    let v = sig[RECOVERY_ID_OFFSET];
    let parity = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        other => return Err(SignatureError::InvalidRecoveryId(other)),
    };
    let recovery_id =
        RecoveryId::from_byte(parity).ok_or(SignatureError::InvalidRecoveryId(v))?;

    let signature = EcdsaSignature::from_slice(&sig[..RECOVERY_ID_OFFSET])
        .map_err(SignatureError::Recovery)?;

    let hash = eip191_hash_message(msg);
    let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &signature, recovery_id)
        .map_err(SignatureError::Recovery)?;

    Ok(address_of(&key))
}

/// The Ethereum address of a public key: the low 20 bytes of the keccak256
/// hash of the uncompressed point, without the 0x04 prefix byte.
fn address_of(key: &VerifyingKey) -> NodeId {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    NodeId::from_slice(&hash[12..])
}

/// A throwaway signing wallet for tests.
#[cfg(test)]
pub(crate) struct Wallet {
    key: k256::ecdsa::SigningKey,
    pub address: NodeId,
}

#[cfg(test)]
impl Wallet {
    /// Generate a wallet with a random private key.
    pub fn random() -> Self {
        let key = k256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let address = address_of(key.verifying_key());
        Self { key, address }
    }

    /// Sign a message in the `eth_sign` format, with v in {27, 28}.
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        let hash = eip191_hash_message(msg);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(hash.as_slice())
            .expect("signing cannot fail for a valid key");
        let mut out = signature.to_bytes().to_vec();
        out.push(recovery_id.to_byte() + 27);
        out
    }
}
