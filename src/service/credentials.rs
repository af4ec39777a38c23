// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! Credential issuance.
//!
//! The decision per request: reissue the operator's last credential while
//! it is comfortably inside its validity window, refuse when the quota for
//! the current window is spent, and append a fresh issuance event
//! otherwise. The read-then-write critical section runs inside a single
//! transaction so concurrent requests for the same identity serialize on
//! the store's single writer.

use std::time::Duration;

use chrono::{DateTime, TimeDelta};
use tracing::{info, warn};

use crate::credentials::AuthenticatedCredential;
use crate::models::{CredentialEventType, OperatorType};
use crate::store::{self, Store};

use super::{quota_for, Service, ServiceError};

/// A credential is reissued only while it remains valid for at least this
/// long, so operators are not handed a nearly dead credential.
fn min_validity_window() -> TimeDelta {
    TimeDelta::hours(48)
}

/// Delays between issuance retries, in milliseconds.
/// Values are taken from SQLite's default busy handler.
const DB_RETRY_DELAYS_MS: [u64; 12] = [1, 2, 5, 10, 15, 20, 25, 25, 25, 50, 50, 100];

impl Service {
    /// Create a credential, retrying transient storage conflicts.
    ///
    /// Busy, locked, and constraint errors are retried on the busy-handler
    /// schedule; any other error is surfaced immediately.
    pub async fn create_credential_with_retry(
        &self,
        msg: &[u8],
        sig: &[u8],
        operator_type: OperatorType,
    ) -> Result<AuthenticatedCredential, ServiceError> {
        self.metrics.create_credential_with_retry.inc();

        let mut last_err = None;
        for (attempt, delay_ms) in DB_RETRY_DELAYS_MS.iter().enumerate() {
            match self.create_credential(msg, sig, operator_type).await {
                Ok(credential) => return Ok(credential),
                Err(ServiceError::Database(e)) if store::is_transient(&e) => {
                    warn!(
                        attempt,
                        retry_ms = delay_ms,
                        error = %e,
                        "failed to issue credential, retrying"
                    );
                    self.metrics.create_credential_retried.inc();
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                    last_err = Some(ServiceError::Database(e));
                }
                Err(e) => {
                    if matches!(e, ServiceError::Database(_)) {
                        self.metrics.create_credential_unrecoverable_error.inc();
                    }
                    return Err(e);
                }
            }
        }

        let err = last_err.unwrap_or_else(|| {
            ServiceError::Internal("credential retry loop exhausted without an error".into())
        });
        warn!(
            tries = DB_RETRY_DELAYS_MS.len(),
            error = %err,
            "failed to issue credential, giving up"
        );
        Err(err)
    }

    /// Create a credential for the signer of `msg`. If a still-valid
    /// credential exists it is returned instead of issuing a new one.
    ///
    /// No retry logic here; callers wanting resilience against writer
    /// contention use [`Service::create_credential_with_retry`].
    pub async fn create_credential(
        &self,
        msg: &[u8],
        sig: &[u8],
        operator_type: OperatorType,
    ) -> Result<AuthenticatedCredential, ServiceError> {
        let node_id = self
            .authenticate_and_authorize(msg, sig, operator_type)
            .await?;

        let quota = quota_for(operator_type);

        // The transaction makes the count-and-last-issuance read and the
        // event append one atomic step; parallel requests for the same
        // identity cannot both slip past the quota check.
        let mut tx = self.store.begin().await?;

        let now = self.clock.now();
        let window_start = (now - quota.window).timestamp();
        let (last_issued, issued_count) = Store::event_max_and_count(
            &mut tx,
            &node_id,
            window_start,
            CredentialEventType::Issued,
            operator_type,
        )
        .await?;

        // Reissue the last credential while it is still valid, unless it is
        // about to expire and quota remains for a fresh one.
        let created = DateTime::from_timestamp(last_issued, 0)
            .ok_or_else(|| ServiceError::Internal("stored timestamp out of range".into()))?;
        let expires = created + quota.auth_validity_window;
        if expires > now && (expires - now > min_validity_window() || issued_count == quota.count)
        {
            self.metrics.create_credential_recycled.inc();
            return Ok(self
                .credential_manager
                .create(created, node_id, operator_type));
        }

        if issued_count >= quota.count {
            warn!(
                node_id = %node_id,
                issued_count,
                quota = quota.count,
                window_start,
                operator_type = %operator_type,
                "node has reached its quota for the current window"
            );
            self.metrics.create_credential_quota_exceeded.inc();
            return Err(ServiceError::Authorization(
                "node has requested too many credentials".into(),
            ));
        }

        Store::insert_event(
            &mut tx,
            &node_id,
            now.timestamp(),
            CredentialEventType::Issued,
            operator_type,
        )
        .await?;

        let credential = self.credential_manager.create(now, node_id, operator_type);

        tx.commit().await?;

        info!(
            node_id = %node_id,
            operator_type = %operator_type,
            timestamp = credential.credential.timestamp,
            "issued credential"
        );
        self.metrics.create_credential_created.inc();
        Ok(credential)
    }
}
