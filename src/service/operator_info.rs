// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! Operator info retrieval.
//!
//! Read-only sibling of the issuance path: the same authentication and
//! authorization pipeline, followed by a window-bounded query of issuance
//! timestamps. No transaction is needed.

use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::models::{CredentialEventType, OperatorType};

use super::{quota_for, Quota, Service, ServiceError};

/// The quota record as reported to operators.
///
/// Durations are integer nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuotaSettings {
    pub count: u32,
    pub window: i64,
    #[serde(rename = "authValidityWindow")]
    pub auth_validity_window: i64,
}

impl From<Quota> for QuotaSettings {
    fn from(quota: Quota) -> Self {
        Self {
            count: quota.count as u32,
            window: quota.window.num_nanoseconds().unwrap_or(i64::MAX),
            auth_validity_window: quota
                .auth_validity_window
                .num_nanoseconds()
                .unwrap_or(i64::MAX),
        }
    }
}

/// Issuance history and limits for one operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorInfo {
    /// Issuance timestamps in the current window, newest first.
    pub credential_events: Vec<i64>,
    /// The quota settings for the requested operator type.
    pub quota_settings: QuotaSettings,
}

impl Service {
    /// Report the operator's current-window issuances and quota settings.
    ///
    /// An operator with no issuances gets an empty event list; that is a
    /// valid response, not an error.
    pub async fn get_operator_info(
        &self,
        msg: &[u8],
        sig: &[u8],
        operator_type: OperatorType,
    ) -> Result<OperatorInfo, ServiceError> {
        let node_id = self
            .authenticate_and_authorize(msg, sig, operator_type)
            .await?;

        let quota = quota_for(operator_type);
        let now = self.clock.now();
        let window_start = (now - quota.window).timestamp();

        let credential_events = self
            .store
            .list_event_timestamps(
                &node_id,
                window_start,
                now.timestamp(),
                CredentialEventType::Issued,
                operator_type,
                quota.count,
            )
            .await?;

        info!(
            node_id = %node_id,
            operator_type = %operator_type,
            events = credential_events.len(),
            "retrieved operator info"
        );
        self.metrics.retrieved_operator_info.inc();

        Ok(OperatorInfo {
            credential_events,
            quota_settings: QuotaSettings::from(quota),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::super::testutil::{self, TestHarness};
    use super::*;
    use crate::clock::Clock;
    use crate::signature::Wallet;

    async fn info_for(
        harness: &TestHarness,
        wallet: &Wallet,
        operator_type: OperatorType,
    ) -> Result<OperatorInfo, ServiceError> {
        let msg = format!("Rescue Node {}", harness.clock.now().timestamp());
        let sig = wallet.sign(msg.as_bytes());
        harness
            .service
            .get_operator_info(msg.as_bytes(), &sig, operator_type)
            .await
    }

    async fn issue(harness: &TestHarness, wallet: &Wallet) -> i64 {
        let msg = format!("Rescue Node {}", harness.clock.now().timestamp());
        let sig = wallet.sign(msg.as_bytes());
        harness
            .service
            .create_credential_with_retry(msg.as_bytes(), &sig, OperatorType::Rocketpool)
            .await
            .expect("issuance succeeds")
            .credential
            .timestamp
    }

    #[tokio::test]
    async fn empty_history_is_a_valid_response() {
        let clock = testutil::fake_clock();
        let harness = testutil::harness(clock.clone()).await;

        let wallet = Wallet::random();
        harness.register_node(wallet.address);

        let info = info_for(&harness, &wallet, OperatorType::Rocketpool)
            .await
            .expect("info succeeds");
        assert!(info.credential_events.is_empty());
        assert_eq!(info.quota_settings.count, 4);
    }

    #[tokio::test]
    async fn reports_issuances_newest_first() {
        let clock = testutil::fake_clock();
        let harness = testutil::harness(clock.clone()).await;

        let wallet = Wallet::random();
        harness.register_node(wallet.address);

        // Two issuances, far enough apart that the second is fresh.
        let t0 = issue(&harness, &wallet).await;
        clock.advance(TimeDelta::days(15));
        harness.touch_registries();
        let t1 = issue(&harness, &wallet).await;
        assert_ne!(t0, t1);

        let info = info_for(&harness, &wallet, OperatorType::Rocketpool)
            .await
            .expect("info succeeds");
        assert_eq!(info.credential_events, vec![t1, t0]);
    }

    #[tokio::test]
    async fn quota_settings_report_durations_in_nanoseconds() {
        let clock = testutil::fake_clock();
        let harness = testutil::harness(clock.clone()).await;

        let wallet = Wallet::random();
        harness.register_node(wallet.address);

        let info = info_for(&harness, &wallet, OperatorType::Rocketpool)
            .await
            .expect("info succeeds");
        assert_eq!(info.quota_settings.count, 4);
        assert_eq!(info.quota_settings.window, 365 * 24 * 3600 * 1_000_000_000);
        assert_eq!(
            info.quota_settings.auth_validity_window,
            15 * 24 * 3600 * 1_000_000_000
        );

        // Solo settings differ.
        harness.register_withdrawal_address(wallet.address);
        let info = info_for(&harness, &wallet, OperatorType::Solo)
            .await
            .expect("solo info succeeds");
        assert_eq!(info.quota_settings.count, 3);
        assert_eq!(
            info.quota_settings.auth_validity_window,
            10 * 24 * 3600 * 1_000_000_000
        );
    }

    #[tokio::test]
    async fn shares_the_issuance_auth_pipeline() {
        let clock = testutil::fake_clock();
        let harness = testutil::harness(clock.clone()).await;

        // Unknown node.
        let wallet = Wallet::random();
        match info_for(&harness, &wallet, OperatorType::Rocketpool).await {
            Err(ServiceError::Authorization(_)) => {}
            other => panic!("expected authorization failure, got {other:?}"),
        }

        // Stale request timestamp.
        harness.register_node(wallet.address);
        let old_msg = b"Rescue Node 0000000000";
        let sig = wallet.sign(old_msg);
        match harness
            .service
            .get_operator_info(old_msg, &sig, OperatorType::Rocketpool)
            .await
        {
            Err(ServiceError::Authentication(_)) => {}
            other => panic!("expected authentication failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn events_are_scoped_to_the_requested_operator_type() {
        let clock = testutil::fake_clock();
        let harness = testutil::harness(clock.clone()).await;

        let wallet = Wallet::random();
        harness.register_node(wallet.address);
        harness.register_withdrawal_address(wallet.address);

        issue(&harness, &wallet).await;

        // The rocket-pool issuance does not show up under solo.
        let info = info_for(&harness, &wallet, OperatorType::Solo)
            .await
            .expect("solo info succeeds");
        assert!(info.credential_events.is_empty());
    }
}
