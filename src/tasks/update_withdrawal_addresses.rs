// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! Periodic refresh of the withdrawal-address registry.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::external::NodeListSource;
use crate::registry::Registry;

use super::{FAILURE_INTERVAL, FIRST_TICK, SUCCESS_INTERVAL};

/// Keeps the withdrawal-address registry updated from the rescue-proxy
/// API.
///
/// Unlike the node registry, each successful pull replaces the set
/// wholesale: withdrawal addresses go away when validators exit, so
/// accumulating them would slowly reopen access for retired validators.
pub struct UpdateWithdrawalAddressesTask {
    source: Box<dyn NodeListSource>,
    withdrawal_addresses: Arc<Registry>,
    clock: Arc<dyn Clock>,
}

impl UpdateWithdrawalAddressesTask {
    pub fn new(
        source: Box<dyn NodeListSource>,
        withdrawal_addresses: Arc<Registry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            withdrawal_addresses,
            clock,
        }
    }

    /// Run until the token is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut delay = FIRST_TICK;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("update withdrawal addresses task stopped");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            delay = if self.refresh().await {
                SUCCESS_INTERVAL
            } else {
                FAILURE_INTERVAL
            };
        }
    }

    /// One refresh cycle. Returns whether the pull succeeded.
    async fn refresh(&mut self) -> bool {
        info!("updating withdrawal address registry");
        match self.source.fetch().await {
            Ok(ids) => {
                let count = ids.len();
                self.withdrawal_addresses.replace_all(ids);
                self.withdrawal_addresses.mark_updated(self.clock.now());
                info!(count, "withdrawal address registry successfully updated");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to update withdrawal address registry");
                false
            }
        }
    }
}
