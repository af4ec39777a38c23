// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! Periodic refresh of the Rocket Pool node registry.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::external::NodeListSource;
use crate::registry::Registry;

use super::{FAILURE_INTERVAL, FIRST_TICK, SUCCESS_INTERVAL};

/// Keeps the node registry updated from one or more sources, tried in
/// order. The first source that answers wins the cycle; typically this is
/// the rescue-proxy API with Rocketscan as an optional fallback.
pub struct UpdateNodesTask {
    sources: Vec<Box<dyn NodeListSource>>,
    nodes: Arc<Registry>,
    clock: Arc<dyn Clock>,
}

impl UpdateNodesTask {
    pub fn new(
        sources: Vec<Box<dyn NodeListSource>>,
        nodes: Arc<Registry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sources,
            nodes,
            clock,
        }
    }

    /// Run until the token is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut delay = FIRST_TICK;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("update nodes task stopped");
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

    /// One refresh cycle. Returns whether any source succeeded.
    async fn refresh(&mut self) -> bool {
        for source in &mut self.sources {
            let name = source.name();
            info!(source = name, "updating rocket pool node registry");
            match source.fetch().await {
                Ok(ids) => {
                    let count = ids.len();
                    self.nodes.extend(ids);
                    self.nodes.mark_updated(self.clock.now());
                    info!(
                        source = name,
                        count,
                        total = self.nodes.len(),
                        "node registry successfully updated"
                    );
                    return true;
                }
                Err(e) => {
                    warn!(source = name, error = %e, "failed to update node registry");
                }
            }
        }
        false
    }
}
