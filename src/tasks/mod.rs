// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! # Registry Refresher Tasks
//!
//! Two long-running background loops keep the in-memory registries close
//! to the chain's view of the world:
//!
//! - [`UpdateNodesTask`] unions the current Rocket Pool node list into the
//!   node registry (add-only);
//! - [`UpdateWithdrawalAddressesTask`] replaces the withdrawal-address
//!   registry wholesale on each successful pull.
//!
//! Both share the same cadence: a first tick one second after startup,
//! then five minutes after a success or thirty seconds after a failure.
//! A failed cycle leaves `last_updated` untouched, so a source outage
//! eventually trips the service's staleness gate instead of serving stale
//! membership silently.
//!
//! Shutdown is a `CancellationToken`; a stop completes within one
//! outstanding network call plus its deadline.

mod update_nodes;
mod update_withdrawal_addresses;

use std::time::Duration;

pub use update_nodes::UpdateNodesTask;
pub use update_withdrawal_addresses::UpdateWithdrawalAddressesTask;

/// Delay before the first refresh attempt.
const FIRST_TICK: Duration = Duration::from_secs(1);

/// Delay after a successful refresh.
const SUCCESS_INTERVAL: Duration = Duration::from_secs(300);

/// Delay after a failed refresh.
const FAILURE_INTERVAL: Duration = Duration::from_secs(30);
