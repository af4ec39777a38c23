// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! # Address Registries
//!
//! In-memory sets of node addresses with a freshness timestamp, refreshed
//! by the background tasks in [`crate::tasks`] and read on every request.
//!
//! Two publication strategies exist:
//!
//! - the node registry is add-only ([`Registry::extend`]);
//! - the withdrawal-address registry is replaced wholesale on each refresh
//!   ([`Registry::replace_all`]), atomically from a reader's viewpoint.
//!
//! Freshness gating lives in the service layer: a registry whose
//! `last_updated` is older than one hour fails every membership check.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::models::NodeId;

struct Inner {
    addresses: HashSet<NodeId>,
    last_updated: DateTime<Utc>,
}

/// A concurrently readable set of addresses plus its last refresh time.
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    /// Create an empty registry. `last_updated` starts at the epoch, so the
    /// registry is stale until its refresher first succeeds.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                addresses: HashSet::new(),
                last_updated: DateTime::UNIX_EPOCH,
            }),
        }
    }

    /// Union the given addresses into the set.
    pub fn extend(&self, ids: impl IntoIterator<Item = NodeId>) {
        let mut inner = self.inner.write();
        inner.addresses.extend(ids);
    }

    /// Replace the entire set in one step.
    ///
    /// Readers observe either the previous set or the new one, never an
    /// empty or partial set.
    pub fn replace_all(&self, ids: impl IntoIterator<Item = NodeId>) {
        let replacement: HashSet<NodeId> = ids.into_iter().collect();
        let mut inner = self.inner.write();
        inner.addresses = replacement;
    }

    /// Membership test, ignoring freshness.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.inner.read().addresses.contains(id)
    }

    /// When the owning refresher last succeeded.
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.inner.read().last_updated
    }

    /// Record a successful refresh at `now`.
    pub fn mark_updated(&self, now: DateTime<Utc>) {
        self.inner.write().last_updated = now;
    }

    pub fn len(&self) -> usize {
        self.inner.read().addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().addresses.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
