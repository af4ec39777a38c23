// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! Process-global request counters.
//!
//! Lock-free `AtomicU64` counters, rendered in Prometheus exposition format
//! and served on a dedicated metrics listener. The counters are passed to
//! the service as an explicit dependency so tests can install their own
//! instance and assert on it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{extract::State, routing::get, Router};

/// A single monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters for every interesting outcome on the request paths.
///
/// Names follow the events they count; see [`ServiceMetrics::render`] for
/// the exported metric names.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    pub create_credential_with_retry: Counter,
    pub create_credential_created: Counter,
    pub create_credential_recycled: Counter,
    pub create_credential_quota_exceeded: Counter,
    pub create_credential_retried: Counter,
    pub create_credential_unrecoverable_error: Counter,
    pub retrieved_operator_info: Counter,
    pub invalid_timestamp: Counter,
    pub timestamp_too_old: Counter,
    pub failed_auth: Counter,
    pub node_not_registered: Counter,
    pub solo_traffic_shedding: Counter,
    pub solo_not_withdrawal_address: Counter,
    pub user_banned: Counter,
    pub old_node_registry: Counter,
    pub old_withdrawal_address_registry: Counter,
}

impl ServiceMetrics {
    fn counters(&self) -> [(&'static str, &Counter); 16] {
        [
            (
                "create_credential_with_retry",
                &self.create_credential_with_retry,
            ),
            ("create_credential_created", &self.create_credential_created),
            (
                "create_credential_recycled",
                &self.create_credential_recycled,
            ),
            (
                "create_credential_quota_exceeded",
                &self.create_credential_quota_exceeded,
            ),
            ("create_credential_retried", &self.create_credential_retried),
            (
                "create_credential_unrecoverable_error",
                &self.create_credential_unrecoverable_error,
            ),
            ("retrieved_operator_info", &self.retrieved_operator_info),
            ("invalid_timestamp", &self.invalid_timestamp),
            ("timestamp_too_old", &self.timestamp_too_old),
            ("failed_auth", &self.failed_auth),
            ("node_not_registered", &self.node_not_registered),
            ("solo_traffic_shedding", &self.solo_traffic_shedding),
            (
                "solo_not_withdrawal_address",
                &self.solo_not_withdrawal_address,
            ),
            ("user_banned", &self.user_banned),
            ("old_node_registry", &self.old_node_registry),
            (
                "old_withdrawal_address_registry",
                &self.old_withdrawal_address_registry,
            ),
        ]
    }

    /// Render all counters in Prometheus exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, counter) in self.counters() {
            out.push_str(&format!(
                "# TYPE rescue_api_{name} counter\nrescue_api_{name} {}\n",
                counter.get()
            ));
        }
        out
    }
}

/// Router for the metrics listener: a single `/metrics` endpoint.
pub fn metrics_router(metrics: Arc<ServiceMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics)
}

async fn render_metrics(State(metrics): State<Arc<ServiceMetrics>>) -> String {
    metrics.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let metrics = ServiceMetrics::default();
        assert_eq!(metrics.create_credential_created.get(), 0);

        metrics.create_credential_created.inc();
        metrics.create_credential_created.inc();
        assert_eq!(metrics.create_credential_created.get(), 2);
    }

    #[test]
    fn render_contains_every_counter() {
        let metrics = ServiceMetrics::default();
        metrics.failed_auth.inc();

        let rendered = metrics.render();
        assert!(rendered.contains("rescue_api_failed_auth 1"));
        assert!(rendered.contains("rescue_api_create_credential_created 0"));
        assert!(rendered.contains("# TYPE rescue_api_user_banned counter"));
    }
}
