// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! Shared application state for request handlers.

use std::sync::Arc;

use crate::service::Service;

/// Passed to every handler via Axum's `State` extractor.
///
/// `Clone` is cheap: the service is reference-counted and internally
/// thread-safe.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
}

impl AppState {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}
