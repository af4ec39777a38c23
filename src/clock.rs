// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! Injectable time source.
//!
//! Every component that makes time-based decisions (request freshness,
//! registry staleness, quota windows) reads the clock through this trait so
//! tests can drive the timeline deterministically.

use chrono::{DateTime, Utc};

/// A source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests.
#[cfg(test)]
pub(crate) struct FakeClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl FakeClock {
    /// Create a fake clock frozen at the given instant.
    pub fn at(now: DateTime<Utc>) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            now: parking_lot::Mutex::new(now),
        })
    }

    /// Move the clock forward.
    pub fn advance(&self, delta: chrono::TimeDelta) {
        let mut now = self.now.lock();
        *now += delta;
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }
}

#[cfg(test)]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
