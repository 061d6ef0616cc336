// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-installation failure accounting

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Consecutive failures per reconcile key.
///
/// Counts belong to one generation of the installation: a failure recorded
/// against a newer generation starts counting again from one.
#[derive(Debug, Default)]
pub struct FailureTracker {
    counts: Mutex<HashMap<String, Failures>>,
}

#[derive(Debug, Clone, Copy)]
struct Failures {
    generation: Option<i64>,
    count: u32,
}

impl FailureTracker {
    fn counts(&self) -> MutexGuard<'_, HashMap<String, Failures>> {
        // Counters stay meaningful even if a holder panicked.
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one more failure for `key` at `generation` and return the new total
    pub fn record(&self, key: &str, generation: Option<i64>) -> u32 {
        let mut counts = self.counts();
        let failures = counts.entry(key.to_string()).or_insert(Failures {
            generation,
            count: 0,
        });
        if failures.generation != generation {
            *failures = Failures {
                generation,
                count: 0,
            };
        }
        failures.count = failures.count.saturating_add(1);
        failures.count
    }

    pub fn count(&self, key: &str) -> u32 {
        self.counts().get(key).map_or(0, |failures| failures.count)
    }

    pub fn reset(&self, key: &str) {
        self.counts().remove(key);
    }
}

/// Delay before retry number `attempt` (starting at 1): `base * 2^(attempt-1)`, at most `max`
pub fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent).min(max)
}
