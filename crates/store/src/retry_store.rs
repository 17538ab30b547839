// SPDX-License-Identifier: MIT

//! Pending retries scheduled by the retry policy hook. A `Retry { delay_ms }`
//! decision records a deadline here instead of blocking the actor; the
//! alarm sweep redispatches tokens whose deadline has passed, the same
//! mechanism used for sync and subworkflow timeouts.

use flowctl_core::TokenId;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct PendingRetry {
    pub token_id: TokenId,
    pub ready_at_ms: u64,
}

#[derive(Default)]
pub struct RetryStore {
    pending: Mutex<HashMap<TokenId, PendingRetry>>,
}

impl RetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules (or reschedules) a retry for `token_id` no earlier than `ready_at_ms`.
    pub fn schedule(&self, token_id: TokenId, ready_at_ms: u64) {
        self.pending.lock().insert(token_id, PendingRetry { token_id, ready_at_ms });
    }

    /// Removes and returns every retry whose deadline has elapsed.
    pub fn take_due(&self, now_ms: u64) -> Vec<TokenId> {
        let mut pending = self.pending.lock();
        let due: Vec<TokenId> = pending.values().filter(|r| r.ready_at_ms <= now_ms).map(|r| r.token_id).collect();
        for token_id in &due {
            pending.remove(token_id);
        }
        due
    }
}

#[cfg(test)]
#[path = "retry_store_tests.rs"]
mod tests;
