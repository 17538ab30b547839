// SPDX-License-Identifier: MIT

//! `fan_ins(runId, fanInPath UNIQUE, activatedByTokenId, transitionId,
//! createdAt)` — the single inter-token synchronization primitive. A
//! fan-in record is created on first arrival and activated at most
//! once; every subsequent `try_activate` for the same path loses.

use flowctl_core::{TokenId, TransitionId};
use parking_lot::Mutex;
use std::collections::HashMap;

struct FanInRecord {
    activated_by: Option<TokenId>,
    transition_id: TransitionId,
    created_at_ms: u64,
}

#[derive(Default)]
pub struct FanInStore {
    records: Mutex<HashMap<String, FanInRecord>>,
}

impl FanInStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the record if absent, then attempt to claim activation
    /// under the path's uniqueness constraint. Returns `true` iff this
    /// call won the race.
    pub fn try_activate(&self, fan_in_path: &str, token_id: TokenId, transition_id: &TransitionId, now_ms: u64) -> bool {
        let mut guard = self.records.lock();
        let record = guard.entry(fan_in_path.to_string()).or_insert_with(|| FanInRecord {
            activated_by: None,
            transition_id: transition_id.clone(),
            created_at_ms: now_ms,
        });
        if record.activated_by.is_some() {
            false
        } else {
            record.activated_by = Some(token_id);
            true
        }
    }

    pub fn activated_by(&self, fan_in_path: &str) -> Option<TokenId> {
        self.records.lock().get(fan_in_path).and_then(|r| r.activated_by)
    }
}

#[cfg(test)]
#[path = "fan_in_store_tests.rs"]
mod tests;
