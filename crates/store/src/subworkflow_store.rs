// SPDX-License-Identifier: MIT

//! `subworkflows(runId, parentTokenId, subworkflowRunId, status,
//! timeoutMs?)` — the parent-side record of a dispatched child run.

use flowctl_core::{RunId, TokenId};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubworkflowStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SubworkflowStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubworkflowStatus::Running)
    }
}

#[derive(Debug, Clone)]
pub struct SubworkflowRecord {
    pub parent_token_id: TokenId,
    pub subworkflow_run_id: RunId,
    pub status: SubworkflowStatus,
    pub timeout_ms: Option<u64>,
    pub started_at_ms: u64,
}

#[derive(Default)]
pub struct SubworkflowStore {
    records: Mutex<HashMap<TokenId, SubworkflowRecord>>,
}

impl SubworkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, parent_token_id: TokenId, subworkflow_run_id: RunId, timeout_ms: Option<u64>, now_ms: u64) {
        self.records.lock().insert(
            parent_token_id,
            SubworkflowRecord {
                parent_token_id,
                subworkflow_run_id,
                status: SubworkflowStatus::Running,
                timeout_ms,
                started_at_ms: now_ms,
            },
        );
    }

    pub fn get(&self, parent_token_id: TokenId) -> Option<SubworkflowRecord> {
        self.records.lock().get(&parent_token_id).cloned()
    }

    /// Sets status unless already terminal; returns `true` if applied.
    pub fn mark_status(&self, parent_token_id: TokenId, status: SubworkflowStatus) -> bool {
        let mut guard = self.records.lock();
        match guard.get_mut(&parent_token_id) {
            Some(record) if !record.status.is_terminal() => {
                record.status = status;
                true
            }
            _ => false,
        }
    }

    pub fn running(&self) -> Vec<SubworkflowRecord> {
        self.records.lock().values().filter(|r| !r.status.is_terminal()).cloned().collect()
    }
}

#[cfg(test)]
#[path = "subworkflow_store_tests.rs"]
mod tests;
