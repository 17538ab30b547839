// SPDX-License-Identifier: MIT

//! `branch_tables`: per-fan-out-token output staging, merged into
//! context at fan-in and then dropped.

use flowctl_core::{TokenId, Value};
use parking_lot::Mutex;
use std::collections::HashMap;

struct BranchEntry {
    branch_index: u32,
    output: Value,
}

#[derive(Default)]
pub struct BranchTableStore {
    entries: Mutex<HashMap<TokenId, BranchEntry>>,
}

impl BranchTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily creates the table on first write; `schema` is accepted
    /// for parity with the decision contract but not enforced here.
    pub fn init(&self, token_id: TokenId, branch_index: u32, _schema: Option<&Value>) {
        self.entries.lock().entry(token_id).or_insert_with(|| BranchEntry { branch_index, output: Value::Null });
    }

    pub fn apply_output(&self, token_id: TokenId, branch_index: u32, output: Value) {
        self.entries.lock().insert(token_id, BranchEntry { branch_index, output });
    }

    /// Branch outputs for the given tokens, sorted by `branchIndex`.
    pub fn outputs_sorted(&self, token_ids: &[TokenId]) -> Vec<(u32, Value)> {
        let guard = self.entries.lock();
        let mut out: Vec<(u32, Value)> = token_ids
            .iter()
            .filter_map(|id| guard.get(id).map(|e| (e.branch_index, e.output.clone())))
            .collect();
        out.sort_by_key(|(idx, _)| *idx);
        out
    }

    pub fn drop_many(&self, token_ids: &[TokenId]) {
        let mut guard = self.entries.lock();
        for id in token_ids {
            guard.remove(id);
        }
    }
}

#[cfg(test)]
#[path = "branch_table_store_tests.rs"]
mod tests;
