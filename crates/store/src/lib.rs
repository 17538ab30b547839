// SPDX-License-Identifier: MIT

//! The transactional local state of a single run: tokens, context,
//! branch tables, fan-in records, subworkflow records, and run status.
//! The coordinator exclusively owns one [`RunStore`] per `runId`.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod branch_table_store;
pub mod context_store;
pub mod error;
pub mod fan_in_store;
pub mod retry_store;
pub mod status_store;
pub mod subworkflow_store;
pub mod token_store;

pub use branch_table_store::BranchTableStore;
pub use context_store::ContextStore;
pub use error::StoreError;
pub use fan_in_store::FanInStore;
pub use flowctl_core::RunStatus;
pub use retry_store::{PendingRetry, RetryStore};
pub use status_store::StatusStore;
pub use subworkflow_store::{SubworkflowRecord, SubworkflowStatus, SubworkflowStore};
pub use token_store::TokenStore;

use flowctl_core::Value;

/// The full set of stores for one run, bundled for convenient ownership
/// by the coordinator.
pub struct RunStore {
    pub tokens: TokenStore,
    pub context: ContextStore,
    pub branch_tables: BranchTableStore,
    pub fan_ins: FanInStore,
    pub subworkflows: SubworkflowStore,
    pub retries: RetryStore,
    pub status: StatusStore,
}

impl RunStore {
    pub fn new(input: Value) -> Self {
        Self {
            tokens: TokenStore::new(),
            context: ContextStore::new(input),
            branch_tables: BranchTableStore::new(),
            fan_ins: FanInStore::new(),
            subworkflows: SubworkflowStore::new(),
            retries: RetryStore::new(),
            status: StatusStore::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_run_store_starts_running_with_no_tokens() {
        let store = RunStore::new(json!({"x": 1}));
        assert_eq!(store.status.get(), RunStatus::Running);
        assert!(store.tokens.is_empty());
    }
}
