// SPDX-License-Identifier: MIT

//! An in-memory [`ResourcesClient`]: stands in for the out-of-scope
//! resource catalog's `workflowRuns()` collection, recording the last
//! known status and final output per run.

use async_trait::async_trait;
use flowctl_core::{ResourcesClient, ResourcesError, RunId, RunStatus, Value};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub status: RunStatus,
    pub output: Option<Value>,
}

/// `parking_lot::Mutex`-guarded map, matching the rest of this workspace's
/// in-memory stores.
#[derive(Default)]
pub struct InMemoryResourcesClient {
    runs: parking_lot::Mutex<HashMap<RunId, RunRecord>>,
}

impl InMemoryResourcesClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, run_id: RunId) -> Option<RunRecord> {
        self.runs.lock().get(&run_id).cloned()
    }
}

#[async_trait]
impl ResourcesClient for InMemoryResourcesClient {
    async fn complete(&self, run_id: RunId, output: &Value) -> Result<(), ResourcesError> {
        self.runs.lock().insert(run_id, RunRecord { status: RunStatus::Completed, output: Some(output.clone()) });
        Ok(())
    }

    async fn update_status(&self, run_id: RunId, status: RunStatus) -> Result<(), ResourcesError> {
        self.runs
            .lock()
            .entry(run_id)
            .and_modify(|record| record.status = status)
            .or_insert(RunRecord { status, output: None });
        Ok(())
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod tests;
