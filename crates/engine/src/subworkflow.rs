// SPDX-License-Identifier: MIT

//! Subworkflow protocol: parent-side dispatch request construction and
//! the cascade-cancel sweep. The actual cross-coordinator call goes
//! through [`flowctl_core::CoordinatorRegistry`] in
//! [`crate::coordinator::Coordinator`]; this module only builds the pure
//! pieces.

use flowctl_core::{Node, RunId, TokenId, Value};
use flowctl_store::RunStore;

/// What the parent sends a freshly-resolved child coordinator to kick
/// off `startSubworkflow`.
#[derive(Debug, Clone)]
pub struct SubworkflowDispatch {
    pub child_run_id: RunId,
    pub workflow_id: String,
    pub version: Option<String>,
    pub input: Value,
    pub root_run_id: RunId,
    pub parent_run_id: RunId,
    pub parent_token_id: TokenId,
    pub timeout_ms: Option<u64>,
}

/// Build the dispatch request for a node with a `subworkflow` spec, or
/// `None` if the node has none.
pub fn build_dispatch(
    node: &Node,
    token_id: TokenId,
    parent_run_id: RunId,
    root_run_id: RunId,
    ctx: &flowctl_core::Context,
) -> Option<SubworkflowDispatch> {
    let spec = node.subworkflow.as_ref()?;
    let input = flowctl_planner::apply_input_mapping(&spec.input_mapping, ctx);
    Some(SubworkflowDispatch {
        child_run_id: RunId::new(),
        workflow_id: spec.workflow_id.clone(),
        version: spec.version.clone(),
        input,
        root_run_id,
        parent_run_id,
        parent_token_id: token_id,
        timeout_ms: spec.timeout_ms,
    })
}

/// Subworkflows still running when the parent fails or is cancelled —
/// each must be told `cancel(reason)` and have its record marked
/// `cancelled`.
pub fn running_subworkflows(store: &RunStore) -> Vec<flowctl_store::SubworkflowRecord> {
    store.subworkflows.running()
}

#[cfg(test)]
#[path = "subworkflow_tests.rs"]
mod tests;
