// SPDX-License-Identifier: MIT

//! Run lifecycle: starting a run, failing it, and the alarm-driven
//! timeout sweep. These are store-and-defs-only helpers; the
//! [`crate::coordinator::Coordinator`] is what actually calls collaborators
//! (emitter, registry) around them.

use flowctl_core::{Decision, Definitions, RunId, SiblingGroup, TransitionId, Value};
use flowctl_store::RunStore;
use std::collections::HashMap;

/// `start`: the decisions to initialize a fresh run and create its root token.
pub fn start_decisions(defs: &dyn Definitions, input: Value) -> (Decision, flowctl_core::CreateTokenParams) {
    let init = Decision::InitializeWorkflow { input };
    let root_params = flowctl_core::CreateTokenParams {
        node_id: defs.initial_node_id().clone(),
        parent_token_id: None,
        path_id: "root".to_string(),
        sibling_group: None,
        branch_index: 0,
        branch_total: 1,
        iteration_counts: HashMap::new(),
    };
    (init, root_params)
}

/// **Alarm tick**: sweep waiting tokens grouped by sibling group, and for
/// each group find its sync transition and check whether it has timed out.
/// Returns per-group timeout decisions paired with the transition that
/// produced them (callers need the transition id for fan-in activation).
pub fn sweep_waiting_timeouts(
    store: &RunStore,
    defs: &dyn Definitions,
    run_id: RunId,
    now_ms: u64,
) -> Vec<(TransitionId, Decision)> {
    let waiting = store.tokens.waiting_tokens();
    let mut by_group: HashMap<SiblingGroup, Vec<flowctl_core::Token>> = HashMap::new();
    for token in waiting {
        if let Some(group) = token.sibling_group.clone() {
            by_group.entry(group).or_default().push(token);
        }
    }

    let mut out = Vec::new();
    for (group, mut tokens) in by_group {
        tokens.sort_by_key(|t| t.arrived_at_ms.unwrap_or(0));
        let Some(oldest) = tokens.first().and_then(|t| t.arrived_at_ms) else { continue };

        let transition = defs
            .transitions()
            .iter()
            .find(|t| t.synchronization.as_ref().is_some_and(|s| s.sibling_group == group));
        let Some(transition) = transition else { continue };
        let Some(sync) = &transition.synchronization else { continue };

        if flowctl_planner::has_timed_out(sync.timeout_ms, Some(oldest), now_ms) {
            let decisions =
                flowctl_planner::decide_on_timeout(&tokens, sync, &transition.to_node_id, run_id, &transition.id);
            out.extend(decisions.into_iter().map(|d| (transition.id.clone(), d)));
        }
    }
    out
}

/// Subworkflow records whose `timeoutMs` has elapsed, returned for the
/// coordinator to cancel the child and emit `TIMEOUT_SUBWORKFLOW`.
pub fn sweep_subworkflow_timeouts(store: &RunStore, now_ms: u64) -> Vec<flowctl_store::SubworkflowRecord> {
    store
        .subworkflows
        .running()
        .into_iter()
        .filter(|r| flowctl_planner::has_timed_out(r.timeout_ms, Some(r.started_at_ms), now_ms))
        .collect()
}

/// Tokens whose retry delay has elapsed, ready for the coordinator to
/// re-dispatch. Mirrors the other sweeps: the retry policy hook records a
/// deadline instead of blocking the actor with a sleep.
pub fn sweep_pending_retries(store: &RunStore, now_ms: u64) -> Vec<flowctl_core::TokenId> {
    store.retries.take_due(now_ms)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
