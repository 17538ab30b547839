// SPDX-License-Identifier: MIT

//! Fan-out/fan-in: the one code path allowed to touch the fan-in
//! uniqueness constraint. All synchronization decisions the planner
//! emits funnel through here so the race protection is never bypassed.

use crate::applier;
use crate::error::ApplyError;
use flowctl_core::{Decision, Definitions, Node, NodeId, RunId, TokenId, TokenStatus, TransitionId};
use flowctl_store::RunStore;
use tracing::info;

/// `handleBranchOutput`: stage a fan-out branch's task output in its
/// branch table and apply only the `state.*` half of its output mapping
/// to shared context. `output.*` entries stay parked in the branch
/// table until fan-in merges them.
pub fn handle_branch_output(
    store: &RunStore,
    run_id: RunId,
    node: &Node,
    token_id: TokenId,
    output: &flowctl_core::Value,
    now_ms: u64,
) -> Result<(), ApplyError> {
    let Some(task) = &node.task else {
        return Ok(());
    };
    applier::apply(store, run_id, &Decision::InitBranchTable { token_id, schema: task.output_schema.clone() }, now_ms)?;
    applier::apply(store, run_id, &Decision::ApplyBranchOutput { token_id, output: output.clone() }, now_ms)?;

    let state_mapping: std::collections::HashMap<String, String> = node
        .output_mapping
        .iter()
        .filter(|(target, _)| target.starts_with("state."))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if !state_mapping.is_empty() {
        applier::apply(
            store,
            run_id,
            &Decision::ApplyOutputMapping { mapping: state_mapping, data: output.clone() },
            now_ms,
        )?;
    }
    Ok(())
}

/// A fan-in that actually activated during [`process_synchronization`],
/// carrying what [`flowctl_core::WorkflowEvent::FanInActivated`] needs.
pub struct FanInActivation {
    pub continuation_token_id: TokenId,
    pub node_id: NodeId,
    pub fan_in_path: String,
    pub sibling_count: usize,
}

/// `processSynchronization`: run each created token's sync decision
/// through the applier, intercepting `ActivateFanIn` into
/// [`activate_fan_in`] instead of the generic applier. Returns the
/// fan-ins that activated, in the order they were processed.
pub fn process_synchronization(
    store: &RunStore,
    defs: &dyn Definitions,
    run_id: RunId,
    sync_decisions: Vec<(TransitionId, Decision)>,
    now_ms: u64,
) -> Result<Vec<FanInActivation>, ApplyError> {
    let mut activations = Vec::new();
    for (transition_id, decision) in sync_decisions {
        match decision {
            Decision::ActivateFanIn { node_id, fan_in_path, triggering_token_id, .. } => {
                if let Some((new_token, sibling_count)) =
                    activate_fan_in(store, defs, run_id, &node_id, &fan_in_path, &transition_id, triggering_token_id, now_ms)?
                {
                    activations.push(FanInActivation {
                        continuation_token_id: new_token,
                        node_id: node_id.clone(),
                        fan_in_path,
                        sibling_count,
                    });
                }
            }
            other => applier::apply(store, run_id, &other, now_ms)?,
        }
    }
    Ok(activations)
}

/// `activateFanIn`: race-protected fan-in activation. Returns `Ok(None)`
/// if this call lost the race or no completed sibling exists yet to
/// merge from.
#[allow(clippy::too_many_arguments)]
pub fn activate_fan_in(
    store: &RunStore,
    defs: &dyn Definitions,
    run_id: RunId,
    node_id: &NodeId,
    fan_in_path: &str,
    transition_id: &TransitionId,
    triggering_token_id: TokenId,
    now_ms: u64,
) -> Result<Option<(TokenId, usize)>, ApplyError> {
    if !store.fan_ins.try_activate(fan_in_path, triggering_token_id, transition_id, now_ms) {
        info!(fan_in_path, "lost fan-in race; completing triggering token only");
        applier::apply(store, run_id, &Decision::CompleteToken { token_id: triggering_token_id }, now_ms)?;
        return Ok(None);
    }

    let triggering = store.tokens.get(triggering_token_id)?;
    let Some(group) = &triggering.sibling_group else {
        // No sibling group: nothing to merge, just complete.
        applier::apply(store, run_id, &Decision::CompleteToken { token_id: triggering_token_id }, now_ms)?;
        return Ok(None);
    };
    let siblings = store.tokens.siblings_in_group(group);

    let completed: Vec<TokenId> = siblings.iter().filter(|t| t.status == TokenStatus::Completed).map(|t| t.id).collect();
    let waiting: Vec<TokenId> =
        siblings.iter().filter(|t| t.status == TokenStatus::WaitingForSiblings).map(|t| t.id).collect();
    let in_flight: Vec<TokenId> = siblings.iter().filter(|t| t.status.is_in_flight()).map(|t| t.id).collect();

    if completed.is_empty() {
        return Ok(None);
    }

    let transition = defs.transitions().iter().find(|t| &t.id == transition_id);
    if let Some(sync) = transition.and_then(|t| t.synchronization.as_ref()) {
        if let Some(merge) = &sync.merge {
            let merge = flowctl_core::MergeSpec {
                source: merge.source.clone(),
                target: merge.target.clone(),
                strategy: to_decision_merge_strategy(merge.strategy),
            };
            applier::apply(store, run_id, &Decision::MergeBranches { token_ids: completed.clone(), merge }, now_ms)?;
            applier::apply(store, run_id, &Decision::DropBranchTables { token_ids: completed.clone() }, now_ms)?;
        }
    }

    if !waiting.is_empty() {
        applier::apply(store, run_id, &Decision::CompleteTokens { token_ids: waiting }, now_ms)?;
    }
    if !in_flight.is_empty() {
        applier::apply(
            store,
            run_id,
            &Decision::CancelTokens { token_ids: in_flight, reason: "fan-in activated before completion".to_string() },
            now_ms,
        )?;
    }
    applier::apply(store, run_id, &Decision::CompleteToken { token_id: triggering_token_id }, now_ms)?;

    let Some(first_completed_id) = completed.first() else { return Ok(None) };
    let first_completed = store.tokens.get(*first_completed_id)?;
    // Per the continuation contract, iterationCounts come from the
    // fan-out origin (the sibling's parent), not the sibling itself.
    let origin_iteration_counts = match first_completed.parent_token_id {
        Some(parent_id) => store.tokens.try_get(parent_id).map(|t| t.iteration_counts).unwrap_or_default(),
        None => first_completed.iteration_counts.clone(),
    };
    let params = flowctl_core::CreateTokenParams {
        node_id: node_id.clone(),
        parent_token_id: first_completed.parent_token_id,
        path_id: first_completed.path_id.clone(),
        sibling_group: None,
        branch_index: 0,
        branch_total: 1,
        iteration_counts: origin_iteration_counts,
    };
    let new_token_id = applier::create_token(store, run_id, &params, now_ms)?;
    Ok(Some((new_token_id, completed.len())))
}

/// [`flowctl_core::DefMergeStrategy`] and [`flowctl_core::MergeStrategy`]
/// are the same shape declared in two different modules (definitions vs.
/// decisions); bridge them rather than let one leak into the other's API.
fn to_decision_merge_strategy(def: flowctl_core::DefMergeStrategy) -> flowctl_core::MergeStrategy {
    match def {
        flowctl_core::DefMergeStrategy::Append => flowctl_core::MergeStrategy::Append,
        flowctl_core::DefMergeStrategy::Collect => flowctl_core::MergeStrategy::Collect,
        flowctl_core::DefMergeStrategy::MergeObject => flowctl_core::MergeStrategy::MergeObject,
        flowctl_core::DefMergeStrategy::KeyedByBranch => flowctl_core::MergeStrategy::KeyedByBranch,
        flowctl_core::DefMergeStrategy::LastWins => flowctl_core::MergeStrategy::LastWins,
    }
}

#[cfg(test)]
#[path = "fan_engine_tests.rs"]
mod tests;
