// SPDX-License-Identifier: MIT

//! The sole mutator of a run's store. Every [`Decision`] the planner
//! produces passes through [`apply`] or [`apply_batch`] — nothing else
//! writes to a [`RunStore`]. [`apply_batch`] is for decisions the
//! planner emits together (e.g. routing's burst of `CreateToken`s);
//! [`apply`] is the single-decision case. Per-decision failures are
//! collected, not fatal: the batch keeps going so one broken decision
//! cannot wedge the rest.

use crate::error::ApplyError;
use flowctl_core::{Decision, MergeStrategy, Namespace, RunId, Token, TokenId, TokenStatus};
use flowctl_store::RunStore;
use std::collections::HashMap;
use tracing::{trace, warn};

#[derive(Debug, Default)]
pub struct ApplyResult {
    pub applied: usize,
    pub errors: Vec<ApplyError>,
    /// Ids of tokens created by this batch, in decision order — the only
    /// way a caller can recover what a `CreateToken` decision produced
    /// without dropping down to [`create_token`] itself.
    pub created_token_ids: Vec<TokenId>,
}

impl ApplyResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Consecutive `CREATE_TOKEN`/`UPDATE_TOKEN_STATUS` decisions coalesce
/// into a batch for logging and store access; anything else flushes the
/// pending batch and applies in place. Relative order is preserved —
/// this is bookkeeping for trace spans, not a reordering pass.
enum Batch<'a> {
    CreateTokens(Vec<&'a flowctl_core::CreateTokenParams>),
    UpdateStatuses(Vec<(TokenId, TokenStatus)>),
    Single(&'a Decision),
}

fn batch_decisions(decisions: &[Decision]) -> Vec<Batch<'_>> {
    let mut batches = Vec::new();
    for decision in decisions {
        match decision {
            Decision::CreateToken(params) => match batches.last_mut() {
                Some(Batch::CreateTokens(group)) => group.push(params),
                _ => batches.push(Batch::CreateTokens(vec![params])),
            },
            Decision::UpdateTokenStatus { token_id, status } => match batches.last_mut() {
                Some(Batch::UpdateStatuses(group)) => group.push((*token_id, *status)),
                _ => batches.push(Batch::UpdateStatuses(vec![(*token_id, *status)])),
            },
            other => batches.push(Batch::Single(other)),
        }
    }
    batches
}

pub fn apply_batch(store: &RunStore, run_id: RunId, decisions: &[Decision], now_ms: u64) -> ApplyResult {
    let mut result = ApplyResult::default();
    for batch in batch_decisions(decisions) {
        match batch {
            Batch::CreateTokens(group) => {
                trace!(count = group.len(), "applying batched create_token");
                for params in group {
                    apply_one(store, run_id, &Decision::CreateToken(params.clone()), now_ms, &mut result);
                }
            }
            Batch::UpdateStatuses(group) => {
                trace!(count = group.len(), "applying batched update_token_status");
                for (token_id, status) in group {
                    apply_one(store, run_id, &Decision::UpdateTokenStatus { token_id, status }, now_ms, &mut result);
                }
            }
            Batch::Single(decision) => apply_one(store, run_id, decision, now_ms, &mut result),
        }
    }
    result
}

pub fn apply(store: &RunStore, run_id: RunId, decision: &Decision, now_ms: u64) -> Result<(), ApplyError> {
    let mut result = ApplyResult::default();
    apply_one(store, run_id, decision, now_ms, &mut result);
    result.errors.into_iter().next().map_or(Ok(()), Err)
}

fn apply_one(store: &RunStore, run_id: RunId, decision: &Decision, now_ms: u64, result: &mut ApplyResult) {
    if let Decision::CreateToken(params) = decision {
        match create_token(store, run_id, params, now_ms) {
            Ok(id) => {
                result.created_token_ids.push(id);
                result.applied += 1;
            }
            Err(err) => result.errors.push(err),
        }
        return;
    }
    if let Err(err) = apply_inner(store, run_id, decision, now_ms) {
        result.errors.push(err);
    } else {
        result.applied += 1;
    }
}

/// Insert a token from [`flowctl_core::CreateTokenParams`] and return its
/// freshly generated id — used directly by callers (the fan engine's
/// continuation step) that need the id, bypassing the generic
/// [`Decision`] dispatch below.
pub fn create_token(
    store: &RunStore,
    run_id: RunId,
    params: &flowctl_core::CreateTokenParams,
    now_ms: u64,
) -> Result<TokenId, ApplyError> {
    let token = Token {
        id: TokenId::new(),
        run_id,
        node_id: params.node_id.clone(),
        status: TokenStatus::Pending,
        parent_token_id: params.parent_token_id,
        path_id: params.path_id.clone(),
        sibling_group: params.sibling_group.clone(),
        branch_index: params.branch_index,
        branch_total: params.branch_total,
        iteration_counts: params.iteration_counts.clone(),
        arrived_at_ms: None,
        created_at_ms: now_ms,
        updated_at_ms: now_ms,
    };
    let id = token.id;
    store.tokens.insert(token)?;
    Ok(id)
}

fn apply_inner(store: &RunStore, run_id: RunId, decision: &Decision, now_ms: u64) -> Result<(), ApplyError> {
    match decision {
        Decision::CreateToken(params) => {
            create_token(store, run_id, params, now_ms)?;
            Ok(())
        }
        Decision::UpdateTokenStatus { token_id, status } => {
            store.tokens.update_status(*token_id, *status, now_ms)?;
            Ok(())
        }
        Decision::MarkWaiting { token_id, arrived_at_ms, .. } => {
            store.tokens.mark_arrived(*token_id, *arrived_at_ms)?;
            store.tokens.update_status(*token_id, TokenStatus::WaitingForSiblings, now_ms)?;
            Ok(())
        }
        Decision::MarkForDispatch { token_id } => {
            store.tokens.update_status(*token_id, TokenStatus::Dispatched, now_ms)?;
            Ok(())
        }
        Decision::SetContext { path, value } => {
            store.context.set_full_path(path, value.clone());
            Ok(())
        }
        Decision::ApplyOutputMapping { mapping, data } => {
            apply_output_mapping(store, mapping, data);
            Ok(())
        }
        Decision::InitBranchTable { token_id, schema } => {
            let token = store.tokens.get(*token_id)?;
            store.branch_tables.init(*token_id, token.branch_index, schema.as_ref());
            Ok(())
        }
        Decision::ApplyBranchOutput { token_id, output } => {
            let token = store.tokens.get(*token_id)?;
            store.branch_tables.apply_output(*token_id, token.branch_index, output.clone());
            Ok(())
        }
        Decision::MergeBranches { token_ids, merge } => {
            merge_branches(store, token_ids, merge);
            Ok(())
        }
        Decision::DropBranchTables { token_ids } => {
            store.branch_tables.drop_many(token_ids);
            Ok(())
        }
        Decision::ActivateFanIn { .. } => {
            warn!("ActivateFanIn reached the generic applier; the fan engine should have intercepted it");
            Ok(())
        }
        Decision::CompleteToken { token_id } => {
            store.tokens.update_status(*token_id, TokenStatus::Completed, now_ms)?;
            Ok(())
        }
        Decision::CompleteTokens { token_ids } => {
            for id in token_ids {
                store.tokens.update_status(*id, TokenStatus::Completed, now_ms)?;
            }
            Ok(())
        }
        Decision::CancelTokens { token_ids, .. } => {
            for id in token_ids {
                store.tokens.update_status(*id, TokenStatus::Cancelled, now_ms)?;
            }
            Ok(())
        }
        Decision::InitializeWorkflow { input } => {
            store.context.set(Namespace::Input, "", input.clone());
            store.status.transition(flowctl_store::RunStatus::Running);
            Ok(())
        }
        Decision::CompleteWorkflow { output } => {
            store.context.set(Namespace::Output, "", output.clone());
            store.status.transition(flowctl_store::RunStatus::Completed);
            Ok(())
        }
        Decision::FailWorkflow { reason } => {
            store.context.set(Namespace::Output, "error", serde_json::json!(reason));
            if store.status.transition(flowctl_store::RunStatus::Failed) {
                for token in store.tokens.active_tokens() {
                    store.tokens.update_status(token.id, TokenStatus::Cancelled, now_ms)?;
                }
            }
            Ok(())
        }
        Decision::MarkWaitingForSubworkflow { token_id, subworkflow_run_id, timeout_ms } => {
            store.tokens.update_status(*token_id, TokenStatus::WaitingForSubworkflow, now_ms)?;
            store.subworkflows.register(*token_id, *subworkflow_run_id, *timeout_ms, now_ms);
            Ok(())
        }
        Decision::ResumeFromSubworkflow { token_id, output } => {
            store.subworkflows.mark_status(*token_id, flowctl_store::SubworkflowStatus::Completed);
            store.context.set_full_path(&format!("state._subworkflow.{token_id}.output"), output.clone());
            store.tokens.update_status(*token_id, TokenStatus::Completed, now_ms)?;
            Ok(())
        }
        Decision::FailFromSubworkflow { token_id, error } => {
            store.subworkflows.mark_status(*token_id, flowctl_store::SubworkflowStatus::Failed);
            store.context.set_full_path(&format!("state._subworkflow.{token_id}.error"), serde_json::json!(error));
            store.tokens.update_status(*token_id, TokenStatus::Failed, now_ms)?;
            Ok(())
        }
        Decision::TimeoutSubworkflow { token_id, .. } => {
            store.subworkflows.mark_status(*token_id, flowctl_store::SubworkflowStatus::Cancelled);
            store.tokens.update_status(*token_id, TokenStatus::TimedOut, now_ms)?;
            Ok(())
        }
    }
}

fn apply_output_mapping(store: &RunStore, mapping: &HashMap<String, String>, data: &flowctl_core::Value) {
    for (target, source_path) in mapping {
        if let Some(value) = flowctl_core::value::get_path(data, source_path) {
            store.context.set_full_path(target, value.clone());
        }
    }
}

/// Strips the documented `"_branch.output."` namespace prefix off a
/// merge source, since branch tables store each branch's raw task
/// output unprefixed. A source with no such prefix is used as-is.
fn branch_output_path(source: &str) -> &str {
    source.strip_prefix("_branch.output.").unwrap_or(source)
}

fn merge_branches(store: &RunStore, token_ids: &[TokenId], merge: &flowctl_core::MergeSpec) {
    let outputs = store.branch_tables.outputs_sorted(token_ids);
    let source = branch_output_path(&merge.source);
    let merged = match merge.strategy {
        MergeStrategy::Append | MergeStrategy::Collect => {
            let items: Vec<flowctl_core::Value> =
                outputs.iter().filter_map(|(_, v)| flowctl_core::value::get_path(v, source).cloned()).collect();
            serde_json::Value::Array(items)
        }
        MergeStrategy::MergeObject => {
            let mut acc = serde_json::Map::new();
            for (_, v) in &outputs {
                if let Some(serde_json::Value::Object(obj)) = flowctl_core::value::get_path(v, source) {
                    acc.extend(obj.clone());
                }
            }
            serde_json::Value::Object(acc)
        }
        MergeStrategy::KeyedByBranch => {
            let mut acc = serde_json::Map::new();
            for (idx, v) in &outputs {
                let value = flowctl_core::value::get_path(v, source).cloned().unwrap_or(serde_json::Value::Null);
                acc.insert(idx.to_string(), value);
            }
            serde_json::Value::Object(acc)
        }
        MergeStrategy::LastWins => {
            outputs.last().and_then(|(_, v)| flowctl_core::value::get_path(v, source).cloned()).unwrap_or(serde_json::Value::Null)
        }
    };
    store.context.set_full_path(&merge.target, merged);
}

#[cfg(test)]
#[path = "applier_tests.rs"]
mod tests;
