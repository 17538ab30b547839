// SPDX-License-Identifier: MIT

//! [`Decision`] — the atomic instruction the planner produces and the
//! applier is the sole executor of. Planning is pure; decisions are the
//! only channel through which the planner can cause a mutation.

use crate::ids::{NodeId, RunId, SiblingGroup, TokenId, TransitionId};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters for creating a token, shared by fan-out origins and
/// fan-in continuations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTokenParams {
    pub node_id: NodeId,
    pub parent_token_id: Option<TokenId>,
    pub path_id: String,
    pub sibling_group: Option<SiblingGroup>,
    pub branch_index: u32,
    pub branch_total: u32,
    pub iteration_counts: HashMap<TransitionId, u32>,
}

/// How branch outputs merge into workflow context at fan-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    Append,
    Collect,
    MergeObject,
    KeyedByBranch,
    LastWins,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSpec {
    /// Path within the branch output namespace, prefixed with
    /// `"_branch.output."`, e.g. `"_branch.output.v"` reads each
    /// branch's raw task output at `"v"`. The prefix is stripped before
    /// the path is resolved against the stored (unprefixed) output.
    pub source: String,
    /// Fully-qualified context target, e.g. `"state.vs"`.
    pub target: String,
    pub strategy: MergeStrategy,
}

/// An atomic instruction produced by the planner. The applier is the sole
/// executor; see the component design doc for the full per-decision
/// contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decision {
    CreateToken(CreateTokenParams),
    UpdateTokenStatus { token_id: TokenId, status: crate::token::TokenStatus },
    MarkWaiting { token_id: TokenId, arrived_at_ms: u64, timeout_ms: Option<u64> },
    MarkForDispatch { token_id: TokenId },
    SetContext { path: String, value: Value },
    ApplyOutputMapping { mapping: HashMap<String, String>, data: Value },
    InitBranchTable { token_id: TokenId, schema: Option<Value> },
    ApplyBranchOutput { token_id: TokenId, output: Value },
    MergeBranches { token_ids: Vec<TokenId>, merge: MergeSpec },
    DropBranchTables { token_ids: Vec<TokenId> },
    /// Emitted by the planner's synchronization rules. Intercepted by the
    /// fan engine (`processSynchronization`), never generically applied.
    ActivateFanIn {
        run_id: RunId,
        node_id: NodeId,
        fan_in_path: String,
        transition_id: TransitionId,
        triggering_token_id: TokenId,
    },
    CompleteToken { token_id: TokenId },
    CompleteTokens { token_ids: Vec<TokenId> },
    CancelTokens { token_ids: Vec<TokenId>, reason: String },
    InitializeWorkflow { input: Value },
    CompleteWorkflow { output: Value },
    FailWorkflow { reason: String },
    MarkWaitingForSubworkflow { token_id: TokenId, subworkflow_run_id: RunId, timeout_ms: Option<u64> },
    ResumeFromSubworkflow { token_id: TokenId, output: Value },
    FailFromSubworkflow { token_id: TokenId, error: String },
    TimeoutSubworkflow { token_id: TokenId, subworkflow_run_id: RunId },
}

impl Decision {
    /// Decision name for log spans and trace events.
    pub fn name(&self) -> &'static str {
        match self {
            Decision::CreateToken(_) => "create_token",
            Decision::UpdateTokenStatus { .. } => "update_token_status",
            Decision::MarkWaiting { .. } => "mark_waiting",
            Decision::MarkForDispatch { .. } => "mark_for_dispatch",
            Decision::SetContext { .. } => "set_context",
            Decision::ApplyOutputMapping { .. } => "apply_output_mapping",
            Decision::InitBranchTable { .. } => "init_branch_table",
            Decision::ApplyBranchOutput { .. } => "apply_branch_output",
            Decision::MergeBranches { .. } => "merge_branches",
            Decision::DropBranchTables { .. } => "drop_branch_tables",
            Decision::ActivateFanIn { .. } => "activate_fan_in",
            Decision::CompleteToken { .. } => "complete_token",
            Decision::CompleteTokens { .. } => "complete_tokens",
            Decision::CancelTokens { .. } => "cancel_tokens",
            Decision::InitializeWorkflow { .. } => "initialize_workflow",
            Decision::CompleteWorkflow { .. } => "complete_workflow",
            Decision::FailWorkflow { .. } => "fail_workflow",
            Decision::MarkWaitingForSubworkflow { .. } => "mark_waiting_for_subworkflow",
            Decision::ResumeFromSubworkflow { .. } => "resume_from_subworkflow",
            Decision::FailFromSubworkflow { .. } => "fail_from_subworkflow",
            Decision::TimeoutSubworkflow { .. } => "timeout_subworkflow",
        }
    }

    /// Token ids this decision directly reads or mutates — used to verify
    /// `extractAffectedTokenIds ∘ batchDecisions = extractAffectedTokenIds`
    /// (batching must not change which tokens a decision list touches).
    pub fn affected_token_ids(&self) -> Vec<TokenId> {
        match self {
            Decision::CreateToken(_) => vec![],
            Decision::UpdateTokenStatus { token_id, .. }
            | Decision::MarkWaiting { token_id, .. }
            | Decision::MarkForDispatch { token_id }
            | Decision::InitBranchTable { token_id, .. }
            | Decision::ApplyBranchOutput { token_id, .. }
            | Decision::CompleteToken { token_id }
            | Decision::MarkWaitingForSubworkflow { token_id, .. }
            | Decision::ResumeFromSubworkflow { token_id, .. }
            | Decision::FailFromSubworkflow { token_id, .. }
            | Decision::TimeoutSubworkflow { token_id, .. } => vec![*token_id],
            Decision::MergeBranches { token_ids, .. }
            | Decision::DropBranchTables { token_ids }
            | Decision::CompleteTokens { token_ids }
            | Decision::CancelTokens { token_ids, .. } => token_ids.clone(),
            Decision::ActivateFanIn { triggering_token_id, .. } => vec![*triggering_token_id],
            Decision::SetContext { .. }
            | Decision::ApplyOutputMapping { .. }
            | Decision::InitializeWorkflow { .. }
            | Decision::CompleteWorkflow { .. }
            | Decision::FailWorkflow { .. } => vec![],
        }
    }
}

#[cfg(test)]
#[path = "decision_tests.rs"]
mod tests;
