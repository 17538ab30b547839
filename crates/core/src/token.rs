// SPDX-License-Identifier: MIT

//! The token state machine.

use crate::ids::{NodeId, RunId, SiblingGroup, TokenId, TransitionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A token's lifecycle status. Monotonic: terminal statuses never transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Pending,
    Dispatched,
    Executing,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
    WaitingForSiblings,
    WaitingForSubworkflow,
}

crate::simple_display! {
    TokenStatus {
        Pending => "pending",
        Dispatched => "dispatched",
        Executing => "executing",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
        TimedOut => "timed_out",
        WaitingForSiblings => "waiting_for_siblings",
        WaitingForSubworkflow => "waiting_for_subworkflow",
    }
}

impl TokenStatus {
    /// Terminal statuses are absorbing: `{completed, failed, cancelled, timed_out}`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut)
    }

    /// Active (non-terminal, non-waiting) dispatch states.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Pending | Self::Dispatched | Self::Executing)
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::WaitingForSiblings | Self::WaitingForSubworkflow)
    }
}

/// A state-carrying handle for one in-flight execution point in the
/// workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub run_id: RunId,
    pub node_id: NodeId,
    pub status: TokenStatus,
    /// Lineage; a weak reference for traversal, not ownership.
    pub parent_token_id: Option<TokenId>,
    /// Dotted lineage path for tracing, e.g. `"root.fan.0"`.
    pub path_id: String,
    /// Shared by all tokens spawned by one fan-out transition and their
    /// sync continuation. `None` outside a fan-out.
    pub sibling_group: Option<SiblingGroup>,
    pub branch_index: u32,
    pub branch_total: u32,
    /// Per-transition loop-count budget tracking.
    pub iteration_counts: HashMap<TransitionId, u32>,
    /// Set when the token reaches a sync point; cleared otherwise.
    pub arrived_at_ms: Option<u64>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Token {
    /// Construct the root token for a fresh run.
    pub fn root(run_id: RunId, node_id: NodeId, now_ms: u64) -> Self {
        Self {
            id: TokenId::new(),
            run_id,
            node_id,
            status: TokenStatus::Pending,
            parent_token_id: None,
            path_id: "root".to_string(),
            sibling_group: None,
            branch_index: 0,
            branch_total: 1,
            iteration_counts: HashMap::new(),
            arrived_at_ms: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    /// Attempt a status transition. Terminal statuses are absorbing: once
    /// set, any further transition is rejected (the caller should treat
    /// this as a logged no-op, not an error).
    pub fn transition(&mut self, new_status: TokenStatus, now_ms: u64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = new_status;
        self.updated_at_ms = now_ms;
        true
    }

    pub fn is_fan_out_branch(&self) -> bool {
        self.sibling_group.is_some()
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
