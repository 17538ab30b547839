// SPDX-License-Identifier: MIT

//! Events emitted by the engine via the [`crate::traits::Emitter`]
//! collaborator. Distinct from [`crate::decision::Decision`]: decisions
//! are internal instructions, events are the externally-observable
//! record of what happened to a run.

use crate::ids::{NodeId, RunId, TokenId};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A workflow-run lifecycle event, tagged by `type` for wire compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkflowEvent {
    #[serde(rename = "run_started")]
    RunStarted { run_id: RunId, input: Value },

    #[serde(rename = "token_dispatched")]
    TokenDispatched { run_id: RunId, token_id: TokenId, node_id: NodeId },

    #[serde(rename = "token_completed")]
    TokenCompleted { run_id: RunId, token_id: TokenId, node_id: NodeId },

    #[serde(rename = "token_failed")]
    TokenFailed { run_id: RunId, token_id: TokenId, node_id: NodeId, error: String },

    #[serde(rename = "fan_in_activated")]
    FanInActivated { run_id: RunId, node_id: NodeId, fan_in_path: String, sibling_count: usize },

    #[serde(rename = "subworkflow_started")]
    SubworkflowStarted { parent_run_id: RunId, parent_token_id: TokenId, child_run_id: RunId },

    #[serde(rename = "subworkflow_resolved")]
    SubworkflowResolved { parent_run_id: RunId, parent_token_id: TokenId, child_run_id: RunId },

    #[serde(rename = "run_completed")]
    RunCompleted { run_id: RunId, output: Value },

    #[serde(rename = "run_failed")]
    RunFailed { run_id: RunId, reason: String },

    #[serde(rename = "run_cancelled")]
    RunCancelled { run_id: RunId, reason: String },
}

impl WorkflowEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            WorkflowEvent::RunStarted { run_id, .. }
            | WorkflowEvent::TokenDispatched { run_id, .. }
            | WorkflowEvent::TokenCompleted { run_id, .. }
            | WorkflowEvent::TokenFailed { run_id, .. }
            | WorkflowEvent::FanInActivated { run_id, .. }
            | WorkflowEvent::RunCompleted { run_id, .. }
            | WorkflowEvent::RunFailed { run_id, .. }
            | WorkflowEvent::RunCancelled { run_id, .. } => *run_id,
            WorkflowEvent::SubworkflowStarted { parent_run_id, .. }
            | WorkflowEvent::SubworkflowResolved { parent_run_id, .. } => *parent_run_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::RunStarted { .. } => "run_started",
            WorkflowEvent::TokenDispatched { .. } => "token_dispatched",
            WorkflowEvent::TokenCompleted { .. } => "token_completed",
            WorkflowEvent::TokenFailed { .. } => "token_failed",
            WorkflowEvent::FanInActivated { .. } => "fan_in_activated",
            WorkflowEvent::SubworkflowStarted { .. } => "subworkflow_started",
            WorkflowEvent::SubworkflowResolved { .. } => "subworkflow_resolved",
            WorkflowEvent::RunCompleted { .. } => "run_completed",
            WorkflowEvent::RunFailed { .. } => "run_failed",
            WorkflowEvent::RunCancelled { .. } => "run_cancelled",
        }
    }
}

/// A fine-grained planning/dispatch trace, e.g.
/// `decision.routing.evaluate_transition` or `dispatch.sync.fan_in_race_lost`.
/// Disabled per-run via `enableTraceEvents=false`; never part of the
/// public [`WorkflowEvent`] stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub run_id: RunId,
    pub name: String,
    pub at_ms: u64,
    pub fields: Vec<(String, String)>,
}

impl TraceEvent {
    pub fn new(run_id: RunId, name: impl Into<String>, at_ms: u64) -> Self {
        Self { run_id, name: name.into(), at_ms, fields: Vec::new() }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl std::fmt::Display) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
