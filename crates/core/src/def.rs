// SPDX-License-Identifier: MIT

//! Static workflow definition types: nodes, transitions, and the small
//! per-transition config blocks (`foreach`, `synchronization`,
//! `loopConfig`). These are pure data — parsing and validation live in
//! `flowctl-defs`; the planner and engine only ever read through the
//! [`crate::traits::Definitions`] collaborator.

use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How many sibling completions a sync point requires before it activates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    Any,
    All,
    #[serde(rename = "m_of_n")]
    MOfN(u32),
}

/// What to do when a sync point's `timeoutMs` elapses before it is met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnTimeout {
    Fail,
    ProceedWithAvailable,
}

impl Default for OnTimeout {
    fn default() -> Self {
        OnTimeout::Fail
    }
}

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
    pub source: String,
    pub target: String,
    pub strategy: MergeStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSpec {
    pub strategy: SyncStrategy,
    pub sibling_group: crate::ids::SiblingGroup,
    pub merge: Option<MergeSpec>,
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub on_timeout: OnTimeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeachConfig {
    /// Dotted path, e.g. `"state.items"`, resolved against the context snapshot.
    pub collection: String,
    pub item_var: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    pub max_iterations: u32,
}

/// A node's task binding: which executor task to run and how context
/// feeds its input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDef {
    pub task_id: String,
    pub task_version: Option<String>,
    /// target dotted path (within `input`) => source expression `$.ns.path`.
    pub input_mapping: HashMap<String, String>,
    pub output_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubworkflowSpec {
    pub workflow_id: String,
    pub version: Option<String>,
    pub input_mapping: HashMap<String, String>,
    pub timeout_ms: Option<u64>,
}

/// A vertex in the workflow graph. Exactly one of `task`/`subworkflow` is
/// normally set; a node with neither is a pass-through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub task: Option<TaskDef>,
    pub subworkflow: Option<SubworkflowSpec>,
    /// target dotted full path (e.g. `"state.y"`) => source expression.
    pub output_mapping: HashMap<String, String>,
}

impl Node {
    pub fn is_pass_through(&self) -> bool {
        self.task.is_none() && self.subworkflow.is_none()
    }
}

/// A directed edge between nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub id: crate::ids::TransitionId,
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
    pub priority: i32,
    /// Condition expression; `None` or empty always matches.
    pub condition: Option<String>,
    pub spawn_count: Option<u32>,
    pub sibling_group: Option<crate::ids::SiblingGroup>,
    pub foreach: Option<ForeachConfig>,
    pub synchronization: Option<SyncSpec>,
    pub loop_config: Option<LoopConfig>,
}

impl Transition {
    pub fn is_fan_out_origin(&self) -> bool {
        self.sibling_group.is_some()
    }
}

/// The full static shape of one workflow: its nodes, transitions, entry
/// point, and top-level output mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDef {
    pub workflow_id: String,
    pub version: Option<String>,
    pub initial_node_id: NodeId,
    pub nodes: HashMap<NodeId, Node>,
    pub transitions: Vec<Transition>,
    /// target key in the final output object => source expression.
    pub output_mapping: HashMap<String, String>,
}

impl WorkflowDef {
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn transitions_from(&self, node_id: &NodeId) -> Vec<&Transition> {
        self.transitions.iter().filter(|t| &t.from_node_id == node_id).collect()
    }
}

#[cfg(test)]
#[path = "def_tests.rs"]
mod tests;
