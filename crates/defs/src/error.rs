// SPDX-License-Identifier: MIT

use flowctl_core::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DefsError {
    #[error("failed to read definition file {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("failed to parse TOML definition {path}: {source}")]
    Toml { path: String, #[source] source: toml::de::Error },

    #[error("transition {transition_id} references unknown node {node_id}")]
    UnknownNode { transition_id: String, node_id: NodeId },

    #[error("initial node {0} is not defined")]
    UnknownInitialNode(NodeId),

    #[error("transition {transition_id} has non-positive spawnCount {spawn_count}; reject at load time")]
    InvalidSpawnCount { transition_id: String, spawn_count: u32 },

    #[error("workflow {workflow_id} (version {version:?}) not found in catalog")]
    WorkflowNotFound { workflow_id: String, version: Option<String> },

    #[error("duplicate workflow id {workflow_id} (version {version:?}) in catalog")]
    DuplicateWorkflow { workflow_id: String, version: Option<String> },
}
