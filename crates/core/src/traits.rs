// SPDX-License-Identifier: MIT

//! Collaborator traits: the external dependencies the engine is injected
//! with rather than implementing itself. Keeping these in `flowctl-core`
//! lets `flowctl-planner` and `flowctl-engine` depend on the interfaces
//! without pulling in any concrete adapter.

use crate::context::Context;
use crate::def::{Node, Transition, WorkflowDef};
use crate::ids::{NodeId, RunId, TokenId};
use crate::status::RunStatus;
use crate::value::Value;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DefinitionsError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
}

/// Read-only access to one run's static workflow shape: nodes and
/// transitions the planner routes against. One instance is scoped to a
/// single `(workflowId, version)` — the coordinator resolves which
/// `Definitions` a run uses at `start`/`startSubworkflow` time.
/// Implemented by `flowctl-defs`.
pub trait Definitions: Send + Sync {
    fn workflow_def(&self) -> &WorkflowDef;

    fn get_node(&self, id: &NodeId) -> Result<&Node, DefinitionsError> {
        self.workflow_def().node(id).ok_or_else(|| DefinitionsError::NodeNotFound(id.clone()))
    }

    fn transitions(&self) -> &[Transition] {
        &self.workflow_def().transitions
    }

    fn transitions_from(&self, node_id: &NodeId) -> Vec<&Transition> {
        self.workflow_def().transitions_from(node_id)
    }

    fn initial_node_id(&self) -> &NodeId {
        &self.workflow_def().initial_node_id
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task execution failed: {0}")]
    Failed(String),
    #[error("task timed out")]
    TimedOut,
}

/// Dispatches node work to whatever runs the actual task body. Mirrors a
/// single async call per token; the engine does not care whether the
/// implementation runs in-process, over a queue, or against a remote
/// worker pool.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, run_id: RunId, token_id: TokenId, node_id: NodeId, ctx: &Context) -> Result<Value, TaskError>;
}

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("emit failed: {0}")]
    Failed(String),
}

/// Publishes workflow events to whatever observes run progress (logs, a
/// bus, a test harness).
#[async_trait]
pub trait Emitter: Send + Sync {
    async fn emit(&self, event: crate::event::WorkflowEvent) -> Result<(), EmitError>;
}

#[derive(Debug, Error)]
pub enum ResourcesError {
    #[error("resource store update failed: {0}")]
    Failed(String),
}

/// Mirrors run completion/status into whatever external resource store
/// tracks workflow runs (the `workflowRuns()` collection in the
/// out-of-scope resource catalog). The coordinator calls this from
/// `COMPLETE_WORKFLOW` and `FAIL_WORKFLOW`; a failure here is logged and
/// does not roll back the in-memory run state.
#[async_trait]
pub trait ResourcesClient: Send + Sync {
    async fn complete(&self, run_id: RunId, output: &Value) -> Result<(), ResourcesError>;
    async fn update_status(&self, run_id: RunId, status: RunStatus) -> Result<(), ResourcesError>;
}

#[derive(Debug, Error)]
pub enum CoordinatorRegistryError {
    #[error("coordinator for run {0} not found")]
    NotFound(RunId),
    #[error("dispatch to run {0} failed: {1}")]
    DispatchFailed(RunId, String),
}

/// Looks up the coordinator actor owning a given run — how a parent
/// workflow's coordinator reaches a child subworkflow's coordinator (and
/// vice versa) without a shared registry being baked into the engine.
#[async_trait]
pub trait CoordinatorRegistry: Send + Sync {
    async fn dispatch_to_run(&self, run_id: RunId, message: CoordinatorMessage) -> Result<(), CoordinatorRegistryError>;
}

/// A message one coordinator actor sends to another, used for the
/// subworkflow parent/child protocol.
#[derive(Debug, Clone)]
pub enum CoordinatorMessage {
    /// Parent → registry: resolve (spawning if needed) and start a child
    /// coordinator for a subworkflow dispatch.
    Start {
        workflow_id: String,
        version: Option<String>,
        input: Value,
        root_run_id: RunId,
        parent_run_id: RunId,
        parent_token_id: TokenId,
    },
    SubworkflowResolved { parent_token_id: TokenId, output: Value },
    SubworkflowFailed { parent_token_id: TokenId, error: String },
    CancelRun { reason: String },
}
