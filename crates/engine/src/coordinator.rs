// SPDX-License-Identifier: MIT

//! The per-run actor. One [`Coordinator`] owns exactly one [`RunStore`];
//! every public entry point takes the async guard first so at most one
//! entry point executes at a time, matching the single-actor-per-run
//! invariant the rest of the engine is built on.

use crate::applier;
use crate::error::CoordinatorError;
use crate::fan_engine;
use crate::lifecycle;
use crate::subworkflow;
use flowctl_core::{
    Clock, CoordinatorMessage, CoordinatorRegistry, Decision, Definitions, Emitter, ErrorKind, NodeId, ResourcesClient,
    RetryPolicy, RunId, TaskError, TaskExecutor, Token, TokenId, TokenStatus, Value, WorkflowEvent,
};
use flowctl_store::RunStore;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;
use tracing::{info, warn};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Where to send terminal notifications if this run is a subworkflow.
#[derive(Debug, Clone, Copy)]
pub struct ParentLink {
    pub parent_run_id: RunId,
    pub parent_token_id: TokenId,
}

pub struct Coordinator<C: Clock> {
    run_id: RunId,
    root_run_id: RunId,
    parent: Option<ParentLink>,
    defs: Arc<dyn Definitions>,
    executor: Arc<dyn TaskExecutor>,
    emitter: Arc<dyn Emitter>,
    registry: Arc<dyn CoordinatorRegistry>,
    retry_policy: Arc<dyn RetryPolicy>,
    resources: Arc<dyn ResourcesClient>,
    clock: C,
    store: RunStore,
    guard: AsyncMutex<()>,
    attempts: parking_lot::Mutex<HashMap<TokenId, u32>>,
    background: AsyncMutex<JoinSet<()>>,
}

impl<C: Clock> Coordinator<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: RunId,
        root_run_id: RunId,
        parent: Option<ParentLink>,
        defs: Arc<dyn Definitions>,
        executor: Arc<dyn TaskExecutor>,
        emitter: Arc<dyn Emitter>,
        registry: Arc<dyn CoordinatorRegistry>,
        retry_policy: Arc<dyn RetryPolicy>,
        resources: Arc<dyn ResourcesClient>,
        clock: C,
    ) -> Self {
        Self {
            run_id,
            root_run_id,
            parent,
            defs,
            executor,
            emitter,
            registry,
            retry_policy,
            resources,
            clock,
            store: RunStore::new(Value::Null),
            guard: AsyncMutex::new(()),
            attempts: parking_lot::Mutex::new(HashMap::new()),
            background: AsyncMutex::new(JoinSet::new()),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    /// Waits for every fire-and-forget background dispatch this
    /// coordinator has spawned so far (subworkflow starts, parent/child
    /// notifications, cascade-cancels) to finish. The async analogue of
    /// the spec's `waitUntil` scope — a host draining a run before
    /// releasing the actor should await this after its last call.
    pub async fn join_background(&self) {
        let mut background = self.background.lock().await;
        while background.join_next().await.is_some() {}
    }

    async fn emit(&self, event: WorkflowEvent) {
        if let Err(err) = self.emitter.emit(event).await {
            warn!(%err, "emit failed");
        }
    }

    /// `start(runId)`.
    pub async fn start(&self, input: Value) -> Result<(), CoordinatorError> {
        let _guard = self.guard.lock().await;
        if !self.store.tokens.is_empty() {
            return Err(CoordinatorError::AlreadyStarted(self.run_id));
        }
        let now = self.clock.epoch_ms();
        let (init, root_params) = lifecycle::start_decisions(&*self.defs, input.clone());
        applier::apply(&self.store, self.run_id, &init, now)?;
        let root_token_id = applier::create_token(&self.store, self.run_id, &root_params, now)?;

        if let Some(parent) = self.parent {
            self.emit(WorkflowEvent::SubworkflowStarted {
                parent_run_id: parent.parent_run_id,
                parent_token_id: parent.parent_token_id,
                child_run_id: self.run_id,
            })
            .await;
        } else {
            self.emit(WorkflowEvent::RunStarted { run_id: self.run_id, input }).await;
        }

        self.dispatch_token(root_token_id).await
    }

    /// `dispatchToken(tokenId)`.
    fn dispatch_token(&self, token_id: TokenId) -> BoxFuture<'_, Result<(), CoordinatorError>> {
        Box::pin(async move {
            let now = self.clock.epoch_ms();
            applier::apply(&self.store, self.run_id, &Decision::MarkForDispatch { token_id }, now)?;
            let token = self.store.tokens.get(token_id)?;
            let node = self.defs.get_node(&token.node_id)?;
            self.emit(WorkflowEvent::TokenDispatched { run_id: self.run_id, token_id, node_id: token.node_id.clone() })
                .await;

            let ctx = self.store.context.snapshot();

            if let Some(dispatch) = subworkflow::build_dispatch(node, token_id, self.run_id, self.root_run_id, &ctx) {
                applier::apply(
                    &self.store,
                    self.run_id,
                    &Decision::MarkWaitingForSubworkflow {
                        token_id,
                        subworkflow_run_id: dispatch.child_run_id,
                        timeout_ms: dispatch.timeout_ms,
                    },
                    now,
                )?;
                self.emit(WorkflowEvent::SubworkflowStarted {
                    parent_run_id: self.run_id,
                    parent_token_id: token_id,
                    child_run_id: dispatch.child_run_id,
                })
                .await;
                let registry = Arc::clone(&self.registry);
                let child_run_id = dispatch.child_run_id;
                let message = CoordinatorMessage::Start {
                    workflow_id: dispatch.workflow_id,
                    version: dispatch.version,
                    input: dispatch.input,
                    root_run_id: dispatch.root_run_id,
                    parent_run_id: dispatch.parent_run_id,
                    parent_token_id: dispatch.parent_token_id,
                };
                self.background.lock().await.spawn(async move {
                    if let Err(err) = registry.dispatch_to_run(child_run_id, message).await {
                        warn!(%err, "failed to dispatch subworkflow start");
                    }
                });
                return Ok(());
            }

            if node.is_pass_through() {
                return self.process_task_result(token_id, Value::Null).await;
            }

            let Some(task) = &node.task else { unreachable!("non-pass-through node without task or subworkflow") };
            let task_input = flowctl_planner::apply_input_mapping(&task.input_mapping, &ctx);
            let task_ctx = flowctl_core::Context::new(task_input);
            match self.executor.execute(self.run_id, token_id, token.node_id.clone(), &task_ctx).await {
                Ok(output) => self.process_task_result(token_id, output).await,
                Err(err) => self.handle_task_error_inner(token_id, &node.id, err).await,
            }
        })
    }

    /// `processTaskResult(tokenId, result)`.
    fn process_task_result(&self, token_id: TokenId, output: Value) -> BoxFuture<'_, Result<(), CoordinatorError>> {
        Box::pin(async move {
            let now = self.clock.epoch_ms();
            let token = self.store.tokens.get(token_id)?;
            if token.status.is_terminal() {
                info!(%token_id, "ignoring result for an already-terminal token");
                return Ok(());
            }

            applier::apply(&self.store, self.run_id, &Decision::CompleteToken { token_id }, now)?;
            self.emit(WorkflowEvent::TokenCompleted { run_id: self.run_id, token_id, node_id: token.node_id.clone() })
                .await;

            let node = self.defs.get_node(&token.node_id)?;
            if token.sibling_group.is_some() {
                fan_engine::handle_branch_output(&self.store, self.run_id, node, token_id, &output, now)?;
            } else if !node.output_mapping.is_empty() {
                applier::apply(
                    &self.store,
                    self.run_id,
                    &Decision::ApplyOutputMapping { mapping: node.output_mapping.clone(), data: output },
                    now,
                )?;
            }

            let ctx = self.store.context.snapshot();
            let completed = self.store.tokens.get(token_id)?;
            let routing = flowctl_planner::route(&*self.defs, &ctx, &completed, now);

            if routing.decisions.is_empty() {
                if self.store.tokens.active_tokens().is_empty() {
                    self.complete_workflow().await?;
                }
                return Ok(());
            }

            let batch_result = applier::apply_batch(&self.store, self.run_id, &routing.decisions, now);
            if let Some(err) = batch_result.errors.into_iter().next() {
                return Err(err.into());
            }
            let created_ids = batch_result.created_token_ids;

            let mut sync_decisions = Vec::new();
            for created_id in &created_ids {
                let created = self.store.tokens.get(*created_id)?;
                let transition = find_sync_transition(&*self.defs, &created);
                let sync_spec = transition.and_then(|t| t.synchronization.as_ref());
                let transition_id = transition.map(|t| t.id.clone()).unwrap_or_else(|| flowctl_core::TransitionId::from(""));
                let counts = created
                    .sibling_group
                    .as_ref()
                    .map(|g| sibling_counts(&self.store, g))
                    .unwrap_or(flowctl_planner::SiblingCounts { completed: 0, terminal: 0 });
                let result = flowctl_planner::synchronize(sync_spec, &created, counts, self.run_id, &transition_id, now);
                sync_decisions.extend(result.decisions.into_iter().map(|d| (transition_id.clone(), d)));
            }

            let activations = fan_engine::process_synchronization(&self.store, &*self.defs, self.run_id, sync_decisions, now)?;
            for activation in &activations {
                self.emit(WorkflowEvent::FanInActivated {
                    run_id: self.run_id,
                    node_id: activation.node_id.clone(),
                    fan_in_path: activation.fan_in_path.clone(),
                    sibling_count: activation.sibling_count,
                })
                .await;
            }

            let mut to_dispatch: Vec<TokenId> = created_ids
                .into_iter()
                .filter(|id| {
                    self.store.tokens.try_get(*id).map(|t| t.status == TokenStatus::Dispatched).unwrap_or(false)
                })
                .collect();
            to_dispatch.extend(activations.into_iter().map(|a| a.continuation_token_id));

            for id in to_dispatch {
                self.dispatch_token(id).await?;
            }
            Ok(())
        })
    }

    async fn complete_workflow(&self) -> Result<(), CoordinatorError> {
        let now = self.clock.epoch_ms();
        let ctx = self.store.context.snapshot();
        let output = flowctl_planner::extract_final_output(&self.defs.workflow_def().output_mapping, &ctx);
        applier::apply(&self.store, self.run_id, &Decision::CompleteWorkflow { output: output.clone() }, now)?;
        self.emit(WorkflowEvent::RunCompleted { run_id: self.run_id, output: output.clone() }).await;
        if let Err(err) = self.resources.complete(self.run_id, &output).await {
            warn!(%err, "failed to update external resource store on completion");
        }

        if let Some(parent) = self.parent {
            let registry = Arc::clone(&self.registry);
            let message = CoordinatorMessage::SubworkflowResolved { parent_token_id: parent.parent_token_id, output };
            let parent_run_id = parent.parent_run_id;
            self.background.lock().await.spawn(async move {
                if let Err(err) = registry.dispatch_to_run(parent_run_id, message).await {
                    warn!(%err, "failed to notify parent of subworkflow completion");
                }
            });
        }
        Ok(())
    }

    /// `failWorkflow(error)`.
    pub async fn fail_workflow(&self, reason: String) -> Result<(), CoordinatorError> {
        let _guard = self.guard.lock().await;
        self.fail_workflow_inner(reason).await
    }

    async fn fail_workflow_inner(&self, reason: String) -> Result<(), CoordinatorError> {
        if self.store.status.is_terminal() {
            return Ok(());
        }
        let now = self.clock.epoch_ms();
        applier::apply(&self.store, self.run_id, &Decision::FailWorkflow { reason: reason.clone() }, now)?;
        self.cascade_cancel_subworkflows("parent workflow failed").await;
        self.emit(WorkflowEvent::RunFailed { run_id: self.run_id, reason: reason.clone() }).await;
        if let Err(err) = self.resources.update_status(self.run_id, flowctl_core::RunStatus::Failed).await {
            warn!(%err, "failed to update external resource store on failure");
        }

        if let Some(parent) = self.parent {
            let registry = Arc::clone(&self.registry);
            let message = CoordinatorMessage::SubworkflowFailed { parent_token_id: parent.parent_token_id, error: reason };
            let parent_run_id = parent.parent_run_id;
            self.background.lock().await.spawn(async move {
                if let Err(err) = registry.dispatch_to_run(parent_run_id, message).await {
                    warn!(%err, "failed to notify parent of subworkflow failure");
                }
            });
        }
        Ok(())
    }

    async fn cascade_cancel_subworkflows(&self, reason: &str) {
        for record in subworkflow::running_subworkflows(&self.store) {
            self.store.subworkflows.mark_status(record.parent_token_id, flowctl_store::SubworkflowStatus::Cancelled);
            let registry = Arc::clone(&self.registry);
            let child_run_id = record.subworkflow_run_id;
            let message = CoordinatorMessage::CancelRun { reason: reason.to_string() };
            self.background.lock().await.spawn(async move {
                if let Err(err) = registry.dispatch_to_run(child_run_id, message).await {
                    warn!(%err, "failed to cascade-cancel subworkflow");
                }
            });
        }
    }

    /// `handleTaskResult(tokenId, result)`.
    pub async fn handle_task_result(&self, token_id: TokenId, output: Value) -> Result<(), CoordinatorError> {
        let _guard = self.guard.lock().await;
        self.process_task_result(token_id, output).await
    }

    /// `handleTaskError(tokenId, error)`, consulting the retry policy.
    pub async fn handle_task_error(&self, token_id: TokenId, error: TaskError) -> Result<(), CoordinatorError> {
        let _guard = self.guard.lock().await;
        let token = self.store.tokens.get(token_id)?;
        self.handle_task_error_inner(token_id, &token.node_id, error).await
    }

    async fn handle_task_error_inner(&self, token_id: TokenId, node_id: &NodeId, error: TaskError) -> Result<(), CoordinatorError> {
        let kind = match &error {
            TaskError::TimedOut => ErrorKind::Timeout,
            TaskError::Failed(_) => ErrorKind::ExecutorError,
        };
        let attempt = {
            let mut attempts = self.attempts.lock();
            let entry = attempts.entry(token_id).or_insert(0);
            *entry += 1;
            *entry
        };

        match self.retry_policy.decide(token_id, node_id, kind, attempt) {
            flowctl_core::RetryDecision::Retry { delay_ms } => {
                if delay_ms == 0 {
                    return self.dispatch_token(token_id).await;
                }
                let now = self.clock.epoch_ms();
                self.store.retries.schedule(token_id, now + delay_ms);
                Ok(())
            }
            flowctl_core::RetryDecision::Fail => {
                let now = self.clock.epoch_ms();
                applier::apply(&self.store, self.run_id, &Decision::UpdateTokenStatus { token_id, status: TokenStatus::Failed }, now)?;
                self.emit(WorkflowEvent::TokenFailed {
                    run_id: self.run_id,
                    token_id,
                    node_id: node_id.clone(),
                    error: error.to_string(),
                })
                .await;
                self.fail_workflow_inner(error.to_string()).await
            }
        }
    }

    /// `handleSubworkflowResult(parentTokenId, output)`.
    pub async fn handle_subworkflow_result(&self, parent_token_id: TokenId, output: Value) -> Result<(), CoordinatorError> {
        let _guard = self.guard.lock().await;
        if self.store.status.is_terminal() {
            return Ok(());
        }
        let now = self.clock.epoch_ms();
        applier::apply(&self.store, self.run_id, &Decision::ResumeFromSubworkflow { token_id: parent_token_id, output: output.clone() }, now)?;
        self.process_task_result(parent_token_id, output).await
    }

    /// `handleSubworkflowError(parentTokenId, error)`.
    pub async fn handle_subworkflow_error(&self, parent_token_id: TokenId, error: String) -> Result<(), CoordinatorError> {
        let _guard = self.guard.lock().await;
        if self.store.status.is_terminal() {
            return Ok(());
        }
        let now = self.clock.epoch_ms();
        applier::apply(&self.store, self.run_id, &Decision::FailFromSubworkflow { token_id: parent_token_id, error: error.clone() }, now)?;
        self.fail_workflow_inner(error).await
    }

    /// `cancel(reason)`: idempotent.
    pub async fn cancel(&self, reason: String) -> Result<(), CoordinatorError> {
        let _guard = self.guard.lock().await;
        if self.store.status.is_terminal() {
            return Ok(());
        }
        let now = self.clock.epoch_ms();
        for token in self.store.tokens.active_tokens() {
            applier::apply(&self.store, self.run_id, &Decision::CancelTokens { token_ids: vec![token.id], reason: reason.clone() }, now)?;
        }
        self.store.status.transition(flowctl_store::RunStatus::Cancelled);
        self.cascade_cancel_subworkflows(&reason).await;
        self.emit(WorkflowEvent::RunCancelled { run_id: self.run_id, reason }).await;
        Ok(())
    }

    /// `alarm()`: host-invoked timeout sweep.
    pub async fn alarm(&self) -> Result<(), CoordinatorError> {
        let _guard = self.guard.lock().await;
        let now = self.clock.epoch_ms();

        let timeout_decisions = lifecycle::sweep_waiting_timeouts(&self.store, &*self.defs, self.run_id, now);
        let activations = fan_engine::process_synchronization(&self.store, &*self.defs, self.run_id, timeout_decisions.clone(), now)?;
        for activation in &activations {
            self.emit(WorkflowEvent::FanInActivated {
                run_id: self.run_id,
                node_id: activation.node_id.clone(),
                fan_in_path: activation.fan_in_path.clone(),
                sibling_count: activation.sibling_count,
            })
            .await;
        }
        if timeout_decisions.iter().any(|(_, d)| matches!(d, Decision::FailWorkflow { .. })) {
            self.fail_workflow_inner("sync timeout".to_string()).await?;
        }
        for activation in activations {
            self.dispatch_token(activation.continuation_token_id).await?;
        }

        for record in lifecycle::sweep_subworkflow_timeouts(&self.store, now) {
            applier::apply(
                &self.store,
                self.run_id,
                &Decision::TimeoutSubworkflow { token_id: record.parent_token_id, subworkflow_run_id: record.subworkflow_run_id },
                now,
            )?;
            self.emit(WorkflowEvent::TokenFailed {
                run_id: self.run_id,
                token_id: record.parent_token_id,
                node_id: NodeId::from(""),
                error: "subworkflow timed out".to_string(),
            })
            .await;
            let registry = Arc::clone(&self.registry);
            let child_run_id = record.subworkflow_run_id;
            self.background.lock().await.spawn(async move {
                if let Err(err) = registry.dispatch_to_run(child_run_id, CoordinatorMessage::CancelRun { reason: "parent timed out waiting".to_string() }).await {
                    warn!(%err, "failed to cancel timed-out subworkflow");
                }
            });
            self.fail_workflow_inner("subworkflow timeout".to_string()).await?;
        }

        for token_id in lifecycle::sweep_pending_retries(&self.store, now) {
            self.dispatch_token(token_id).await?;
        }
        Ok(())
    }
}

fn find_sync_transition<'a>(defs: &'a dyn Definitions, token: &Token) -> Option<&'a flowctl_core::Transition> {
    let group = token.sibling_group.as_ref()?;
    defs.transitions()
        .iter()
        .find(|t| t.to_node_id == token.node_id && t.synchronization.as_ref().is_some_and(|s| &s.sibling_group == group))
}

fn sibling_counts(store: &RunStore, group: &flowctl_core::SiblingGroup) -> flowctl_planner::SiblingCounts {
    let siblings = store.tokens.siblings_in_group(group);
    let completed = siblings.iter().filter(|t| t.status == TokenStatus::Completed).count() as u32;
    let terminal = siblings.iter().filter(|t| matches!(t.status, TokenStatus::Completed | TokenStatus::Failed)).count() as u32;
    flowctl_planner::SiblingCounts { completed, terminal }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
