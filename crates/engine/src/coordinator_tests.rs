// SPDX-License-Identifier: MIT

use super::*;
use flowctl_core::{
    CoordinatorRegistryError, Definitions, EmitError, ErrorKind, FakeClock, Namespace, Node, NodeId, RetryDecision,
    RetryPolicy, TaskDef, TaskError,
};
use flowctl_store::RunStatus;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

struct FixedDefs(flowctl_core::WorkflowDef);

impl Definitions for FixedDefs {
    fn workflow_def(&self) -> &flowctl_core::WorkflowDef {
        &self.0
    }
}

fn single_task_defs(output_mapping: HashMap<String, String>, workflow_output_mapping: HashMap<String, String>) -> FixedDefs {
    let mut nodes = HashMap::new();
    nodes.insert(
        NodeId::from("start"),
        Node {
            id: NodeId::from("start"),
            task: Some(TaskDef { task_id: "t".to_string(), task_version: None, input_mapping: HashMap::new(), output_schema: None }),
            subworkflow: None,
            output_mapping,
        },
    );
    FixedDefs(flowctl_core::WorkflowDef {
        workflow_id: "wf".to_string(),
        version: None,
        initial_node_id: NodeId::from("start"),
        nodes,
        transitions: Vec::new(),
        output_mapping: workflow_output_mapping,
    })
}

struct FixedExecutor(serde_json::Value);

#[async_trait::async_trait]
impl TaskExecutor for FixedExecutor {
    async fn execute(&self, _run_id: RunId, _token_id: TokenId, _node_id: NodeId, _ctx: &flowctl_core::Context) -> Result<Value, TaskError> {
        Ok(self.0.clone())
    }
}

struct FailingExecutor;

#[async_trait::async_trait]
impl TaskExecutor for FailingExecutor {
    async fn execute(&self, _run_id: RunId, _token_id: TokenId, _node_id: NodeId, _ctx: &flowctl_core::Context) -> Result<Value, TaskError> {
        Err(TaskError::Failed("boom".to_string()))
    }
}

struct FlakyExecutor {
    calls: parking_lot::Mutex<u32>,
}

#[async_trait::async_trait]
impl TaskExecutor for FlakyExecutor {
    async fn execute(&self, _run_id: RunId, _token_id: TokenId, _node_id: NodeId, _ctx: &flowctl_core::Context) -> Result<Value, TaskError> {
        let mut calls = self.calls.lock();
        *calls += 1;
        if *calls == 1 {
            Err(TaskError::Failed("transient".to_string()))
        } else {
            Ok(json!({"result": 7}))
        }
    }
}

struct RecordingEmitter {
    events: parking_lot::Mutex<Vec<WorkflowEvent>>,
}

impl RecordingEmitter {
    fn new() -> Self {
        Self { events: parking_lot::Mutex::new(Vec::new()) }
    }
}

#[async_trait::async_trait]
impl Emitter for RecordingEmitter {
    async fn emit(&self, event: WorkflowEvent) -> Result<(), EmitError> {
        self.events.lock().push(event);
        Ok(())
    }
}

struct NoopRegistry;

#[async_trait::async_trait]
impl CoordinatorRegistry for NoopRegistry {
    async fn dispatch_to_run(&self, _run_id: RunId, _message: CoordinatorMessage) -> Result<(), CoordinatorRegistryError> {
        Ok(())
    }
}

struct NoopResources;

#[async_trait::async_trait]
impl flowctl_core::ResourcesClient for NoopResources {
    async fn complete(&self, _run_id: RunId, _output: &Value) -> Result<(), flowctl_core::ResourcesError> {
        Ok(())
    }

    async fn update_status(&self, _run_id: RunId, _status: flowctl_core::RunStatus) -> Result<(), flowctl_core::ResourcesError> {
        Ok(())
    }
}

struct RetryOnceThenFail;

impl RetryPolicy for RetryOnceThenFail {
    fn decide(&self, _token_id: TokenId, _node_id: &NodeId, _kind: ErrorKind, attempt: u32) -> RetryDecision {
        if attempt == 1 {
            RetryDecision::Retry { delay_ms: 0 }
        } else {
            RetryDecision::Fail
        }
    }
}

struct RetryOnceAfterDelay;

impl RetryPolicy for RetryOnceAfterDelay {
    fn decide(&self, _token_id: TokenId, _node_id: &NodeId, _kind: ErrorKind, attempt: u32) -> RetryDecision {
        if attempt == 1 {
            RetryDecision::Retry { delay_ms: 50 }
        } else {
            RetryDecision::Fail
        }
    }
}

fn coordinator_with(
    defs: FixedDefs,
    executor: impl TaskExecutor + 'static,
    retry: impl RetryPolicy + 'static,
) -> (Coordinator<FakeClock>, RunId) {
    let (coordinator, run_id, _clock) = coordinator_with_clock(defs, executor, retry);
    (coordinator, run_id)
}

fn coordinator_with_clock(
    defs: FixedDefs,
    executor: impl TaskExecutor + 'static,
    retry: impl RetryPolicy + 'static,
) -> (Coordinator<FakeClock>, RunId, FakeClock) {
    let run_id = RunId::new();
    let clock = FakeClock::new();
    let coordinator = Coordinator::new(
        run_id,
        run_id,
        None,
        Arc::new(defs),
        Arc::new(executor),
        Arc::new(RecordingEmitter::new()),
        Arc::new(NoopRegistry),
        Arc::new(retry),
        Arc::new(NoopResources),
        clock.clone(),
    );
    (coordinator, run_id, clock)
}

#[tokio::test]
async fn start_with_a_single_task_node_completes_the_workflow() {
    let mut output_mapping = HashMap::new();
    output_mapping.insert("state.value".to_string(), "result".to_string());
    let mut workflow_output_mapping = HashMap::new();
    workflow_output_mapping.insert("value".to_string(), "$.state.value".to_string());
    let defs = single_task_defs(output_mapping, workflow_output_mapping);

    let (coordinator, _run_id) = coordinator_with(defs, FixedExecutor(json!({"result": 42})), flowctl_core::NeverRetry);
    coordinator.start(json!({})).await.unwrap();

    assert_eq!(coordinator.store().status.get(), RunStatus::Completed);
    assert_eq!(coordinator.store().context.get(Namespace::Output, "value"), Some(json!(42)));
}

#[tokio::test]
async fn handle_task_error_with_never_retry_fails_the_workflow() {
    let defs = single_task_defs(HashMap::new(), HashMap::new());
    let (coordinator, _run_id) = coordinator_with(defs, FailingExecutor, flowctl_core::NeverRetry);

    coordinator.start(json!({})).await.unwrap();

    assert_eq!(coordinator.store().status.get(), RunStatus::Failed);
}

#[tokio::test]
async fn a_retry_policy_that_allows_one_retry_recovers_from_a_transient_failure() {
    let mut output_mapping = HashMap::new();
    output_mapping.insert("state.value".to_string(), "result".to_string());
    let defs = single_task_defs(output_mapping, HashMap::new());
    let executor = FlakyExecutor { calls: parking_lot::Mutex::new(0) };
    let (coordinator, _run_id) = coordinator_with(defs, executor, RetryOnceThenFail);

    coordinator.start(json!({})).await.unwrap();

    assert_eq!(coordinator.store().status.get(), RunStatus::Completed);
    assert_eq!(coordinator.store().context.get(Namespace::State, "value"), Some(json!(7)));
}

#[tokio::test]
async fn a_delayed_retry_does_not_redispatch_until_the_alarm_sweep_passes_its_deadline() {
    let mut output_mapping = HashMap::new();
    output_mapping.insert("state.value".to_string(), "result".to_string());
    let defs = single_task_defs(output_mapping, HashMap::new());
    let executor = FlakyExecutor { calls: parking_lot::Mutex::new(0) };
    let (coordinator, _run_id, clock) = coordinator_with_clock(defs, executor, RetryOnceAfterDelay);

    coordinator.start(json!({})).await.unwrap();
    assert_ne!(coordinator.store().status.get(), RunStatus::Completed);

    // Before the deadline, an alarm tick must not redispatch.
    coordinator.alarm().await.unwrap();
    assert_ne!(coordinator.store().status.get(), RunStatus::Completed);

    clock.advance(std::time::Duration::from_millis(50));
    coordinator.alarm().await.unwrap();

    assert_eq!(coordinator.store().status.get(), RunStatus::Completed);
    assert_eq!(coordinator.store().context.get(Namespace::State, "value"), Some(json!(7)));
}

#[tokio::test]
async fn cancel_cancels_active_tokens_and_is_idempotent() {
    let defs = single_task_defs(HashMap::new(), HashMap::new());
    let (coordinator, run_id) = coordinator_with(defs, FixedExecutor(json!({})), flowctl_core::NeverRetry);

    let token = flowctl_core::Token::root(run_id, NodeId::from("start"), 0);
    let token_id = token.id;
    coordinator.store().tokens.insert(token).unwrap();

    coordinator.cancel("operator requested".to_string()).await.unwrap();
    assert_eq!(coordinator.store().status.get(), RunStatus::Cancelled);
    assert_eq!(coordinator.store().tokens.get(token_id).unwrap().status, flowctl_core::TokenStatus::Cancelled);

    // Idempotent: a second cancel on an already-terminal run must not error.
    coordinator.cancel("again".to_string()).await.unwrap();
    assert_eq!(coordinator.store().status.get(), RunStatus::Cancelled);
}

#[tokio::test]
async fn starting_an_already_started_run_errors() {
    let defs = single_task_defs(HashMap::new(), HashMap::new());
    let (coordinator, _run_id) = coordinator_with(defs, FixedExecutor(json!({})), flowctl_core::NeverRetry);

    coordinator.start(json!({})).await.unwrap();
    let result = coordinator.start(json!({})).await;
    assert!(matches!(result, Err(CoordinatorError::AlreadyStarted(_))));
}
