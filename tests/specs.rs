// SPDX-License-Identifier: MIT

//! Black-box scenarios exercising the coordinator end to end: a linear
//! run, both fan-in synchronization strategies, a sync timeout, a
//! subworkflow cascade, priority-tiered routing, and a custom retry
//! policy. Each test builds its own minimal `WorkflowDef` rather than
//! loading one from disk, so the scenario under test is visible in one
//! place.

use flowctl_adapters::{Collaborators, InMemoryResourcesClient, InProcessRegistry, RecordingEmitter, ScriptedTaskExecutor};
use flowctl_core::{
    DefMergeSpec, DefMergeStrategy, ErrorKind, FakeClock, Namespace, Node, NodeId, OnTimeout, RetryDecision, RetryPolicy,
    RunStatus, SiblingGroup, SubworkflowSpec, SyncSpec, SyncStrategy, TaskDef, Token, TokenId, TokenStatus, Transition,
    TransitionId, WorkflowDef, WorkflowEvent,
};
use flowctl_defs::DefinitionsCatalog;
use flowctl_engine::Coordinator;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn task_node(id: &str, output_mapping: HashMap<String, String>) -> Node {
    Node {
        id: NodeId::from(id),
        task: Some(TaskDef { task_id: id.to_string(), task_version: None, input_mapping: HashMap::new(), output_schema: None }),
        subworkflow: None,
        output_mapping,
    }
}

fn pass_through_node(id: &str) -> Node {
    Node { id: NodeId::from(id), task: None, subworkflow: None, output_mapping: HashMap::new() }
}

fn transition(id: &str, from: &str, to: &str, priority: i32, condition: Option<&str>) -> Transition {
    Transition {
        id: TransitionId::from(id),
        from_node_id: NodeId::from(from),
        to_node_id: NodeId::from(to),
        priority,
        condition: condition.map(str::to_string),
        spawn_count: None,
        sibling_group: None,
        foreach: None,
        synchronization: None,
        loop_config: None,
    }
}

async fn start_registry(
    def: WorkflowDef,
    executor: ScriptedTaskExecutor,
    input: serde_json::Value,
) -> (Arc<Coordinator<flowctl_core::SystemClock>>, RecordingEmitter) {
    let mut catalog = DefinitionsCatalog::new();
    catalog.insert(def).unwrap();
    let emitter = RecordingEmitter::new();

    let registry = InProcessRegistry::new(Collaborators {
        catalog: Arc::new(catalog),
        executor: Arc::new(executor),
        emitter: Arc::new(emitter.clone()),
        resources: Arc::new(InMemoryResourcesClient::new()),
        retry_policy: Arc::new(flowctl_core::NeverRetry),
        clock: flowctl_core::SystemClock,
    });

    let coordinator = registry.start_run("wf", None, input).await.unwrap();
    coordinator.join_background().await;
    (coordinator, emitter)
}

// S1: a two-step linear workflow with no branching completes in a
// deterministic event order and carries its output through the
// workflow-level mapping.
#[tokio::test]
async fn s1_linear_happy_path_completes_in_order() {
    let mut a_mapping = HashMap::new();
    a_mapping.insert("state.y".to_string(), "y".to_string());

    let mut nodes = HashMap::new();
    nodes.insert(NodeId::from("a"), task_node("a", a_mapping));
    nodes.insert(NodeId::from("b"), task_node("b", HashMap::new()));

    let mut workflow_output_mapping = HashMap::new();
    workflow_output_mapping.insert("result".to_string(), "$.state.y".to_string());

    let def = WorkflowDef {
        workflow_id: "wf".to_string(),
        version: None,
        initial_node_id: NodeId::from("a"),
        nodes,
        transitions: vec![transition("t1", "a", "b", 0, None)],
        output_mapping: workflow_output_mapping,
    };

    let executor =
        ScriptedTaskExecutor::new().returning("a", json!({"y": 2})).returning("b", json!({"done": true}));

    let (coordinator, emitter) = start_registry(def, executor, json!({})).await;

    assert_eq!(coordinator.store().status.get(), RunStatus::Completed);
    assert_eq!(coordinator.store().context.get(Namespace::Output, "result"), Some(json!(2)));

    let names: Vec<&'static str> = emitter.events().iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        vec!["run_started", "token_dispatched", "token_completed", "token_dispatched", "token_completed", "run_completed"]
    );
}

fn two_hop_fan_out_def(sync: SyncSpec) -> WorkflowDef {
    let mut nodes = HashMap::new();
    nodes.insert(NodeId::from("start"), pass_through_node("start"));
    nodes.insert(NodeId::from("branch"), task_node("branch", HashMap::new()));
    nodes.insert(NodeId::from("join"), pass_through_node("join"));

    let fan_out = Transition {
        id: TransitionId::from("fan"),
        from_node_id: NodeId::from("start"),
        to_node_id: NodeId::from("branch"),
        priority: 0,
        condition: None,
        spawn_count: Some(3),
        sibling_group: Some(SiblingGroup::from("g1")),
        foreach: None,
        synchronization: None,
        loop_config: None,
    };
    let continuation = Transition {
        id: TransitionId::from("join"),
        from_node_id: NodeId::from("branch"),
        to_node_id: NodeId::from("join"),
        priority: 0,
        condition: None,
        spawn_count: None,
        sibling_group: None,
        foreach: None,
        synchronization: Some(sync),
        loop_config: None,
    };

    let mut workflow_output_mapping = HashMap::new();
    workflow_output_mapping.insert("vs".to_string(), "$.state.vs".to_string());

    WorkflowDef {
        workflow_id: "wf".to_string(),
        version: None,
        initial_node_id: NodeId::from("start"),
        nodes,
        transitions: vec![fan_out, continuation],
        output_mapping: workflow_output_mapping,
    }
}

fn counting_executor(node_id: &'static str) -> ScriptedTaskExecutor {
    let counter = Arc::new(AtomicU32::new(0));
    ScriptedTaskExecutor::new().on_node(node_id, move |_ctx| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"v": n}))
    })
}

// S2: fan-out of three branches, synchronized with the "all" strategy,
// merges every branch's output by append order.
#[tokio::test]
async fn s2_fan_out_all_strategy_merges_every_branch() {
    let sync = SyncSpec {
        strategy: SyncStrategy::All,
        sibling_group: SiblingGroup::from("g1"),
        merge: Some(DefMergeSpec { source: "_branch.output.v".to_string(), target: "state.vs".to_string(), strategy: DefMergeStrategy::Append }),
        timeout_ms: None,
        on_timeout: OnTimeout::default(),
    };
    let def = two_hop_fan_out_def(sync);
    let executor = counting_executor("branch");

    let (coordinator, emitter) = start_registry(def, executor, json!({})).await;

    assert_eq!(coordinator.store().status.get(), RunStatus::Completed);
    assert_eq!(coordinator.store().context.get(Namespace::State, "vs"), Some(json!([0, 1, 2])));

    let fan_ins = emitter.events().into_iter().filter(|e| matches!(e, WorkflowEvent::FanInActivated { .. })).count();
    assert_eq!(fan_ins, 1);
}

// S3: fan-out of three branches with the "any" strategy activates on
// the first completion and cancels the rest; only the winner's output
// survives the merge.
#[tokio::test]
async fn s3_fan_out_any_strategy_activates_on_first_completion() {
    let sync = SyncSpec {
        strategy: SyncStrategy::Any,
        sibling_group: SiblingGroup::from("g1"),
        merge: Some(DefMergeSpec { source: "_branch.output.v".to_string(), target: "state.vs".to_string(), strategy: DefMergeStrategy::Append }),
        timeout_ms: None,
        on_timeout: OnTimeout::default(),
    };
    let def = two_hop_fan_out_def(sync);
    let executor = counting_executor("branch");

    let (coordinator, emitter) = start_registry(def, executor, json!({})).await;

    assert_eq!(coordinator.store().status.get(), RunStatus::Completed);
    assert_eq!(coordinator.store().context.get(Namespace::State, "vs"), Some(json!([0])));

    let fan_ins = emitter.events().into_iter().filter(|e| matches!(e, WorkflowEvent::FanInActivated { .. })).count();
    assert_eq!(fan_ins, 1);
}

// S4: siblings that never arrive at the sync point within the timeout
// budget fail the whole run, with the rest of the group marked timed
// out.
#[tokio::test]
async fn s4_sync_timeout_fails_the_workflow() {
    let sync = SyncSpec {
        strategy: SyncStrategy::All,
        sibling_group: SiblingGroup::from("g1"),
        merge: None,
        timeout_ms: Some(100),
        on_timeout: OnTimeout::Fail,
    };
    let mut nodes = HashMap::new();
    nodes.insert(NodeId::from("branch"), task_node("branch", HashMap::new()));
    nodes.insert(NodeId::from("join"), pass_through_node("join"));
    let continuation = Transition {
        id: TransitionId::from("join"),
        from_node_id: NodeId::from("branch"),
        to_node_id: NodeId::from("join"),
        priority: 0,
        condition: None,
        spawn_count: None,
        sibling_group: None,
        foreach: None,
        synchronization: Some(sync),
        loop_config: None,
    };
    let def = WorkflowDef {
        workflow_id: "wf".to_string(),
        version: None,
        initial_node_id: NodeId::from("branch"),
        nodes,
        transitions: vec![continuation],
        output_mapping: HashMap::new(),
    };

    let clock = FakeClock::new();
    let run_id = flowctl_core::RunId::new();
    let coordinator = Coordinator::new(
        run_id,
        run_id,
        None,
        Arc::new(support::FixedDefs(def)),
        Arc::new(ScriptedTaskExecutor::new()),
        Arc::new(RecordingEmitter::new()),
        Arc::new(support::NoopRegistry),
        Arc::new(flowctl_core::NeverRetry),
        Arc::new(InMemoryResourcesClient::new()),
        clock.clone(),
    );

    let group = SiblingGroup::from("g1");
    let mut waiting_ids = Vec::new();
    for index in 0..3u32 {
        let mut token = Token::root(run_id, NodeId::from("join"), clock.epoch_ms());
        token.sibling_group = Some(group.clone());
        token.branch_index = index;
        token.branch_total = 3;
        token.status = TokenStatus::WaitingForSiblings;
        token.arrived_at_ms = Some(clock.epoch_ms());
        waiting_ids.push(token.id);
        coordinator.store().tokens.insert(token).unwrap();
    }

    clock.advance(std::time::Duration::from_millis(200));
    coordinator.alarm().await.unwrap();

    assert_eq!(coordinator.store().status.get(), RunStatus::Failed);
    for id in waiting_ids {
        assert_eq!(coordinator.store().tokens.get(id).unwrap().status, TokenStatus::TimedOut);
    }
}

mod support {
    use super::*;
    use flowctl_core::{CoordinatorMessage, CoordinatorRegistry, CoordinatorRegistryError, Definitions, RunId};

    pub struct FixedDefs(pub WorkflowDef);

    impl Definitions for FixedDefs {
        fn workflow_def(&self) -> &WorkflowDef {
            &self.0
        }
    }

    pub struct NoopRegistry;

    #[async_trait::async_trait]
    impl CoordinatorRegistry for NoopRegistry {
        async fn dispatch_to_run(&self, _run_id: RunId, _message: CoordinatorMessage) -> Result<(), CoordinatorRegistryError> {
            Ok(())
        }
    }
}

// S5: a subworkflow's completion resolves its parent's waiting token
// and the parent run completes once the resumed path finishes.
#[tokio::test]
async fn s5_subworkflow_resolution_resumes_the_parent() {
    let mut child_nodes = HashMap::new();
    child_nodes.insert(NodeId::from("child_task"), task_node("child_task", HashMap::new()));
    let mut child_output_mapping = HashMap::new();
    child_output_mapping.insert("done".to_string(), "$.output.done".to_string());
    let child_def = WorkflowDef {
        workflow_id: "child".to_string(),
        version: None,
        initial_node_id: NodeId::from("child_task"),
        nodes: child_nodes,
        transitions: Vec::new(),
        output_mapping: child_output_mapping,
    };

    let mut parent_nodes = HashMap::new();
    let mut parent_mapping = HashMap::new();
    parent_mapping.insert("state.child_done".to_string(), "done".to_string());
    parent_nodes.insert(
        NodeId::from("call_child"),
        Node {
            id: NodeId::from("call_child"),
            task: None,
            subworkflow: Some(SubworkflowSpec {
                workflow_id: "child".to_string(),
                version: None,
                input_mapping: HashMap::new(),
                timeout_ms: None,
            }),
            output_mapping: parent_mapping,
        },
    );
    let parent_def = WorkflowDef {
        workflow_id: "wf".to_string(),
        version: None,
        initial_node_id: NodeId::from("call_child"),
        nodes: parent_nodes,
        transitions: Vec::new(),
        output_mapping: HashMap::new(),
    };

    let mut catalog = DefinitionsCatalog::new();
    catalog.insert(parent_def).unwrap();
    catalog.insert(child_def).unwrap();
    let emitter = RecordingEmitter::new();
    let executor = ScriptedTaskExecutor::new().returning("child_task", json!({"done": true}));

    let registry = InProcessRegistry::new(Collaborators {
        catalog: Arc::new(catalog),
        executor: Arc::new(executor),
        emitter: Arc::new(emitter.clone()),
        resources: Arc::new(InMemoryResourcesClient::new()),
        retry_policy: Arc::new(flowctl_core::NeverRetry),
        clock: flowctl_core::SystemClock,
    });

    let coordinator = registry.start_run("wf", None, json!({})).await.unwrap();
    coordinator.join_background().await;

    assert_eq!(coordinator.store().status.get(), RunStatus::Completed);
    assert_eq!(coordinator.store().context.get(Namespace::State, "child_done"), Some(json!(true)));

    let names: Vec<&'static str> = emitter.events().iter().map(|e| e.name()).collect();
    assert!(names.contains(&"subworkflow_started"));
    assert!(names.contains(&"subworkflow_resolved"));
}

// S6: when two transitions out of a node both match, the lower
// priority number wins and the other tier's transition is never taken.
#[tokio::test]
async fn s6_priority_tiers_stop_at_the_first_matching_tier() {
    let mut nodes = HashMap::new();
    nodes.insert(NodeId::from("start"), task_node("start", HashMap::new()));
    nodes.insert(NodeId::from("high"), pass_through_node("high"));
    nodes.insert(NodeId::from("low"), pass_through_node("low"));

    let def = WorkflowDef {
        workflow_id: "wf".to_string(),
        version: None,
        initial_node_id: NodeId::from("start"),
        nodes,
        transitions: vec![
            transition("to_high", "start", "high", 0, None),
            transition("to_low", "start", "low", 10, None),
        ],
        output_mapping: HashMap::new(),
    };
    let executor = ScriptedTaskExecutor::new().returning("start", json!({}));

    let (coordinator, emitter) = start_registry(def, executor, json!({})).await;

    assert_eq!(coordinator.store().status.get(), RunStatus::Completed);
    let visited: Vec<NodeId> = emitter
        .events()
        .into_iter()
        .filter_map(|e| match e {
            WorkflowEvent::TokenDispatched { node_id, .. } => Some(node_id),
            _ => None,
        })
        .collect();
    assert!(visited.contains(&NodeId::from("high")));
    assert!(!visited.contains(&NodeId::from("low")));
}

// S7: a custom retry policy that allows exactly one retry, after a
// nonzero delay, recovers from a transient executor failure. The retry
// is scheduled through the alarm sweep rather than blocking the actor,
// so the redispatch only happens once the clock reaches the deadline.
#[tokio::test]
async fn s7_custom_retry_policy_recovers_after_one_retry() {
    struct RetryOnceThenFail;
    impl RetryPolicy for RetryOnceThenFail {
        fn decide(&self, _token_id: TokenId, _node_id: &NodeId, _kind: ErrorKind, attempt: u32) -> RetryDecision {
            if attempt == 1 {
                RetryDecision::Retry { delay_ms: 50 }
            } else {
                RetryDecision::Fail
            }
        }
    }

    let mut output_mapping = HashMap::new();
    output_mapping.insert("state.value".to_string(), "result".to_string());
    let mut nodes = HashMap::new();
    nodes.insert(NodeId::from("start"), task_node("start", output_mapping));
    let def = WorkflowDef {
        workflow_id: "wf".to_string(),
        version: None,
        initial_node_id: NodeId::from("start"),
        nodes,
        transitions: Vec::new(),
        output_mapping: HashMap::new(),
    };

    let calls = Arc::new(AtomicU32::new(0));
    let calls_for_script = Arc::clone(&calls);
    let executor = ScriptedTaskExecutor::new().on_node("start", move |_ctx| {
        let n = calls_for_script.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            Err(flowctl_core::TaskError::Failed("transient".to_string()))
        } else {
            Ok(json!({"result": 7}))
        }
    });

    let clock = FakeClock::new();
    let run_id = flowctl_core::RunId::new();
    let coordinator = Coordinator::new(
        run_id,
        run_id,
        None,
        Arc::new(support::FixedDefs(def)),
        Arc::new(executor),
        Arc::new(RecordingEmitter::new()),
        Arc::new(support::NoopRegistry),
        Arc::new(RetryOnceThenFail),
        Arc::new(InMemoryResourcesClient::new()),
        clock.clone(),
    );

    coordinator.start(json!({})).await.unwrap();
    coordinator.join_background().await;

    // The failed attempt scheduled a retry instead of redispatching
    // inline; the token stays put until the deadline is reached.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_ne!(coordinator.store().status.get(), RunStatus::Completed);

    coordinator.alarm().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1, "alarm before the deadline must not redispatch early");

    clock.advance(std::time::Duration::from_millis(50));
    coordinator.alarm().await.unwrap();
    coordinator.join_background().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(coordinator.store().status.get(), RunStatus::Completed);
    assert_eq!(coordinator.store().context.get(Namespace::State, "value"), Some(json!(7)));
}
