// SPDX-License-Identifier: MIT

use super::*;
use flowctl_core::{DefMergeSpec, DefMergeStrategy, Node, RunId, SiblingGroup, SyncSpec, SyncStrategy, TaskDef, Token};
use flowctl_store::RunStore;
use serde_json::json;
use std::collections::HashMap;

struct FixedDefs(flowctl_core::WorkflowDef);

impl Definitions for FixedDefs {
    fn workflow_def(&self) -> &flowctl_core::WorkflowDef {
        &self.0
    }
}

fn defs_with_merge_transition(sync: SyncSpec) -> FixedDefs {
    let mut nodes = HashMap::new();
    nodes.insert(NodeId::from("fan"), Node { id: NodeId::from("fan"), task: None, subworkflow: None, output_mapping: HashMap::new() });
    nodes.insert(NodeId::from("join"), Node { id: NodeId::from("join"), task: None, subworkflow: None, output_mapping: HashMap::new() });
    let transition = flowctl_core::Transition {
        id: TransitionId::from("t1"),
        from_node_id: NodeId::from("fan"),
        to_node_id: NodeId::from("join"),
        priority: 0,
        condition: None,
        spawn_count: None,
        sibling_group: Some(SiblingGroup::from("g1")),
        foreach: None,
        synchronization: Some(sync),
        loop_config: None,
    };
    FixedDefs(flowctl_core::WorkflowDef {
        workflow_id: "wf".to_string(),
        version: None,
        initial_node_id: NodeId::from("fan"),
        nodes,
        transitions: vec![transition],
        output_mapping: HashMap::new(),
    })
}

fn branch_token(run_id: RunId, group: &SiblingGroup, index: u32, total: u32, status: TokenStatus) -> Token {
    let mut t = Token::root(run_id, NodeId::from("fan"), 0);
    t.sibling_group = Some(group.clone());
    t.branch_index = index;
    t.branch_total = total;
    t.status = status;
    t
}

#[test]
fn losing_the_fan_in_race_only_completes_the_triggering_token() {
    let run_id = RunId::new();
    let store = RunStore::new(json!({}));
    let group = SiblingGroup::from("g1");
    let t0 = branch_token(run_id, &group, 0, 2, TokenStatus::Completed);
    store.tokens.insert(t0.clone()).unwrap();

    assert!(store.fan_ins.try_activate("g1:join", TokenId::new(), &TransitionId::from("t1"), 0));

    let result = activate_fan_in(&store, &defs_with_merge_transition(SyncSpec {
        strategy: SyncStrategy::Any,
        sibling_group: group,
        merge: None,
        timeout_ms: None,
        on_timeout: Default::default(),
    }), run_id, &NodeId::from("join"), "g1:join", &TransitionId::from("t1"), t0.id, 5).unwrap();

    assert!(result.is_none());
    assert_eq!(store.tokens.get(t0.id).unwrap().status, TokenStatus::Completed);
}

#[test]
fn winning_the_race_merges_completes_siblings_and_creates_a_continuation() {
    let run_id = RunId::new();
    let store = RunStore::new(json!({}));
    let group = SiblingGroup::from("g1");

    let t0 = branch_token(run_id, &group, 0, 2, TokenStatus::Completed);
    let t1 = branch_token(run_id, &group, 1, 2, TokenStatus::WaitingForSiblings);
    store.tokens.insert(t0.clone()).unwrap();
    store.tokens.insert(t1.clone()).unwrap();
    store.branch_tables.init(t0.id, 0, None);
    store.branch_tables.init(t1.id, 1, None);
    store.branch_tables.apply_output(t0.id, 0, json!({"v": "a"}));
    store.branch_tables.apply_output(t1.id, 1, json!({"v": "b"}));

    let sync = SyncSpec {
        strategy: SyncStrategy::All,
        sibling_group: group.clone(),
        merge: Some(DefMergeSpec { source: "_branch.output.v".to_string(), target: "state.vs".to_string(), strategy: DefMergeStrategy::Append }),
        timeout_ms: None,
        on_timeout: Default::default(),
    };
    let defs = defs_with_merge_transition(sync);

    let (new_token, sibling_count) =
        activate_fan_in(&store, &defs, run_id, &NodeId::from("join"), "g1:join", &TransitionId::from("t1"), t0.id, 10)
            .unwrap()
            .expect("fan-in should activate and create a continuation token");

    assert_eq!(sibling_count, 2);
    assert_eq!(store.tokens.get(t0.id).unwrap().status, TokenStatus::Completed);
    assert_eq!(store.tokens.get(t1.id).unwrap().status, TokenStatus::Completed);
    assert_eq!(store.context.get(flowctl_core::Namespace::State, "vs"), Some(json!(["a", "b"])));

    let continuation = store.tokens.get(new_token).unwrap();
    assert_eq!(continuation.node_id, NodeId::from("join"));
    assert!(continuation.sibling_group.is_none());
    assert_eq!(continuation.branch_total, 1);
}

#[test]
fn handle_branch_output_without_a_task_is_a_no_op() {
    let run_id = RunId::new();
    let store = RunStore::new(json!({}));
    let node = Node { id: NodeId::from("passthrough"), task: None, subworkflow: None, output_mapping: HashMap::new() };
    handle_branch_output(&store, run_id, &node, TokenId::new(), &json!({"x": 1}), 0).unwrap();
    assert!(store.branch_tables.outputs_sorted(&[]).is_empty());
}

#[test]
fn handle_branch_output_only_applies_state_entries_to_shared_context() {
    let run_id = RunId::new();
    let store = RunStore::new(json!({}));
    let token_id = TokenId::new();
    let mut output_mapping = HashMap::new();
    output_mapping.insert("state.shared".to_string(), "v".to_string());
    output_mapping.insert("output.local".to_string(), "v".to_string());
    let node = Node {
        id: NodeId::from("branch"),
        task: Some(TaskDef { task_id: "t".to_string(), task_version: None, input_mapping: HashMap::new(), output_schema: None }),
        subworkflow: None,
        output_mapping,
    };

    handle_branch_output(&store, run_id, &node, token_id, &json!({"v": "value"}), 0).unwrap();

    assert_eq!(store.context.get(flowctl_core::Namespace::State, "shared"), Some(json!("value")));
    assert_eq!(store.context.get(flowctl_core::Namespace::Output, "local"), None);
}
