// SPDX-License-Identifier: MIT

use super::*;
use crate::ids::TransitionId;
use std::collections::HashMap;

fn node(id: &str) -> Node {
    Node { id: NodeId::from(id), task: None, subworkflow: None, output_mapping: HashMap::new() }
}

fn transition(id: &str, from: &str, to: &str, priority: i32) -> Transition {
    Transition {
        id: TransitionId::from(id),
        from_node_id: NodeId::from(from),
        to_node_id: NodeId::from(to),
        priority,
        condition: None,
        spawn_count: None,
        sibling_group: None,
        foreach: None,
        synchronization: None,
        loop_config: None,
    }
}

#[test]
fn node_is_pass_through_without_task_or_subworkflow() {
    assert!(node("a").is_pass_through());
}

#[test]
fn transitions_from_filters_by_source_node() {
    let def = WorkflowDef {
        workflow_id: "wf".to_string(),
        version: None,
        initial_node_id: NodeId::from("a"),
        nodes: HashMap::new(),
        transitions: vec![transition("t1", "a", "b", 0), transition("t2", "b", "c", 0)],
        output_mapping: HashMap::new(),
    };
    let from_a = def.transitions_from(&NodeId::from("a"));
    assert_eq!(from_a.len(), 1);
    assert_eq!(from_a[0].id, TransitionId::from("t1"));
}

#[test]
fn fan_out_origin_requires_sibling_group() {
    let mut t = transition("t1", "a", "b", 0);
    assert!(!t.is_fan_out_origin());
    t.sibling_group = Some(crate::ids::SiblingGroup::from("g1"));
    assert!(t.is_fan_out_origin());
}

#[test]
fn default_on_timeout_is_fail() {
    assert_eq!(OnTimeout::default(), OnTimeout::Fail);
}
