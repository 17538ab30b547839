// SPDX-License-Identifier: MIT

use super::*;
use crate::ids::{NodeId, RunId, TokenId};
use serde_json::json;

#[test]
fn create_token_has_no_affected_token_ids() {
    let d = Decision::CreateToken(CreateTokenParams {
        node_id: NodeId::from("n"),
        parent_token_id: None,
        path_id: "root.0".to_string(),
        sibling_group: None,
        branch_index: 0,
        branch_total: 1,
        iteration_counts: HashMap::new(),
    });
    assert_eq!(d.name(), "create_token");
    assert!(d.affected_token_ids().is_empty());
}

#[test]
fn single_token_decisions_report_their_token() {
    let tid = TokenId::new();
    let d = Decision::MarkForDispatch { token_id: tid };
    assert_eq!(d.affected_token_ids(), vec![tid]);
}

#[test]
fn batch_decisions_report_all_their_tokens() {
    let a = TokenId::new();
    let b = TokenId::new();
    let d = Decision::CompleteTokens { token_ids: vec![a, b] };
    assert_eq!(d.affected_token_ids(), vec![a, b]);
}

#[test]
fn activate_fan_in_reports_the_triggering_token() {
    let tid = TokenId::new();
    let d = Decision::ActivateFanIn {
        run_id: RunId::new(),
        node_id: NodeId::from("join"),
        fan_in_path: "sg1:join".to_string(),
        transition_id: TransitionId::from("t1"),
        triggering_token_id: tid,
    };
    assert_eq!(d.name(), "activate_fan_in");
    assert_eq!(d.affected_token_ids(), vec![tid]);
}

#[test]
fn context_level_decisions_have_no_token_scope() {
    let d = Decision::SetContext { path: "state.x".to_string(), value: json!(1) };
    assert!(d.affected_token_ids().is_empty());
    assert_eq!(d.name(), "set_context");
}

#[test]
fn merge_spec_round_trips_through_serde() {
    let spec = MergeSpec {
        source: "v".to_string(),
        target: "state.vs".to_string(),
        strategy: MergeStrategy::Collect,
    };
    let s = serde_json::to_string(&spec).unwrap();
    let back: MergeSpec = serde_json::from_str(&s).unwrap();
    assert_eq!(back.strategy, MergeStrategy::Collect);
    assert_eq!(back.target, "state.vs");
}
