// SPDX-License-Identifier: MIT

use super::*;
use crate::ids::RunId;

#[test]
fn root_token_starts_pending_with_branch_total_one() {
    let tok = Token::root(RunId::new(), NodeId::from("start"), 1000);
    assert_eq!(tok.status, TokenStatus::Pending);
    assert_eq!(tok.branch_total, 1);
    assert_eq!(tok.branch_index, 0);
    assert!(tok.sibling_group.is_none());
}

#[test]
fn terminal_statuses_never_transition_again() {
    let mut tok = Token::root(RunId::new(), NodeId::from("start"), 1000);
    assert!(tok.transition(TokenStatus::Completed, 1001));
    assert!(!tok.transition(TokenStatus::Failed, 1002));
    assert_eq!(tok.status, TokenStatus::Completed);
    assert_eq!(tok.updated_at_ms, 1001);
}

#[test]
fn non_terminal_transitions_succeed_and_bump_updated_at() {
    let mut tok = Token::root(RunId::new(), NodeId::from("start"), 1000);
    assert!(tok.transition(TokenStatus::Dispatched, 1001));
    assert!(tok.transition(TokenStatus::Executing, 1002));
    assert_eq!(tok.status, TokenStatus::Executing);
    assert_eq!(tok.updated_at_ms, 1002);
}

#[test]
fn status_predicates() {
    assert!(TokenStatus::Pending.is_in_flight());
    assert!(!TokenStatus::Pending.is_terminal());
    assert!(TokenStatus::Completed.is_terminal());
    assert!(TokenStatus::WaitingForSiblings.is_waiting());
    assert!(!TokenStatus::WaitingForSiblings.is_in_flight());
}
