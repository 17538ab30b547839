// SPDX-License-Identifier: MIT

use super::*;
use flowctl_core::{NodeId, RunId};

fn new_token(run_id: RunId) -> Token {
    Token::root(run_id, NodeId::from("a"), 1000)
}

#[test]
fn insert_then_get_round_trips() {
    let store = TokenStore::new();
    let run_id = RunId::new();
    let tok = new_token(run_id);
    let id = tok.id;
    store.insert(tok).unwrap();
    assert_eq!(store.get(id).unwrap().id, id);
}

#[test]
fn duplicate_insert_is_rejected() {
    let store = TokenStore::new();
    let tok = new_token(RunId::new());
    let dup = tok.clone();
    store.insert(tok).unwrap();
    assert!(matches!(store.insert(dup), Err(StoreError::DuplicateToken(_))));
}

#[test]
fn get_missing_token_errors() {
    let store = TokenStore::new();
    assert!(matches!(store.get(TokenId::new()), Err(StoreError::TokenNotFound(_))));
}

#[test]
fn update_status_on_terminal_token_is_a_guarded_no_op() {
    let store = TokenStore::new();
    let tok = new_token(RunId::new());
    let id = tok.id;
    store.insert(tok).unwrap();
    assert!(store.update_status(id, TokenStatus::Completed, 1001).unwrap());
    assert!(!store.update_status(id, TokenStatus::Failed, 1002).unwrap());
    assert_eq!(store.get(id).unwrap().status, TokenStatus::Completed);
}

#[test]
fn siblings_in_group_filters_by_group() {
    let store = TokenStore::new();
    let run_id = RunId::new();
    let mut a = new_token(run_id);
    a.sibling_group = Some("g1".into());
    let mut b = new_token(run_id);
    b.sibling_group = Some("g1".into());
    let mut c = new_token(run_id);
    c.sibling_group = Some("g2".into());

    store.insert(a).unwrap();
    store.insert(b).unwrap();
    store.insert(c).unwrap();

    assert_eq!(store.siblings_in_group(&"g1".into()).len(), 2);
}

#[test]
fn active_tokens_excludes_terminal() {
    let store = TokenStore::new();
    let run_id = RunId::new();
    let tok = new_token(run_id);
    let id = tok.id;
    store.insert(tok).unwrap();
    assert_eq!(store.active_tokens().len(), 1);
    store.update_status(id, TokenStatus::Completed, 1001).unwrap();
    assert_eq!(store.active_tokens().len(), 0);
}
