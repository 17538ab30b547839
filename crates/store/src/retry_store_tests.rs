// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn take_due_removes_only_elapsed_retries() {
    let store = RetryStore::new();
    let early = TokenId::new();
    let late = TokenId::new();
    store.schedule(early, 1000);
    store.schedule(late, 5000);

    let due = store.take_due(2000);
    assert_eq!(due, vec![early]);
    assert!(store.take_due(2000).is_empty());

    let due = store.take_due(5000);
    assert_eq!(due, vec![late]);
}

#[test]
fn rescheduling_a_token_replaces_its_deadline() {
    let store = RetryStore::new();
    let token_id = TokenId::new();
    store.schedule(token_id, 1000);
    store.schedule(token_id, 9000);

    assert!(store.take_due(1000).is_empty());
    assert_eq!(store.take_due(9000), vec![token_id]);
}
