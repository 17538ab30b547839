// SPDX-License-Identifier: MIT

use super::*;
use flowctl_core::{Context, RunId, TokenId};
use serde_json::json;

#[tokio::test]
async fn a_node_with_no_script_echoes_its_input() {
    let executor = ScriptedTaskExecutor::new();
    let ctx = Context::new(json!({"a": 1}));
    let out = executor.execute(RunId::new(), TokenId::new(), NodeId::from("unscripted"), &ctx).await.unwrap();
    assert_eq!(out, json!({"a": 1}));
}

#[tokio::test]
async fn a_returning_script_ignores_input() {
    let executor = ScriptedTaskExecutor::new().returning("fixed", json!({"v": 42}));
    let ctx = Context::new(json!({"a": 1}));
    let out = executor.execute(RunId::new(), TokenId::new(), NodeId::from("fixed"), &ctx).await.unwrap();
    assert_eq!(out, json!({"v": 42}));
}

#[tokio::test]
async fn a_failing_script_surfaces_as_a_task_error() {
    let executor = ScriptedTaskExecutor::new().failing("broken", "nope");
    let ctx = Context::new(json!({}));
    let err = executor.execute(RunId::new(), TokenId::new(), NodeId::from("broken"), &ctx).await.unwrap_err();
    assert!(matches!(err, TaskError::Failed(msg) if msg == "nope"));
}

#[tokio::test]
async fn an_on_node_script_sees_the_input() {
    let executor = ScriptedTaskExecutor::new().on_node("doubler", |ctx| {
        let n = ctx.input.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(json!({"n": n * 2}))
    });
    let ctx = Context::new(json!({"n": 21}));
    let out = executor.execute(RunId::new(), TokenId::new(), NodeId::from("doubler"), &ctx).await.unwrap();
    assert_eq!(out, json!({"n": 42}));
}
