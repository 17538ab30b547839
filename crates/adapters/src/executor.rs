// SPDX-License-Identifier: MIT

//! A scripted [`TaskExecutor`]: returns a canned result per node id,
//! for driving workflows in tests and the CLI demo without a real task
//! runner behind them.

use async_trait::async_trait;
use flowctl_core::{Context, NodeId, RunId, TaskError, TaskExecutor, TokenId, Value};
use std::collections::HashMap;

type Script = Box<dyn Fn(&Context) -> Result<Value, TaskError> + Send + Sync>;

/// Maps `nodeId -> script`. Nodes with no registered script fall back to
/// echoing the task input back as output, which is enough to drive a
/// workflow definition end to end without a real executor.
#[derive(Default)]
pub struct ScriptedTaskExecutor {
    scripts: HashMap<NodeId, Script>,
}

impl ScriptedTaskExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fixed output value for a node.
    pub fn returning(mut self, node_id: impl Into<NodeId>, output: Value) -> Self {
        self.scripts.insert(node_id.into(), Box::new(move |_ctx| Ok(output.clone())));
        self
    }

    /// Registers a failure for a node.
    pub fn failing(mut self, node_id: impl Into<NodeId>, message: impl Into<String>) -> Self {
        let message = message.into();
        self.scripts.insert(node_id.into(), Box::new(move |_ctx| Err(TaskError::Failed(message.clone()))));
        self
    }

    /// Registers an arbitrary script for a node.
    pub fn on_node(mut self, node_id: impl Into<NodeId>, script: impl Fn(&Context) -> Result<Value, TaskError> + Send + Sync + 'static) -> Self {
        self.scripts.insert(node_id.into(), Box::new(script));
        self
    }
}

#[async_trait]
impl TaskExecutor for ScriptedTaskExecutor {
    async fn execute(&self, _run_id: RunId, _token_id: TokenId, node_id: NodeId, ctx: &Context) -> Result<Value, TaskError> {
        match self.scripts.get(&node_id) {
            Some(script) => script(ctx),
            None => Ok(ctx.input.clone()),
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
