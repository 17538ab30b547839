// SPDX-License-Identifier: MIT

//! `context`: the run's three-namespace JSON tree.

use flowctl_core::{Context, Namespace, Value};
use parking_lot::Mutex;

pub struct ContextStore {
    ctx: Mutex<Context>,
}

impl ContextStore {
    pub fn new(input: Value) -> Self {
        Self { ctx: Mutex::new(Context::new(input)) }
    }

    pub fn get(&self, ns: Namespace, path: &str) -> Option<Value> {
        self.ctx.lock().get(ns, path).cloned()
    }

    pub fn set(&self, ns: Namespace, path: &str, value: Value) {
        self.ctx.lock().set(ns, path, value);
    }

    pub fn set_full_path(&self, full_path: &str, value: Value) -> Option<()> {
        self.ctx.lock().set_full_path(full_path, value)
    }

    pub fn resolve_ref(&self, expr: &str) -> Option<Value> {
        self.ctx.lock().resolve_ref(expr)
    }

    /// A consistent point-in-time copy, for planner snapshots.
    pub fn snapshot(&self) -> Context {
        self.ctx.lock().clone()
    }
}

#[cfg(test)]
#[path = "context_store_tests.rs"]
mod tests;
