// SPDX-License-Identifier: MIT

//! The three workflow context namespaces: `input`, `state`, `output`.

use crate::value::{self, Value};
use serde::{Deserialize, Serialize};

/// Which namespace a dotted path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Input,
    State,
    Output,
}

crate::simple_display! {
    Namespace {
        Input => "input",
        State => "state",
        Output => "output",
    }
}

impl Namespace {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "input" => Some(Namespace::Input),
            "state" => Some(Namespace::State),
            "output" => Some(Namespace::Output),
            _ => None,
        }
    }
}

/// The workflow-run context: three independently-addressable JSON trees.
///
/// `input` is conventionally treated as immutable after [`Context::new`] —
/// nothing in this crate enforces that, callers (the applier) simply never
/// route a `SET_CONTEXT` decision at the `input` namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    pub input: Value,
    pub state: Value,
    pub output: Value,
}

impl Context {
    pub fn new(input: Value) -> Self {
        Self { input, state: Value::Object(Default::default()), output: Value::Object(Default::default()) }
    }

    pub fn namespace(&self, ns: Namespace) -> &Value {
        match ns {
            Namespace::Input => &self.input,
            Namespace::State => &self.state,
            Namespace::Output => &self.output,
        }
    }

    pub fn namespace_mut(&mut self, ns: Namespace) -> &mut Value {
        match ns {
            Namespace::Input => &mut self.input,
            Namespace::State => &mut self.state,
            Namespace::Output => &mut self.output,
        }
    }

    /// Resolve a path within a namespace, e.g. `get(Namespace::State, "votes.0")`.
    pub fn get(&self, ns: Namespace, path: &str) -> Option<&Value> {
        if path.is_empty() {
            Some(self.namespace(ns))
        } else {
            value::get_path(self.namespace(ns), path)
        }
    }

    /// Write a path within a namespace, creating intermediate objects as needed.
    pub fn set(&mut self, ns: Namespace, path: &str, v: Value) {
        if path.is_empty() {
            *self.namespace_mut(ns) = v;
        } else {
            value::set_path(self.namespace_mut(ns), path, v);
        }
    }

    /// Write a value at a fully-qualified dotted path whose first segment
    /// names the namespace, e.g. `"state.vs"`. Returns `None` (no-op) if
    /// the namespace segment is not one of `input|state|output`.
    pub fn set_full_path(&mut self, full_path: &str, v: Value) -> Option<()> {
        let (ns_str, rest) = full_path.split_once('.').unwrap_or((full_path, ""));
        let ns = Namespace::parse(ns_str)?;
        self.set(ns, rest, v);
        Some(())
    }

    /// Resolve a `$.<namespace>.<path>` reference, e.g. `"$.state.votes.0"`.
    /// Returns `None` if the namespace prefix is missing or unrecognized, or
    /// the path does not resolve — both are "absent", never an error, per
    /// the mapping contract.
    pub fn resolve_ref(&self, expr: &str) -> Option<Value> {
        let rest = expr.strip_prefix("$.")?;
        let (ns_str, path) = rest.split_once('.').unwrap_or((rest, ""));
        let ns = Namespace::parse(ns_str)?;
        self.get(ns, path).cloned()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
