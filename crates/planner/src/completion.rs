// SPDX-License-Identifier: MIT

//! Input/output mapping: resolving a node's (or workflow's) declared
//! mapping of target paths to `$.ns.path` source expressions against a
//! context snapshot. Missing sources yield absent keys, never errors.

use flowctl_core::Context;
use serde_json::Value;
use std::collections::HashMap;

/// Resolve each `target => "$.ns.path"` entry against `ctx`, returning an
/// object with only the keys that resolved.
pub fn apply_input_mapping(mapping: &HashMap<String, String>, ctx: &Context) -> Value {
    let mut out = serde_json::Map::new();
    for (target, source_expr) in mapping {
        if let Some(v) = ctx.resolve_ref(source_expr) {
            out.insert(target.clone(), v);
        }
    }
    Value::Object(out)
}

/// Same resolution, used at workflow completion to build the final
/// output object from `workflowOutputMapping`.
pub fn extract_final_output(mapping: &HashMap<String, String>, ctx: &Context) -> Value {
    apply_input_mapping(mapping, ctx)
}

#[cfg(test)]
#[path = "completion_tests.rs"]
mod tests;
