// SPDX-License-Identifier: MIT

//! Routing: picks outgoing transitions for a completed token and emits
//! `CREATE_TOKEN` decisions for each matched branch. Pure — reads only
//! the context snapshot and the static [`Definitions`] it is given.

use flowctl_core::{
    evaluate_condition, CreateTokenParams, Decision, Definitions, SiblingGroup, Token, TraceEvent, Transition,
};
use std::collections::{BTreeMap, HashMap};

pub struct RoutingResult {
    pub decisions: Vec<Decision>,
    pub trace: Vec<TraceEvent>,
}

/// Route a completed token along its node's outgoing transitions.
///
/// `now_ms` only feeds trace-event timestamps; no other planning output
/// depends on wall-clock time.
pub fn route(defs: &dyn Definitions, ctx: &flowctl_core::Context, completed: &Token, now_ms: u64) -> RoutingResult {
    let mut trace = Vec::new();
    let candidates = defs.transitions_from(&completed.node_id);

    let mut by_priority: BTreeMap<i32, Vec<&Transition>> = BTreeMap::new();
    for t in candidates {
        by_priority.entry(t.priority).or_default().push(t);
    }

    let mut matched: Vec<&Transition> = Vec::new();
    for (priority, tier) in &by_priority {
        let mut tier_matches = Vec::new();
        for t in tier {
            let is_match = match &t.condition {
                None => true,
                Some(expr) if expr.trim().is_empty() => true,
                Some(expr) => evaluate_condition(expr, ctx).unwrap_or(false),
            };
            trace.push(
                TraceEvent::new(completed.run_id, "decision.routing.evaluate_transition", now_ms)
                    .with_field("transition_id", t.id.as_str())
                    .with_field("priority", *priority)
                    .with_field("matched", is_match),
            );
            if is_match {
                tier_matches.push(*t);
            }
        }
        if !tier_matches.is_empty() {
            matched = tier_matches;
            break;
        }
    }

    if matched.is_empty() {
        return RoutingResult { decisions: Vec::new(), trace };
    }

    // Per-group branch totals, summed across all matched transitions sharing a group.
    let mut group_totals: HashMap<SiblingGroup, u32> = HashMap::new();
    let mut spawn_counts: Vec<u32> = Vec::with_capacity(matched.len());
    for t in &matched {
        let count = spawn_count(t, ctx);
        spawn_counts.push(count);
        if let Some(group) = &t.sibling_group {
            *group_totals.entry(group.clone()).or_insert(0) += count;
        }
    }

    let mut decisions = Vec::new();
    let mut group_cursor: HashMap<SiblingGroup, u32> = HashMap::new();

    for (t, count) in matched.iter().zip(spawn_counts) {
        let is_fan_out = t.is_fan_out_origin();
        let group_total = t.sibling_group.as_ref().and_then(|g| group_totals.get(g).copied());

        let mut iteration_counts = completed.iteration_counts.clone();
        if t.loop_config.is_some() {
            *iteration_counts.entry(t.id.clone()).or_insert(0) += 1;
        }

        for branch_index in 0..count {
            let (sibling_group, effective_index, effective_total) = if is_fan_out {
                let group = t.sibling_group.clone();
                let idx = if let Some(g) = &group {
                    let cursor = group_cursor.entry(g.clone()).or_insert(0);
                    let v = *cursor;
                    *cursor += 1;
                    v
                } else {
                    branch_index
                };
                (group, idx, group_total.unwrap_or(count))
            } else {
                (completed.sibling_group.clone(), completed.branch_index, completed.branch_total)
            };

            let path_id = if effective_total > 1 {
                format!("{}.{}.{}", completed.path_id, t.to_node_id.as_str(), effective_index)
            } else {
                completed.path_id.clone()
            };

            decisions.push(Decision::CreateToken(CreateTokenParams {
                node_id: t.to_node_id.clone(),
                parent_token_id: Some(completed.id),
                path_id,
                sibling_group,
                branch_index: effective_index,
                branch_total: effective_total,
                iteration_counts: iteration_counts.clone(),
            }));
        }
    }

    RoutingResult { decisions, trace }
}

fn spawn_count(t: &Transition, ctx: &flowctl_core::Context) -> u32 {
    let Some(foreach) = &t.foreach else {
        return t.spawn_count.unwrap_or(1);
    };
    let (ns_str, rest) = foreach.collection.split_once('.').unwrap_or((foreach.collection.as_str(), ""));
    let Some(ns) = flowctl_core::Namespace::parse(ns_str) else {
        return 1;
    };
    match ctx.get(ns, rest) {
        Some(serde_json::Value::Array(items)) => items.len() as u32,
        _ => 1,
    }
}

#[cfg(test)]
#[path = "routing_tests.rs"]
mod tests;
