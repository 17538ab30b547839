// SPDX-License-Identifier: MIT

//! Synchronization: decides whether a newly created token proceeds
//! straight to dispatch, waits for siblings, or activates its fan-in.

use flowctl_core::{Decision, RunId, SyncSpec, SyncStrategy, Token, TraceEvent, TransitionId};

/// Live counts of a token's siblings, as observed by the caller from the
/// token store. `completed` counts only `completed` status; `terminal`
/// counts `completed | failed`.
#[derive(Debug, Clone, Copy)]
pub struct SiblingCounts {
    pub completed: u32,
    pub terminal: u32,
}

pub struct SyncResult {
    pub decisions: Vec<Decision>,
    pub trace: Vec<TraceEvent>,
}

/// `token` just arrived having been created for the transition that
/// carries `sync` (if any). `transition_id` identifies that transition
/// for `ACTIVATE_FAN_IN`'s audit trail.
pub fn synchronize(
    sync: Option<&SyncSpec>,
    token: &Token,
    counts: SiblingCounts,
    run_id: RunId,
    transition_id: &TransitionId,
    now_ms: u64,
) -> SyncResult {
    let mut trace = vec![TraceEvent::new(run_id, "decision.sync.check_condition", now_ms)
        .with_field("token_id", token.id.as_str())];

    let Some(sync) = sync else {
        trace.push(TraceEvent::new(run_id, "decision.sync.no_spec", now_ms));
        return SyncResult { decisions: vec![Decision::MarkForDispatch { token_id: token.id }], trace };
    };

    let group_mismatch = token.sibling_group.as_ref() != Some(&sync.sibling_group);
    if group_mismatch {
        trace.push(TraceEvent::new(run_id, "decision.sync.group_mismatch", now_ms));
        return SyncResult { decisions: vec![Decision::MarkForDispatch { token_id: token.id }], trace };
    }

    let met = match sync.strategy {
        SyncStrategy::Any => true,
        SyncStrategy::All => counts.terminal >= token.branch_total,
        SyncStrategy::MOfN(n) => counts.completed >= n,
    };

    if met {
        let fan_in_path = sync.sibling_group.fan_in_path(&token.node_id);
        trace.push(TraceEvent::new(run_id, "decision.sync.activated", now_ms).with_field("fan_in_path", &fan_in_path));
        SyncResult {
            decisions: vec![Decision::ActivateFanIn {
                run_id,
                node_id: token.node_id.clone(),
                fan_in_path,
                transition_id: transition_id.clone(),
                triggering_token_id: token.id,
            }],
            trace,
        }
    } else {
        trace.push(TraceEvent::new(run_id, "decision.sync.waiting", now_ms));
        SyncResult {
            decisions: vec![Decision::MarkWaiting { token_id: token.id, arrived_at_ms: now_ms, timeout_ms: sync.timeout_ms }],
            trace,
        }
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
