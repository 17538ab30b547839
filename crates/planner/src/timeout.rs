// SPDX-License-Identifier: MIT

//! Timeout planning: what to do when a sync point's waiting tokens have
//! sat past `timeoutMs` without meeting their strategy.

use flowctl_core::{Decision, NodeId, OnTimeout, RunId, SyncSpec, Token, TransitionId};

/// `transition.timeoutMs > 0 ∧ oldest ≠ null ∧ (now - oldest) ≥ timeoutMs`.
/// A `timeoutMs` of `0`, missing, or `null` means no timeout.
pub fn has_timed_out(timeout_ms: Option<u64>, oldest_arrived_at_ms: Option<u64>, now_ms: u64) -> bool {
    match (timeout_ms, oldest_arrived_at_ms) {
        (Some(budget), Some(oldest)) if budget > 0 => now_ms.saturating_sub(oldest) >= budget,
        _ => false,
    }
}

/// `waiting` must be non-empty and ordered oldest-arrival-first; the
/// caller (fan engine) groups by sibling group before calling this.
pub fn decide_on_timeout(
    waiting: &[Token],
    sync: &SyncSpec,
    node_id: &NodeId,
    run_id: RunId,
    transition_id: &TransitionId,
) -> Vec<Decision> {
    if waiting.is_empty() {
        return Vec::new();
    }

    match sync.on_timeout {
        OnTimeout::Fail => {
            let mut decisions: Vec<Decision> = waiting
                .iter()
                .map(|t| Decision::UpdateTokenStatus { token_id: t.id, status: flowctl_core::TokenStatus::TimedOut })
                .collect();
            decisions.push(Decision::FailWorkflow {
                reason: format!("sync timeout at sibling group {}", sync.sibling_group.as_str()),
            });
            decisions
        }
        OnTimeout::ProceedWithAvailable => {
            let Some((first, rest)) = waiting.split_first() else { return Vec::new() };
            let mut decisions = vec![Decision::ActivateFanIn {
                run_id,
                node_id: node_id.clone(),
                fan_in_path: sync.sibling_group.fan_in_path(node_id),
                transition_id: transition_id.clone(),
                triggering_token_id: first.id,
            }];
            decisions.extend(
                rest.iter()
                    .map(|t| Decision::UpdateTokenStatus { token_id: t.id, status: flowctl_core::TokenStatus::TimedOut }),
            );
            decisions
        }
    }
}

#[cfg(test)]
#[path = "timeout_tests.rs"]
mod tests;
