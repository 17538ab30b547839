// SPDX-License-Identifier: MIT

//! Identifier types for runs, tokens, and the graph elements they reference.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// A workflow run's unique identifier. Sortable — a run's siblings
    /// (its own subworkflow runs) can be ordered by creation.
    pub struct RunId("run-");
}

crate::define_id! {
    /// A token's unique identifier. Sortable within a run.
    pub struct TokenId("tok-");
}

/// A node identifier, as named in the workflow definition (e.g. `"fetch"`).
/// Unlike [`RunId`]/[`TokenId`] these are author-chosen, not generated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A transition identifier, as named (or synthesized) in the workflow
/// definition. Used to key `iterationCounts` and loop-config budgets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionId(pub String);

impl TransitionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TransitionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TransitionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A sibling-group label, shared by all tokens spawned by one fan-out
/// transition plus their eventual continuation token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiblingGroup(pub String);

impl SiblingGroup {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `fanInPath := siblingGroup + ":" + targetNodeId`.
    pub fn fan_in_path(&self, target_node: &NodeId) -> String {
        format!("{}:{}", self.0, target_node.0)
    }
}

impl std::fmt::Display for SiblingGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SiblingGroup {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SiblingGroup {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
