// SPDX-License-Identifier: MIT

//! Loads and validates [`WorkflowDef`]s from TOML files.
//!
//! The on-disk shape mirrors `flowctl_core::def::WorkflowDef` field for
//! field (it derives `Deserialize` directly), so `load_str`/`load_file`
//! are thin wrappers around `toml::from_str` plus the validation pass
//! the bare data model cannot express: spawn-count rejection and
//! referential integrity between transitions and nodes.

use crate::error::DefsError;
use flowctl_core::WorkflowDef;
use std::path::Path;

pub fn load_file(path: impl AsRef<Path>) -> Result<WorkflowDef, DefsError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|source| DefsError::Io { path: path.display().to_string(), source })?;
    load_str(&contents, &path.display().to_string())
}

pub fn load_str(toml_src: &str, label: &str) -> Result<WorkflowDef, DefsError> {
    let def: WorkflowDef =
        toml::from_str(toml_src).map_err(|source| DefsError::Toml { path: label.to_string(), source })?;
    validate(&def)?;
    Ok(def)
}

fn validate(def: &WorkflowDef) -> Result<(), DefsError> {
    if !def.nodes.contains_key(&def.initial_node_id) {
        return Err(DefsError::UnknownInitialNode(def.initial_node_id.clone()));
    }

    for t in &def.transitions {
        if !def.nodes.contains_key(&t.from_node_id) {
            return Err(DefsError::UnknownNode {
                transition_id: t.id.to_string(),
                node_id: t.from_node_id.clone(),
            });
        }
        if !def.nodes.contains_key(&t.to_node_id) {
            return Err(DefsError::UnknownNode {
                transition_id: t.id.to_string(),
                node_id: t.to_node_id.clone(),
            });
        }
        if let Some(0) = t.spawn_count {
            return Err(DefsError::InvalidSpawnCount { transition_id: t.id.to_string(), spawn_count: 0 });
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
