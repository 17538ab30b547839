// SPDX-License-Identifier: MIT

//! A loaded-definitions catalog: multiple workflows, keyed by
//! `(workflowId, version)`, each exposed to the engine as a
//! [`flowctl_core::traits::Definitions`] view.

use crate::error::DefsError;
use flowctl_core::{Definitions, WorkflowDef};
use std::collections::HashMap;
use std::sync::Arc;

/// One workflow's static shape, implementing the engine-facing
/// collaborator trait.
pub struct WorkflowDefinitions {
    def: Arc<WorkflowDef>,
}

impl WorkflowDefinitions {
    pub fn new(def: Arc<WorkflowDef>) -> Self {
        Self { def }
    }
}

impl Definitions for WorkflowDefinitions {
    fn workflow_def(&self) -> &WorkflowDef {
        &self.def
    }
}

/// An in-memory registry of loaded workflow definitions, the
/// `flowctl-defs` counterpart to a real definitions catalog service.
#[derive(Default)]
pub struct DefinitionsCatalog {
    workflows: HashMap<(String, Option<String>), Arc<WorkflowDef>>,
}

impl DefinitionsCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, def: WorkflowDef) -> Result<(), DefsError> {
        let key = (def.workflow_id.clone(), def.version.clone());
        if self.workflows.contains_key(&key) {
            return Err(DefsError::DuplicateWorkflow { workflow_id: key.0, version: key.1 });
        }
        self.workflows.insert(key, Arc::new(def));
        Ok(())
    }

    pub fn load_file(&mut self, path: impl AsRef<std::path::Path>) -> Result<(), DefsError> {
        self.insert(crate::loader::load_file(path)?)
    }

    pub fn get(&self, workflow_id: &str, version: Option<&str>) -> Result<WorkflowDefinitions, DefsError> {
        let key = (workflow_id.to_string(), version.map(str::to_string));
        self.workflows
            .get(&key)
            .map(|def| WorkflowDefinitions::new(Arc::clone(def)))
            .ok_or_else(|| DefsError::WorkflowNotFound { workflow_id: key.0, version: key.1 })
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
