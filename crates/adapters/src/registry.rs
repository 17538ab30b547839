// SPDX-License-Identifier: MIT

//! An in-process [`CoordinatorRegistry`]: every run's [`Coordinator`]
//! lives as a task-local `Arc` in one process, addressed by `RunId`.
//! `Start` resolves the target workflow out of a shared
//! [`DefinitionsCatalog`], spawns a coordinator, and registers it before
//! running it — mirroring the teacher's `RuntimeDeps`/`MaterializedState`
//! split, but keyed by run instead of by job.

use crate::error::AdaptersError;
use async_trait::async_trait;
use flowctl_core::{
    Clock, CoordinatorMessage, CoordinatorRegistry, CoordinatorRegistryError, Definitions, Emitter, ResourcesClient,
    RetryPolicy, RunId, TaskExecutor, Value,
};
use flowctl_defs::DefinitionsCatalog;
use flowctl_engine::{Coordinator, ParentLink};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::warn;

/// Shared collaborators every coordinator spawned by this registry is
/// wired with. Bundled so `new` doesn't take eight positional `Arc`s.
pub struct Collaborators<C: Clock> {
    pub catalog: Arc<DefinitionsCatalog>,
    pub executor: Arc<dyn TaskExecutor>,
    pub emitter: Arc<dyn Emitter>,
    pub resources: Arc<dyn ResourcesClient>,
    pub retry_policy: Arc<dyn RetryPolicy>,
    pub clock: C,
}

pub struct InProcessRegistry<C: Clock> {
    self_handle: Weak<InProcessRegistry<C>>,
    collaborators: Collaborators<C>,
    runs: parking_lot::Mutex<HashMap<RunId, Arc<Coordinator<C>>>>,
}

impl<C: Clock> InProcessRegistry<C> {
    pub fn new(collaborators: Collaborators<C>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            self_handle: weak.clone(),
            collaborators,
            runs: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    /// Starts a brand-new root run, for callers driving a top-level
    /// workflow directly (the CLI, integration tests) rather than
    /// through the parent/child subworkflow protocol.
    pub async fn start_run(&self, workflow_id: &str, version: Option<&str>, input: Value) -> Result<Arc<Coordinator<C>>, AdaptersError> {
        let run_id = RunId::new();
        let coordinator = self.spawn(run_id, run_id, None, workflow_id, version)?;
        coordinator.start(input).await?;
        Ok(coordinator)
    }

    /// Looks up a previously-spawned run's coordinator.
    pub fn get(&self, run_id: RunId) -> Option<Arc<Coordinator<C>>> {
        self.runs.lock().get(&run_id).cloned()
    }

    fn spawn(
        &self,
        run_id: RunId,
        root_run_id: RunId,
        parent: Option<ParentLink>,
        workflow_id: &str,
        version: Option<&str>,
    ) -> Result<Arc<Coordinator<C>>, AdaptersError> {
        let defs = Arc::new(self.collaborators.catalog.get(workflow_id, version)?) as Arc<dyn Definitions>;
        let coordinator = Arc::new(Coordinator::new(
            run_id,
            root_run_id,
            parent,
            defs,
            Arc::clone(&self.collaborators.executor),
            Arc::clone(&self.collaborators.emitter),
            self.as_registry(),
            Arc::clone(&self.collaborators.retry_policy),
            Arc::clone(&self.collaborators.resources),
            self.collaborators.clock.clone(),
        ));
        self.runs.lock().insert(run_id, Arc::clone(&coordinator));
        Ok(coordinator)
    }

    fn as_registry(&self) -> Arc<dyn CoordinatorRegistry> {
        match self.self_handle.upgrade() {
            Some(strong) => strong,
            None => unreachable!("registry dropped while one of its own methods is running"),
        }
    }
}

#[async_trait]
impl<C: Clock> CoordinatorRegistry for InProcessRegistry<C> {
    async fn dispatch_to_run(&self, run_id: RunId, message: CoordinatorMessage) -> Result<(), CoordinatorRegistryError> {
        let dispatch_err = |err: AdaptersError| CoordinatorRegistryError::DispatchFailed(run_id, err.to_string());

        match message {
            CoordinatorMessage::Start { workflow_id, version, input, root_run_id, parent_run_id, parent_token_id } => {
                let parent = Some(ParentLink { parent_run_id, parent_token_id });
                let coordinator =
                    self.spawn(run_id, root_run_id, parent, &workflow_id, version.as_deref()).map_err(dispatch_err)?;
                coordinator.start(input).await.map_err(AdaptersError::from).map_err(dispatch_err)
            }
            CoordinatorMessage::SubworkflowResolved { parent_token_id, output } => {
                let coordinator = self.get(run_id).ok_or(CoordinatorRegistryError::NotFound(run_id))?;
                coordinator.handle_subworkflow_result(parent_token_id, output).await.map_err(AdaptersError::from).map_err(dispatch_err)
            }
            CoordinatorMessage::SubworkflowFailed { parent_token_id, error } => {
                let coordinator = self.get(run_id).ok_or(CoordinatorRegistryError::NotFound(run_id))?;
                coordinator.handle_subworkflow_error(parent_token_id, error).await.map_err(AdaptersError::from).map_err(dispatch_err)
            }
            CoordinatorMessage::CancelRun { reason } => {
                let Some(coordinator) = self.get(run_id) else {
                    warn!(%run_id, "cancel requested for a run this registry never saw; nothing to do");
                    return Ok(());
                };
                coordinator.cancel(reason).await.map_err(AdaptersError::from).map_err(dispatch_err)
            }
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
