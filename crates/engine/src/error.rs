// SPDX-License-Identifier: MIT

use flowctl_core::{DefinitionsError, RunId};
use thiserror::Error;

/// Per-decision application failures. Collected, never fatal to the
/// batch — `ApplyResult::errors` surfaces them to the caller.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("store error: {0}")]
    Store(#[from] flowctl_store::StoreError),

    #[error("definitions error: {0}")]
    Definitions(#[from] DefinitionsError),
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("run {0} was already started")]
    AlreadyStarted(RunId),

    #[error("definitions error: {0}")]
    Definitions(#[from] DefinitionsError),

    #[error("store error: {0}")]
    Store(#[from] flowctl_store::StoreError),

    #[error("registry error: {0}")]
    Registry(#[from] flowctl_core::CoordinatorRegistryError),

    #[error("apply error: {0}")]
    Apply(#[from] ApplyError),
}
