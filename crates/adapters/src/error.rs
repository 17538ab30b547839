// SPDX-License-Identifier: MIT

use flowctl_core::RunId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdaptersError {
    #[error("definitions error: {0}")]
    Defs(#[from] flowctl_defs::DefsError),
    #[error("coordinator error: {0}")]
    Coordinator(#[from] flowctl_engine::CoordinatorError),
    #[error("no run {0} registered with this registry")]
    UnknownRun(RunId),
}
