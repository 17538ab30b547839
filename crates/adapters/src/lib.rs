// SPDX-License-Identifier: MIT

//! Reference implementations of the collaborator traits `flowctl-core`
//! defines: an in-process `CoordinatorRegistry`, a logging `Emitter`,
//! an in-memory `ResourcesClient`, and a scripted `TaskExecutor`. None
//! of this is load-bearing for the coordinator itself — it exists so
//! the CLI and the integration tests have something to run a workflow
//! against without a real definitions service, task runner, or resource
//! catalog behind them.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod emitter;
pub mod error;
pub mod executor;
pub mod registry;
pub mod resources;

pub use emitter::LoggingEmitter;
pub use error::AdaptersError;
pub use executor::ScriptedTaskExecutor;
pub use registry::{Collaborators, InProcessRegistry};
pub use resources::{InMemoryResourcesClient, RunRecord};

#[cfg(any(test, feature = "test-support"))]
pub use emitter::RecordingEmitter;
