// SPDX-License-Identifier: MIT

//! The engine: the sole mutator of run state (`applier`), the race-safe
//! fan-out/fan-in path (`fan_engine`), run lifecycle and timeout sweeps
//! (`lifecycle`), subworkflow dispatch construction (`subworkflow`), and
//! the per-run actor tying it all together (`coordinator`).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod applier;
pub mod coordinator;
pub mod error;
pub mod fan_engine;
pub mod lifecycle;
pub mod subworkflow;

pub use applier::{apply, apply_batch, create_token, ApplyResult};
pub use coordinator::{Coordinator, ParentLink};
pub use error::{ApplyError, CoordinatorError};
