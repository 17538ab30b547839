// SPDX-License-Identifier: MIT

//! The pure planner: side-effect-free decision generation from read-only
//! snapshots. Nothing in this crate touches a store, calls a
//! collaborator, or reads the clock for anything but trace timestamps.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod completion;
pub mod routing;
pub mod sync;
pub mod timeout;

pub use completion::{apply_input_mapping, extract_final_output};
pub use routing::{route, RoutingResult};
pub use sync::{synchronize, SiblingCounts, SyncResult};
pub use timeout::{decide_on_timeout, has_timed_out};
