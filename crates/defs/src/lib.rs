// SPDX-License-Identifier: MIT

//! Loads workflow definitions from TOML and exposes them to the engine
//! through `flowctl_core::traits::Definitions`. Everything in this crate
//! is the "out of scope" CRUD-for-definitions side of the system; the
//! coordinator only ever depends on the trait.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod catalog;
pub mod error;
pub mod loader;

pub use catalog::{DefinitionsCatalog, WorkflowDefinitions};
pub use error::DefsError;
