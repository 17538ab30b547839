// SPDX-License-Identifier: MIT

//! `run_status`: the workflow-run lifecycle. Terminal is absorbing; all
//! subsequent mutation attempts are no-ops (and logged by the caller).

use flowctl_core::RunStatus;
use parking_lot::Mutex;

pub struct StatusStore {
    status: Mutex<RunStatus>,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self { status: Mutex::new(RunStatus::Running) }
    }
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> RunStatus {
        *self.status.lock()
    }

    pub fn is_terminal(&self) -> bool {
        self.get().is_terminal()
    }

    /// Sets status unless already terminal; returns `true` if applied.
    pub fn transition(&self, new_status: RunStatus) -> bool {
        let mut guard = self.status.lock();
        if guard.is_terminal() {
            false
        } else {
            *guard = new_status;
            true
        }
    }
}

#[cfg(test)]
#[path = "status_store_tests.rs"]
mod tests;
