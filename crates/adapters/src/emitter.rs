// SPDX-License-Identifier: MIT

//! Reference [`Emitter`] implementations.

use async_trait::async_trait;
use flowctl_core::{EmitError, Emitter, WorkflowEvent};
use tracing::info;

/// Logs every event at `info` via `tracing`, the way the teacher's
/// activity loggers write one structured line per state transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEmitter;

#[async_trait]
impl Emitter for LoggingEmitter {
    async fn emit(&self, event: WorkflowEvent) -> Result<(), EmitError> {
        info!(event = ?event, "workflow event");
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod recording {
    use super::*;
    use std::sync::Arc;

    /// Records every event in order, for assertions in tests.
    #[derive(Default, Clone)]
    pub struct RecordingEmitter {
        events: Arc<parking_lot::Mutex<Vec<WorkflowEvent>>>,
    }

    impl RecordingEmitter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<WorkflowEvent> {
            self.events.lock().clone()
        }
    }

    #[async_trait]
    impl Emitter for RecordingEmitter {
        async fn emit(&self, event: WorkflowEvent) -> Result<(), EmitError> {
            self.events.lock().push(event);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use recording::RecordingEmitter;

#[cfg(test)]
#[path = "emitter_tests.rs"]
mod tests;
