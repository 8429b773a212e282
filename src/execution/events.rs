//! Events emitted while a run progresses

use crate::core::state::{RunStatus, SkipReason, StepErrorKind};
use crate::tools::ToolOutcome;
use std::sync::Arc;
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        steps: usize,
    },
    StepSkipped {
        step: String,
        reason: SkipReason,
    },
    StepStarted {
        step: String,
        attempt: u32,
    },
    StepRetrying {
        step: String,
        attempt: u32,
        feedback: String,
    },
    ToolInvoked {
        step: String,
        outcome: ToolOutcome,
    },
    StepAccepted {
        step: String,
        attempts: u32,
    },
    StepRejected {
        step: String,
        kind: StepErrorKind,
        detail: String,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;
