//! Execution state models

use crate::core::schema::Violation;
use crate::tools::ToolGap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    NotStarted,
    InProgress,
    /// Every step reached SKIPPED, ACCEPTED or REJECTED
    Completed,
    /// Stopped early; see the run's halt info
    Halted,
}

/// Why a step did not execute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The gating condition evaluated false
    ConditionFalse { condition: String },
    /// A step this one's input projection needs has no output
    MissingDependency { dependency: String },
    /// The run halted before reaching this step
    RunHalted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ConditionFalse { condition } => {
                write!(f, "condition `{}` is false", condition)
            }
            SkipReason::MissingDependency { dependency } => {
                write!(f, "dependency `{}` has no output", dependency)
            }
            SkipReason::RunHalted => f.write_str("run halted"),
        }
    }
}

/// Error kind of a rejected step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    ValidationError,
    MalformedOutput,
    ProviderError,
    MissingDependency,
    Cancelled,
    InvariantViolation,
}

impl fmt::Display for StepErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepErrorKind::ValidationError => "ValidationError",
            StepErrorKind::MalformedOutput => "MalformedOutput",
            StepErrorKind::ProviderError => "ProviderError",
            StepErrorKind::MissingDependency => "MissingDependency",
            StepErrorKind::Cancelled => "Cancelled",
            StepErrorKind::InvariantViolation => "InvariantViolation",
        };
        f.write_str(name)
    }
}

/// State of a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepState {
    Pending,
    Running {
        attempt: u32,
    },
    Skipped {
        #[serde(flatten)]
        reason: SkipReason,
    },
    Accepted {
        payload: Value,
        attempts: u32,
        produced_at: u64,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_gaps: Vec<ToolGap>,
        /// Payload mentions `unverified` somewhere
        #[serde(default)]
        unverified: bool,
    },
    Rejected {
        kind: StepErrorKind,
        detail: String,
        attempts: u32,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        violations: Vec<Violation>,
    },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Accepted { .. } | StepState::Rejected { .. } | StepState::Skipped { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepState::Pending => "PENDING",
            StepState::Running { .. } => "RUNNING",
            StepState::Skipped { .. } => "SKIPPED",
            StepState::Accepted { .. } => "ACCEPTED",
            StepState::Rejected { .. } => "REJECTED",
        }
    }
}

/// Lifecycle of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::NotStarted,
            started_at: None,
            finished_at: None,
        }
    }

    /// Mark run as started
    pub fn start(&mut self) {
        self.status = RunStatus::InProgress;
        self.started_at = Some(Utc::now());
    }

    /// Mark run as completed
    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Mark run as halted
    pub fn halt(&mut self) {
        self.status = RunStatus::Halted;
        self.finished_at = Some(Utc::now());
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
