//! Run results

use crate::core::state::{RunStatus, SkipReason, StepErrorKind, StepState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Terminal state of one step, in execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub identifier: String,
    pub order: u32,
    #[serde(flatten)]
    pub state: StepState,
}

/// The step that halted a run and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaltInfo {
    pub step: String,
    pub kind: StepErrorKind,
    pub detail: String,
}

/// Outcome of one complete run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub steps: Vec<StepReport>,
    /// Final state store: every accepted step's payload
    pub outputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted: Option<HaltInfo>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunResult {
    pub fn step(&self, identifier: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.identifier == identifier)
    }

    pub fn state(&self, identifier: &str) -> Option<&StepState> {
        self.step(identifier).map(|s| &s.state)
    }

    /// Accepted payload of a step
    pub fn payload(&self, identifier: &str) -> Option<&Value> {
        self.outputs.get(identifier)
    }

    fn ids_where(&self, pred: impl Fn(&StepState) -> bool) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| pred(&s.state))
            .map(|s| s.identifier.as_str())
            .collect()
    }

    pub fn accepted(&self) -> Vec<&str> {
        self.ids_where(|s| matches!(s, StepState::Accepted { .. }))
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.ids_where(|s| matches!(s, StepState::Skipped { .. }))
    }

    pub fn rejected(&self) -> Vec<&str> {
        self.ids_where(|s| matches!(s, StepState::Rejected { .. }))
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn is_halted(&self) -> bool {
        self.status == RunStatus::Halted
    }

    /// Steps skipped because `identifier` produced no output.
    ///
    /// Follows dependency skips down the chain, and counts every `RunHalted`
    /// skip when `identifier` is the step that halted the run.
    pub fn downstream_skipped_by(&self, identifier: &str) -> Vec<&str> {
        let halted_here = self
            .halted
            .as_ref()
            .is_some_and(|halt| halt.step == identifier);
        let mut causes = vec![identifier];
        let mut out = Vec::new();

        // Dependencies always run earlier, so one pass in order is enough
        for report in &self.steps {
            let caused = match &report.state {
                StepState::Skipped {
                    reason: SkipReason::MissingDependency { dependency },
                } => causes.contains(&dependency.as_str()),
                StepState::Skipped {
                    reason: SkipReason::RunHalted,
                } => halted_here,
                _ => false,
            };
            if caused {
                causes.push(report.identifier.as_str());
                out.push(report.identifier.as_str());
            }
        }
        out
    }

    /// One line per rejected step, naming its cause and consequences
    pub fn summary(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter_map(|report| match &report.state {
                StepState::Rejected { kind, detail, .. } => {
                    let downstream = self.downstream_skipped_by(&report.identifier);
                    let mut line = format!("{} rejected ({}): {}", report.identifier, kind, detail);
                    if !downstream.is_empty() {
                        line.push_str(&format!("; skipped as a result: {}", downstream.join(", ")));
                    }
                    Some(line)
                }
                _ => None,
            })
            .collect()
    }
}
