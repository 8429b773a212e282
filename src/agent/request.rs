//! What the engine hands the reasoning provider for one attempt

use crate::core::definition::StepDefinition;
use crate::core::schema::Schema;
use crate::tools::ToolOutcome;
use serde_json::Value;
use uuid::Uuid;

/// A complete request for one step attempt.
///
/// The provider always receives the full projected input and the full
/// output schema.
#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub run_id: Uuid,
    pub step_identifier: String,
    pub role: String,
    pub instructions: String,
    pub input: Value,
    pub output_schema: Schema,
    /// Schema block as written in the definition
    pub output_schema_text: String,
    pub uses_tools: bool,
    pub tool_outcomes: Vec<ToolOutcome>,
    /// 1-based attempt number
    pub attempt: u32,
    /// Why the previous attempt was rejected
    pub feedback: Option<String>,
}

impl ReasoningRequest {
    pub fn for_step(
        run_id: Uuid,
        step: &StepDefinition,
        input: Value,
        tool_outcomes: Vec<ToolOutcome>,
    ) -> Self {
        Self {
            run_id,
            step_identifier: step.identifier.clone(),
            role: step.role.clone(),
            instructions: step.instructions.clone(),
            input,
            output_schema: step.output_schema.schema.clone(),
            output_schema_text: step.output_schema.text.clone(),
            uses_tools: step.uses_tools,
            tool_outcomes,
            attempt: 1,
            feedback: None,
        }
    }

    /// The same request for the next attempt, carrying feedback
    pub fn retry(&self, feedback: impl Into<String>) -> Self {
        Self {
            attempt: self.attempt + 1,
            feedback: Some(feedback.into()),
            ..self.clone()
        }
    }

    /// Whether any lookup was skipped or failed
    pub fn has_tool_gaps(&self) -> bool {
        self.tool_outcomes.iter().any(|o| !o.is_completed())
    }
}
