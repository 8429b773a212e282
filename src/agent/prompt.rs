//! Prompt rendering for text-based reasoning providers

use crate::agent::ReasoningRequest;
use crate::tools::ToolStatus;

/// Must appear in every prompt
pub const GUARDRAILS: &str = "This is administrative decision support. \
Requires human clinical and administrative review. \
Do not provide medical advice.";

const EVIDENCE_RULES: &str = "## Evidence rules\n\
Lookups were performed before this step against authoritative sources \
(cms.gov, icd10data.com, ama-assn.org, npiregistry.cms.hhs.gov, fda.gov, \
pubmed.ncbi.nlm.nih.gov). Use only facts present in the lookup results. \
Do not infer facts the results do not contain, do not claim official \
determinations and do not fabricate citations. Where a lookup was skipped \
or failed, mark the dependent fields as 'unverified'.";

/// Render the full prompt for one attempt
pub fn render_prompt(request: &ReasoningRequest) -> String {
    let input = serde_json::to_string_pretty(&request.input).unwrap_or_else(|_| "{}".to_string());

    let mut parts: Vec<String> = vec![
        GUARDRAILS.to_string(),
        String::new(),
        format!("I am executing step: {}", request.step_identifier),
        String::new(),
    ];

    if request.uses_tools {
        parts.push(EVIDENCE_RULES.to_string());
        parts.push(String::new());
    }

    parts.extend([
        "## Your role".to_string(),
        request.role.clone(),
        String::new(),
        "## Instructions".to_string(),
        request.instructions.clone(),
        String::new(),
        "## Tool results".to_string(),
        render_tool_results(request),
        String::new(),
        "## Input (use this to produce the output)".to_string(),
        "```json".to_string(),
        input,
        "```".to_string(),
        String::new(),
    ]);

    if let Some(feedback) = &request.feedback {
        parts.extend([
            format!("## Previous attempt rejected (attempt {})", request.attempt.saturating_sub(1)),
            feedback.clone(),
            "Correct these problems in your new answer.".to_string(),
            String::new(),
        ]);
    }

    parts.extend([
        "## Required output".to_string(),
        "Respond with ONLY a single JSON object that conforms to this schema. No other text."
            .to_string(),
        "Where you used lookup results, include source, confidence ('high', 'medium' or 'low') \
         and citations where they apply. Do not change the rest of the output schema."
            .to_string(),
        "```json".to_string(),
        request.output_schema_text.clone(),
        "```".to_string(),
    ]);

    parts.join("\n")
}

fn render_tool_results(request: &ReasoningRequest) -> String {
    if !request.uses_tools {
        return "No lookups are available for this step.".to_string();
    }
    if request.tool_outcomes.is_empty() {
        return "No lookups were performed. Mark anything that needs one as 'unverified'."
            .to_string();
    }

    request
        .tool_outcomes
        .iter()
        .map(|outcome| {
            let args = serde_json::to_string(&outcome.args).unwrap_or_default();
            match &outcome.status {
                ToolStatus::Completed { result } => format!(
                    "- {}({}) returned: {}",
                    outcome.tool,
                    args,
                    serde_json::to_string(result).unwrap_or_default()
                ),
                ToolStatus::Skipped { missing_argument } => format!(
                    "- {} was SKIPPED: the input has no value for `{}`. Treat what it would verify as 'unverified'.",
                    outcome.tool, missing_argument
                ),
                ToolStatus::Unverified { error } => format!(
                    "- {}({}) FAILED: {}. Treat what it would verify as 'unverified'.",
                    outcome.tool, args, error
                ),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
