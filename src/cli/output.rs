//! CLI output formatting

use crate::{
    core::{RunResult, RunStatus, StepDefinition, StepState},
    execution::ExecutionEvent,
    tools::ToolStatus,
};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    match state {
        StepState::Pending => style("PENDING").dim().to_string(),
        StepState::Running { attempt } => {
            style(format!("RUNNING (attempt {})", attempt)).yellow().to_string()
        }
        StepState::Accepted { attempts, unverified, .. } => {
            let mut label = style("ACCEPTED").green().to_string();
            if *attempts > 1 {
                label.push_str(&style(format!(" after {} attempts", attempts)).dim().to_string());
            }
            if *unverified {
                label.push_str(&style(" (contains unverified facts)").yellow().to_string());
            }
            label
        }
        StepState::Rejected { kind, .. } => style(format!("REJECTED ({})", kind)).red().to_string(),
        StepState::Skipped { reason } => style(format!("SKIPPED ({})", reason)).dim().to_string(),
    }
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::NotStarted => style("NOT STARTED").dim().to_string(),
        RunStatus::InProgress => style("IN PROGRESS").yellow().to_string(),
        RunStatus::Completed => style("COMPLETED").green().to_string(),
        RunStatus::Halted => style("HALTED").red().to_string(),
    }
}

/// One line per registered step, in execution order
pub fn format_step_list(steps: &[StepDefinition]) -> Vec<String> {
    steps
        .iter()
        .map(|step| {
            let mut line = format!(
                "{:>3}. {}",
                step.order,
                style(&step.identifier).bold()
            );
            if let Some(version) = &step.version {
                line.push_str(&style(format!(" v{}", version)).dim().to_string());
            }
            if step.mandatory {
                line.push_str(&style(" [mandatory]").yellow().to_string());
            }
            if step.uses_tools {
                line.push_str(&style(" [tools]").cyan().to_string());
            }
            if let Some(condition) = &step.condition {
                line.push_str(&format!(" when {}", style(condition).italic()));
            }
            line
        })
        .collect()
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted { run_id, steps } => format!(
            "{} Starting run {} ({} steps)",
            ROCKET,
            style(&run_id.to_string()[..8]).dim(),
            steps
        ),
        ExecutionEvent::StepSkipped { step, reason } => {
            format!("{} {} skipped: {}", SKIP, style(step).dim(), reason)
        }
        ExecutionEvent::StepStarted { step, .. } => {
            format!("{} {}", SPINNER, style(step).cyan())
        }
        ExecutionEvent::StepRetrying {
            step,
            attempt,
            feedback,
        } => format!(
            "{} {} retrying (attempt {}): {}",
            WARN,
            style(step).yellow(),
            attempt,
            style(feedback).dim()
        ),
        ExecutionEvent::ToolInvoked { step, outcome } => {
            let status = match &outcome.status {
                ToolStatus::Completed { .. } => style(outcome.status.label()).green(),
                _ => style(outcome.status.label()).yellow(),
            };
            format!(
                "    {} {} {} {}",
                style("↳").dim(),
                style(&outcome.tool).cyan(),
                status,
                style(format!("({})", step)).dim()
            )
        }
        ExecutionEvent::StepAccepted { step, attempts } => {
            if *attempts > 1 {
                format!(
                    "{} {} accepted after {} attempts",
                    CHECK,
                    style(step).green(),
                    attempts
                )
            } else {
                format!("{} {} accepted", CHECK, style(step).green())
            }
        }
        ExecutionEvent::StepRejected { step, kind, detail } => format!(
            "{} {} rejected ({}): {}",
            CROSS,
            style(step).red(),
            kind,
            style(detail).dim()
        ),
        ExecutionEvent::RunFinished { run_id, status } => format!(
            "{} Run {} {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            format_status(*status)
        ),
    }
}

/// Human-readable run result
pub fn format_run_result(result: &RunResult) -> Vec<String> {
    let mut lines = vec![format!(
        "{} Run {} {}",
        if result.is_completed() { CHECK } else { CROSS },
        style(result.run_id).dim(),
        format_status(result.status)
    )];

    for report in &result.steps {
        lines.push(format!(
            "  {:>3}. {} {}",
            report.order,
            style(&report.identifier).bold(),
            format_step_state(&report.state)
        ));
        if let StepState::Accepted { tool_gaps, .. } = &report.state {
            for gap in tool_gaps {
                lines.push(format!(
                    "       {} {}: {}",
                    WARN,
                    style(&gap.tool).yellow(),
                    style(&gap.reason).dim()
                ));
            }
        }
    }

    if let Some(halt) = &result.halted {
        lines.push(format!(
            "{} Halted at {} ({}): {}",
            CROSS,
            style(&halt.step).red().bold(),
            halt.kind,
            halt.detail
        ));
    }

    for line in result.summary() {
        lines.push(format!("{} {}", WARN, line));
    }

    lines
}
