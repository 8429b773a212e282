//! Step executor - runs one step's tools and reasoning attempts

use crate::{
    agent::{ReasoningError, ReasoningProvider, ReasoningRequest},
    core::{
        config::RetryPolicy,
        definition::StepDefinition,
        schema::{self, Violation},
        state::StepErrorKind,
    },
    execution::{CancelHandle, ExecutionEvent},
    tools::{ToolDispatcher, ToolOutcome},
};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Result of executing a step
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// A candidate passed the output schema
    Accepted {
        payload: Value,
        attempts: u32,
        tool_outcomes: Vec<ToolOutcome>,
    },
    /// No acceptable output; nothing may be stored
    Rejected {
        kind: StepErrorKind,
        detail: String,
        violations: Vec<Violation>,
        attempts: u32,
        tool_outcomes: Vec<ToolOutcome>,
    },
}

/// Why one attempt failed
struct AttemptFailure {
    kind: StepErrorKind,
    detail: String,
    violations: Vec<Violation>,
    retryable: bool,
}

impl AttemptFailure {
    fn fatal(kind: StepErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            violations: Vec::new(),
            retryable: false,
        }
    }
}

/// Executes a single step
pub struct StepExecutor {
    provider: Arc<dyn ReasoningProvider>,
    tools: Arc<ToolDispatcher>,
    retry: RetryPolicy,
    default_timeout_secs: u64,
}

impl StepExecutor {
    pub fn new(
        provider: Arc<dyn ReasoningProvider>,
        tools: Arc<ToolDispatcher>,
        retry: RetryPolicy,
        default_timeout_secs: u64,
    ) -> Self {
        Self {
            provider,
            tools,
            retry,
            default_timeout_secs,
        }
    }

    /// Run the step's permitted tools once, then ask the provider for a
    /// payload until one validates or the retry budget is spent.
    pub async fn execute(
        &self,
        run_id: Uuid,
        step: &StepDefinition,
        input: Value,
        cancel: &CancelHandle,
        emit: &(dyn Fn(ExecutionEvent) + Send + Sync),
    ) -> ExecutionResult {
        info!("Executing step: {}", step.identifier);

        let tool_outcomes = if step.uses_tools {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Step {} cancelled during tool lookups", step.identifier);
                    return ExecutionResult::Rejected {
                        kind: StepErrorKind::Cancelled,
                        detail: "cancelled during tool lookups".to_string(),
                        violations: Vec::new(),
                        attempts: 0,
                        tool_outcomes: Vec::new(),
                    };
                }
                outcomes = self.tools.run_for_step(run_id, &step.identifier, &input) => outcomes,
            }
        } else {
            Vec::new()
        };

        for outcome in &tool_outcomes {
            emit(ExecutionEvent::ToolInvoked {
                step: step.identifier.clone(),
                outcome: outcome.clone(),
            });
        }

        let max_attempts = 1 + self.retry.effective_retries();
        let timeout_secs = step.timeout_secs.unwrap_or(self.default_timeout_secs);
        let mut request = ReasoningRequest::for_step(run_id, step, input, tool_outcomes.clone());

        emit(ExecutionEvent::StepStarted {
            step: step.identifier.clone(),
            attempt: 1,
        });

        loop {
            let attempt = request.attempt;
            let failure = match self.attempt(&request, timeout_secs, cancel).await {
                Ok(payload) => {
                    info!(
                        "Step {} accepted on attempt {}",
                        step.identifier, attempt
                    );
                    return ExecutionResult::Accepted {
                        payload,
                        attempts: attempt,
                        tool_outcomes,
                    };
                }
                Err(failure) => failure,
            };

            if failure.retryable && attempt < max_attempts {
                warn!(
                    "Step {} attempt {}/{} rejected: {}",
                    step.identifier, attempt, max_attempts, failure.detail
                );
                emit(ExecutionEvent::StepRetrying {
                    step: step.identifier.clone(),
                    attempt: attempt + 1,
                    feedback: failure.detail.clone(),
                });
                request = request.retry(failure.detail);
                continue;
            }

            error!(
                "Step {} rejected ({}): {}",
                step.identifier, failure.kind, failure.detail
            );
            return ExecutionResult::Rejected {
                kind: failure.kind,
                detail: failure.detail,
                violations: failure.violations,
                attempts: attempt,
                tool_outcomes,
            };
        }
    }

    /// One provider call, raced against cancellation and bounded by the
    /// step timeout, followed by the schema gate
    async fn attempt(
        &self,
        request: &ReasoningRequest,
        timeout_secs: u64,
        cancel: &CancelHandle,
    ) -> Result<Value, AttemptFailure> {
        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ReasoningError::Cancelled),
            reply = timeout(Duration::from_secs(timeout_secs), self.provider.reason(request)) => {
                reply.unwrap_or(Err(ReasoningError::Timeout(timeout_secs)))
            }
        };

        let candidate = match reply {
            Ok(candidate) => candidate,
            Err(ReasoningError::MalformedOutput(detail)) => {
                return Err(AttemptFailure {
                    kind: StepErrorKind::MalformedOutput,
                    detail: format!("output is not a JSON object: {}", detail),
                    violations: Vec::new(),
                    retryable: true,
                });
            }
            Err(ReasoningError::Cancelled) => {
                return Err(AttemptFailure::fatal(
                    StepErrorKind::Cancelled,
                    "cancelled during reasoning",
                ));
            }
            Err(ReasoningError::Timeout(secs)) => {
                return Err(AttemptFailure::fatal(
                    StepErrorKind::Cancelled,
                    format!("reasoning timed out after {} seconds", secs),
                ));
            }
            Err(e) => return Err(AttemptFailure::fatal(StepErrorKind::ProviderError, e.to_string())),
        };

        debug!("Candidate for {}: {}", request.step_identifier, candidate);

        schema::validate(&candidate, &request.output_schema)
            .map(|()| candidate)
            .map_err(|e| AttemptFailure {
                kind: StepErrorKind::ValidationError,
                detail: e.to_string(),
                violations: e.violations,
                retryable: true,
            })
    }
}
