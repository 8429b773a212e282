//! Main execution engine - orchestrates one run over the step registry

use crate::{
    agent::ReasoningProvider,
    core::{
        condition,
        config::{EngineConfig, RejectionPolicy, RetryPolicy},
        definition::StepDefinition,
        error::EngineError,
        path::contains_unverified,
        registry::StepRegistry,
        result::{HaltInfo, RunResult, StepReport},
        state::{RunState, SkipReason, StepErrorKind, StepState},
        store::{RawInput, StateStore},
    },
    execution::{CancelHandle, EventHandler, ExecutionEvent, ExecutionResult, StepExecutor},
    projection::{InputProjector, ProjectionError},
    tools::ToolDispatcher,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

const DEFAULT_STEP_TIMEOUT_SECS: u64 = 300;

/// Terminal state of one step plus the halt it causes, if any
struct StepOutcome {
    state: StepState,
    halt: Option<HaltInfo>,
}

impl StepOutcome {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            state: StepState::Skipped { reason },
            halt: None,
        }
    }

    fn rejected(step: &StepDefinition, kind: StepErrorKind, detail: String, attempts: u32, halts: bool) -> Self {
        let halt = halts.then(|| HaltInfo {
            step: step.identifier.clone(),
            kind,
            detail: detail.clone(),
        });
        Self {
            state: StepState::Rejected {
                kind,
                detail,
                attempts,
                violations: Vec::new(),
            },
            halt,
        }
    }
}

/// Run orchestrator.
///
/// Holds only read-only collaborators, so one engine can serve any number
/// of concurrent runs; each run owns its own [`StateStore`].
pub struct ExecutionEngine {
    registry: Arc<StepRegistry>,
    projector: InputProjector,
    executor: StepExecutor,
    on_rejection: RejectionPolicy,
    event_handlers: Vec<EventHandler>,
}

impl ExecutionEngine {
    pub fn builder() -> ExecutionEngineBuilder {
        ExecutionEngineBuilder::default()
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    /// Execute every step once, in order
    pub async fn run(&self, raw_input: RawInput) -> RunResult {
        self.run_with_cancel(raw_input, &CancelHandle::new()).await
    }

    /// Execute every step once, in order, stopping when `cancel` fires
    pub async fn run_with_cancel(&self, raw_input: RawInput, cancel: &CancelHandle) -> RunResult {
        let mut run = RunState::new();
        let run_id = run.run_id;
        let mut store = StateStore::new(raw_input);
        let mut reports = Vec::with_capacity(self.registry.len());
        let mut halted: Option<HaltInfo> = None;

        info!(
            "Starting run {} ({} steps, {} documents)",
            run_id,
            self.registry.len(),
            store.raw_input().documents.len()
        );
        run.start();
        self.emit_event(ExecutionEvent::RunStarted {
            run_id,
            steps: self.registry.len(),
        });

        let emit = |event: ExecutionEvent| self.emit_event(event);

        for step in self.registry.steps() {
            if halted.is_none() && cancel.is_cancelled() {
                warn!("Run {} cancelled before step {}", run_id, step.identifier);
                halted = Some(HaltInfo {
                    step: step.identifier.clone(),
                    kind: StepErrorKind::Cancelled,
                    detail: "run cancelled before this step started".to_string(),
                });
            }

            let outcome = if halted.is_some() {
                StepOutcome::skipped(SkipReason::RunHalted)
            } else {
                self.run_step(run_id, step, &mut store, cancel, &emit).await
            };

            if let StepState::Skipped { reason } = &outcome.state {
                emit(ExecutionEvent::StepSkipped {
                    step: step.identifier.clone(),
                    reason: reason.clone(),
                });
            }
            if let Some(halt) = outcome.halt {
                error!("Run {} halted at {}: {}", run_id, halt.step, halt.detail);
                halted = Some(halt);
            }

            reports.push(StepReport {
                identifier: step.identifier.clone(),
                order: step.order,
                state: outcome.state,
            });
        }

        if halted.is_some() {
            run.halt();
        } else {
            run.complete();
        }

        info!("Run {} finished: {:?}", run_id, run.status);
        self.emit_event(ExecutionEvent::RunFinished {
            run_id,
            status: run.status,
        });

        RunResult {
            run_id,
            status: run.status,
            steps: reports,
            outputs: store.snapshot().to_map(),
            halted,
            started_at: run.started_at,
            finished_at: run.finished_at,
        }
    }

    /// Gate, project, execute and record a single step
    async fn run_step(
        &self,
        run_id: Uuid,
        step: &StepDefinition,
        store: &mut StateStore,
        cancel: &CancelHandle,
        emit: &(dyn Fn(ExecutionEvent) + Send + Sync),
    ) -> StepOutcome {
        let snapshot = store.snapshot_before(step.order);

        if !condition::evaluate(step.condition.as_ref(), &snapshot) {
            let condition = step
                .condition
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            info!("Skipping {}: condition `{}` is false", step.identifier, condition);
            return StepOutcome::skipped(SkipReason::ConditionFalse { condition });
        }

        let input = match self.projector.project(&step.identifier, &snapshot) {
            Ok(input) => input,
            Err(ProjectionError::MissingDependency { dependency, .. }) if step.mandatory => {
                let detail = format!("mandatory step has no output from `{}`", dependency);
                error!("{}: {}", step.identifier, detail);
                emit(ExecutionEvent::StepRejected {
                    step: step.identifier.clone(),
                    kind: StepErrorKind::MissingDependency,
                    detail: detail.clone(),
                });
                return StepOutcome::rejected(step, StepErrorKind::MissingDependency, detail, 0, true);
            }
            Err(ProjectionError::MissingDependency { dependency, .. }) => {
                warn!("Skipping {}: `{}` has no output", step.identifier, dependency);
                return StepOutcome::skipped(SkipReason::MissingDependency { dependency });
            }
            Err(e) => {
                error!("{}: {}", step.identifier, e);
                return StepOutcome::rejected(step, StepErrorKind::InvariantViolation, e.to_string(), 0, true);
            }
        };

        let result = self
            .executor
            .execute(run_id, step, input, cancel, emit)
            .await;

        match result {
            ExecutionResult::Accepted {
                payload,
                attempts,
                tool_outcomes,
            } => {
                let unverified = contains_unverified(&payload);
                let produced_at = match store.put(&step.identifier, step.order, payload.clone()) {
                    Ok(output) => output.produced_at,
                    Err(e) => {
                        error!("{}: {}", step.identifier, e);
                        return StepOutcome::rejected(
                            step,
                            StepErrorKind::InvariantViolation,
                            e.to_string(),
                            attempts,
                            true,
                        );
                    }
                };
                let tool_gaps: Vec<_> = tool_outcomes.iter().filter_map(|o| o.gap()).collect();
                if !tool_gaps.is_empty() {
                    warn!(
                        "{} accepted with {} unverified lookup(s)",
                        step.identifier,
                        tool_gaps.len()
                    );
                }

                emit(ExecutionEvent::StepAccepted {
                    step: step.identifier.clone(),
                    attempts,
                });
                StepOutcome {
                    state: StepState::Accepted {
                        payload,
                        attempts,
                        produced_at,
                        tool_gaps,
                        unverified,
                    },
                    halt: None,
                }
            }
            ExecutionResult::Rejected {
                kind,
                detail,
                violations,
                attempts,
                ..
            } => {
                emit(ExecutionEvent::StepRejected {
                    step: step.identifier.clone(),
                    kind,
                    detail: detail.clone(),
                });
                let halts = step.mandatory
                    || cancel.is_cancelled()
                    || self.on_rejection == RejectionPolicy::Halt;
                let mut outcome = StepOutcome::rejected(step, kind, detail, attempts, halts);
                if let StepState::Rejected { violations: v, .. } = &mut outcome.state {
                    *v = violations;
                }
                outcome
            }
        }
    }
}

/// Assembles an [`ExecutionEngine`] and checks its parts fit together
pub struct ExecutionEngineBuilder {
    registry: Option<Arc<StepRegistry>>,
    provider: Option<Arc<dyn ReasoningProvider>>,
    projector: Option<InputProjector>,
    tools: ToolDispatcher,
    retry: RetryPolicy,
    step_timeout_secs: u64,
    on_rejection: RejectionPolicy,
    event_handlers: Vec<EventHandler>,
}

impl Default for ExecutionEngineBuilder {
    fn default() -> Self {
        Self {
            registry: None,
            provider: None,
            projector: None,
            tools: ToolDispatcher::default(),
            retry: RetryPolicy::default(),
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            on_rejection: RejectionPolicy::default(),
            event_handlers: Vec::new(),
        }
    }
}

impl ExecutionEngineBuilder {
    pub fn registry(mut self, registry: Arc<StepRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ReasoningProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn projector(mut self, projector: InputProjector) -> Self {
        self.projector = Some(projector);
        self
    }

    pub fn tools(mut self, tools: ToolDispatcher) -> Self {
        self.tools = tools;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn step_timeout(mut self, secs: u64) -> Self {
        self.step_timeout_secs = secs;
        self
    }

    pub fn on_rejection(mut self, policy: RejectionPolicy) -> Self {
        self.on_rejection = policy;
        self
    }

    /// Apply retry, timeout and rejection settings from a config file
    pub fn config(self, config: &EngineConfig) -> Self {
        self.retry(config.retry)
            .step_timeout(config.step_timeout_secs)
            .on_rejection(config.on_rejection)
    }

    /// Add an event handler
    pub fn on_event<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    /// Check every registry step has a projection rule whose dependencies
    /// all run before it, and every tool grant is sound
    pub fn build(self) -> Result<ExecutionEngine, EngineError> {
        let registry = self.registry.ok_or(EngineError::Incomplete("step registry"))?;
        let provider = self.provider.ok_or(EngineError::Incomplete("reasoning provider"))?;
        let projector = self.projector.ok_or(EngineError::Incomplete("projection table"))?;

        for step in registry.steps() {
            let rule = projector
                .rule_for(&step.identifier)
                .ok_or_else(|| EngineError::InvalidProjection {
                    step: step.identifier.clone(),
                    reason: "no projection rule".to_string(),
                })?;
            for dependency in rule.dependencies() {
                match registry.order_of(dependency) {
                    None => {
                        return Err(EngineError::InvalidProjection {
                            step: step.identifier.clone(),
                            reason: format!("depends on unknown step `{}`", dependency),
                        })
                    }
                    Some(order) if order >= step.order => {
                        return Err(EngineError::InvalidProjection {
                            step: step.identifier.clone(),
                            reason: format!(
                                "depends on `{}` (order {}) which does not run before it (order {})",
                                dependency, order, step.order
                            ),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        self.tools.validate_against(&registry)?;

        info!(
            "Engine ready: {} steps, {} retries, {}s step timeout",
            registry.len(),
            self.retry.effective_retries(),
            self.step_timeout_secs
        );

        Ok(ExecutionEngine {
            registry,
            projector,
            executor: StepExecutor::new(provider, Arc::new(self.tools), self.retry, self.step_timeout_secs),
            on_rejection: self.on_rejection,
            event_handlers: self.event_handlers,
        })
    }
}
