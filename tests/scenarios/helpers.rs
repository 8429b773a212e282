//! Shared fixtures for scenario tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use skillflow::agent::{ReasoningError, ReasoningProvider, ReasoningRequest};
use skillflow::core::{
    RawInput, RunResult, Schema, SkipReason, StepDefinition, StepErrorKind, StepRegistry,
    StepState,
};
use skillflow::execution::{ExecutionEngine, ExecutionEngineBuilder, ExecutionEvent};
use skillflow::projection::{Binding, InputProjector, Projection};
use skillflow::tools::{ToolArgs, ToolBackend, ToolError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Reasoning provider that replays scripted replies per step
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<HashMap<String, VecDeque<Result<Value, ReasoningError>>>>,
    requests: Mutex<Vec<ReasoningRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for a step
    pub fn reply(self, step: &str, payload: Value) -> Self {
        self.push(step, Ok(payload))
    }

    /// Queue a failure for a step
    pub fn fail(self, step: &str, error: ReasoningError) -> Self {
        self.push(step, Err(error))
    }

    /// Sleep before answering, to leave room for cancellation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(self, step: &str, reply: Result<Value, ReasoningError>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(step.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, step: &str) -> Vec<ReasoningRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.step_identifier == step)
            .collect()
    }

    /// Step identifiers in the order the provider was called
    pub fn calls(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| r.step_identifier)
            .collect()
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedProvider {
    async fn reason(&self, request: &ReasoningRequest) -> Result<Value, ReasoningError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&request.step_identifier)
            .and_then(VecDeque::pop_front);
        reply.unwrap_or_else(|| {
            Err(ReasoningError::Internal(format!(
                "no scripted reply for {}",
                request.step_identifier
            )))
        })
    }
}

/// Tool backend with canned results that records every call
#[derive(Default)]
pub struct MockToolBackend {
    results: HashMap<String, Result<Value, String>>,
    calls: Mutex<Vec<(String, ToolArgs)>>,
}

impl MockToolBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, tool: &str, result: Value) -> Self {
        self.results.insert(tool.to_string(), Ok(result));
        self
    }

    pub fn with_failure(mut self, tool: &str, reason: &str) -> Self {
        self.results.insert(tool.to_string(), Err(reason.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<(String, ToolArgs)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, tool: &str) -> usize {
        self.calls().iter().filter(|(name, _)| name == tool).count()
    }
}

#[async_trait]
impl ToolBackend for MockToolBackend {
    async fn invoke(&self, tool: &str, args: &ToolArgs) -> Result<Value, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((tool.to_string(), args.clone()));
        match self.results.get(tool) {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(reason)) => Err(ToolError::Failed {
                tool: tool.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(json!({"found": true, "tool": tool})),
        }
    }
}

/// Collects every event an engine emits
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<ExecutionEvent>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(&self) -> impl Fn(&ExecutionEvent) + Send + Sync + 'static {
        let events = self.0.clone();
        move |event| events.lock().unwrap().push(event.clone())
    }

    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.0.lock().unwrap().clone()
    }
}

pub fn step(id: &str, order: u32, shape: Value) -> StepDefinition {
    StepDefinition::new(id, order, Schema::from_shape(&shape))
        .with_description(format!("{} step", id))
        .with_role(format!("{} role", id))
        .with_instructions(format!("Do the work of {}.", id))
}

pub fn registry(steps: Vec<StepDefinition>) -> Arc<StepRegistry> {
    Arc::new(StepRegistry::from_definitions(steps).expect("registry loads"))
}

/// The first step reads the documents, every later one the payload of the
/// step before it
pub fn chain_projector(ids: &[&str]) -> InputProjector {
    ids.iter()
        .enumerate()
        .fold(InputProjector::new(), |projector, (i, id)| {
            let projection = if i == 0 {
                Projection::new().bind("documents", Binding::Documents)
            } else {
                Projection::new().bind("previous", Binding::payload(ids[i - 1]))
            };
            projector.with_rule(*id, projection)
        })
}

pub fn builder(
    registry: Arc<StepRegistry>,
    provider: Arc<dyn ReasoningProvider>,
    projector: InputProjector,
) -> ExecutionEngineBuilder {
    ExecutionEngine::builder()
        .registry(registry)
        .provider(provider)
        .projector(projector)
        .step_timeout(5)
}

pub fn engine(
    registry: Arc<StepRegistry>,
    provider: Arc<dyn ReasoningProvider>,
    projector: InputProjector,
) -> ExecutionEngine {
    builder(registry, provider, projector)
        .build()
        .expect("engine builds")
}

pub fn case_documents() -> RawInput {
    RawInput::new()
        .with_document("referral_fax.txt", "Lumbar ESI requested for L4-L5 radiculopathy")
        .with_document("clinical_notes.txt", "Six weeks of physical therapy without relief")
}

pub fn assert_accepted<'a>(result: &'a RunResult, step: &str) -> &'a Value {
    match result.state(step) {
        Some(StepState::Accepted { payload, .. }) => payload,
        other => panic!("expected {} ACCEPTED, got {:?}", step, other),
    }
}

pub fn assert_skipped<'a>(result: &'a RunResult, step: &str) -> &'a SkipReason {
    match result.state(step) {
        Some(StepState::Skipped { reason }) => reason,
        other => panic!("expected {} SKIPPED, got {:?}", step, other),
    }
}

pub fn assert_rejected<'a>(result: &'a RunResult, step: &str, kind: StepErrorKind) -> &'a str {
    match result.state(step) {
        Some(StepState::Rejected {
            kind: actual,
            detail,
            ..
        }) => {
            assert_eq!(*actual, kind, "{} rejected with the wrong kind: {}", step, detail);
            detail
        }
        other => panic!("expected {} REJECTED, got {:?}", step, other),
    }
}
