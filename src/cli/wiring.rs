//! Engine wiring shared by the `run` and `validate` commands

use crate::agent::SubprocessReasoner;
use crate::core::{EngineConfig, StepRegistry};
use crate::execution::{ExecutionEngine, ExecutionEngineBuilder};
use crate::persistence::{AuditLog, JsonlAuditLog, TracingAuditLog};
use crate::projection::{InputProjector, Projection};
use crate::tools::{SubprocessToolBackend, ToolBackend, ToolDispatcher};
use std::sync::Arc;

/// Wire the registry to the subprocess reasoner, the prior-authorization
/// projection table and tool catalogue.
///
/// Steps outside the table read the documents and every earlier payload;
/// tool grants for table steps the registry lacks are dropped.
pub fn build_engine(registry: Arc<StepRegistry>, config: &EngineConfig) -> ExecutionEngineBuilder {
    let backend: Option<Arc<dyn ToolBackend>> = config.tools.as_ref().map(|tools| {
        Arc::new(SubprocessToolBackend::new(
            tools.program.clone(),
            tools.args.clone(),
            config.tool_timeout_secs,
        )) as Arc<dyn ToolBackend>
    });
    let audit: Arc<dyn AuditLog> = match &config.audit_log {
        Some(path) => Arc::new(JsonlAuditLog::new(path.clone())),
        None => Arc::new(TracingAuditLog),
    };
    let tools = ToolDispatcher::prior_authorization(backend)
        .retain_registered(&registry)
        .with_audit_log(audit)
        .with_timeout(config.tool_timeout_secs);
    let projector = InputProjector::prior_authorization().with_fallback(Projection::accumulated());

    ExecutionEngine::builder()
        .registry(registry)
        .provider(Arc::new(SubprocessReasoner::new(config.agent.clone())))
        .projector(projector)
        .tools(tools)
        .config(config)
}
