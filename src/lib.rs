//! skillflow - ordered, condition-gated, schema-validated step orchestration
//! for skill-driven reasoning pipelines

pub mod agent;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod projection;
pub mod tools;

// Re-export commonly used types
pub use agent::{ReasoningError, ReasoningProvider, ReasoningRequest, SubprocessReasoner};
pub use core::{
    EngineConfig, RawInput, RunResult, RunStatus, StepDefinition, StepRegistry, StepState,
};
pub use execution::{CancelHandle, ExecutionEngine, ExecutionEvent};
pub use projection::{Binding, InputProjector, Projection};
pub use tools::{ToolBackend, ToolDispatcher};
