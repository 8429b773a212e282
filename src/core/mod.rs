//! Core domain models
//!
//! Step definitions and their registry, declared schemas, gating
//! conditions, the per-run state store and run results.

pub mod condition;
pub mod config;
pub mod definition;
pub mod error;
pub mod path;
pub mod registry;
pub mod result;
pub mod schema;
pub mod state;
pub mod store;

pub use condition::{Condition, ConditionError, ConditionTest};
pub use config::{EngineConfig, RejectionPolicy, RetryPolicy, ToolSettings, MAX_RETRY_CAP};
pub use definition::{DeclaredSchema, DefinitionSource, StepDefinition};
pub use error::{DefinitionError, EngineError};
pub use registry::StepRegistry;
pub use result::{HaltInfo, RunResult, StepReport};
pub use schema::{validate, Schema, ValidationError, Violation, ViolationKind};
pub use state::{RunState, RunStatus, SkipReason, StepErrorKind, StepState};
pub use store::{RawInput, SourceDocument, StateSnapshot, StateStore, StepOutput, StoreError};
