//! Run orchestration
//!
//! The engine walks the registry in order, gating each step on its
//! condition, projecting its input from earlier outputs and handing it to
//! the executor, which owns tool lookups, provider attempts and the schema
//! gate.

pub mod cancel;
pub mod engine;
pub mod events;
pub mod executor;

pub use cancel::CancelHandle;
pub use engine::{ExecutionEngine, ExecutionEngineBuilder};
pub use events::{EventHandler, ExecutionEvent};
pub use executor::{ExecutionResult, StepExecutor};
