//! Tool dispatcher
//!
//! Steps that use tools get a fixed set of permitted lookups. Each tool
//! declares where its arguments come from in the step's logical input; the
//! dispatcher derives the calls, skips those whose source field is absent,
//! and records every attempt in the audit log.

pub mod backend;
pub mod catalog;
pub mod dispatcher;
pub mod spec;

pub use backend::{SubprocessToolBackend, ToolBackend};
pub use dispatcher::ToolDispatcher;
pub use spec::{ArgRule, ArgSource, ToolSpec};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Scalar arguments of one tool invocation
pub type ToolArgs = BTreeMap<String, Value>;

/// Errors from tool resolution and invocation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolError {
    #[error("tool `{tool}` skipped: argument `{argument}` has no value in the step input")]
    MissingToolArgument { tool: String, argument: String },

    #[error("unknown tool `{0}`")]
    UnknownTool(String),

    #[error("step `{step}` is not permitted to call `{tool}`")]
    NotPermitted { step: String, tool: String },

    #[error("tool `{tool}` failed: {reason}")]
    Failed { tool: String, reason: String },

    #[error("tool `{tool}` timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },
}

/// What happened to one planned tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolStatus {
    Completed { result: Value },
    /// Not invoked: the argument's source field was absent
    Skipped { missing_argument: String },
    /// Invoked but produced no usable result
    Unverified { error: String },
}

impl ToolStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ToolStatus::Completed { .. } => "completed",
            ToolStatus::Skipped { .. } => "skipped",
            ToolStatus::Unverified { .. } => "unverified",
        }
    }
}

/// A tool call (or skipped call) as reported to the reasoning provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool: String,
    pub args: ToolArgs,
    #[serde(flatten)]
    pub status: ToolStatus,
}

impl ToolOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, ToolStatus::Completed { .. })
    }

    /// The gap this outcome leaves, if the lookup did not complete
    pub fn gap(&self) -> Option<ToolGap> {
        let reason = match &self.status {
            ToolStatus::Completed { .. } => return None,
            ToolStatus::Skipped { missing_argument } => {
                format!("skipped: no value for `{}`", missing_argument)
            }
            ToolStatus::Unverified { error } => format!("unverified: {}", error),
        };
        Some(ToolGap {
            tool: self.tool.clone(),
            reason,
        })
    }
}

/// A lookup the step had to proceed without
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolGap {
    pub tool: String,
    pub reason: String,
}
