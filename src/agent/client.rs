//! Reasoning provider client configuration

use serde::{Deserialize, Serialize};

/// Configuration for the subprocess reasoning provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentClientConfig {
    /// Program to run. The rendered prompt is passed as its last argument.
    ///
    /// If not provided, defaults to "claude" (assumes it's on PATH).
    pub program: Option<String>,

    /// Arguments placed before the prompt
    pub args: Vec<String>,

    /// Timeout for one provider call in seconds
    pub timeout_secs: u64,
}

pub const DEFAULT_PROGRAM: &str = "claude";

impl Default for AgentClientConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: vec!["-p".to_string()],
            timeout_secs: 600,
        }
    }
}

impl AgentClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn program_or_default(&self) -> &str {
        self.program.as_deref().unwrap_or(DEFAULT_PROGRAM)
    }
}
