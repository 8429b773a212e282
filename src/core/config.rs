//! Engine configuration from YAML

use crate::agent::AgentClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use anyhow::Result;

/// Hard cap on provider retries per step
pub const MAX_RETRY_CAP: u32 = 2;

/// Top-level engine configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the step definition documents
    pub skills_dir: PathBuf,

    pub retry: RetryPolicy,

    /// Default reasoning timeout per step (in seconds)
    pub step_timeout_secs: u64,

    /// Timeout for a single tool invocation (in seconds)
    pub tool_timeout_secs: u64,

    /// What a rejected step does to the rest of the run
    pub on_rejection: RejectionPolicy,

    /// Subprocess reasoning provider
    pub agent: AgentClientConfig,

    /// Subprocess tool backend; tools are reported unverified without one
    pub tools: Option<ToolSettings>,

    /// JSON-lines file the tool audit log is appended to
    pub audit_log: Option<PathBuf>,
}

/// Retry-with-feedback policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Additional provider calls after a rejected attempt
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Retries actually allowed, never above the cap
    pub fn effective_retries(&self) -> u32 {
        self.max_retries.min(MAX_RETRY_CAP)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Dependents of a rejected step are skipped; independent steps still run
    #[default]
    PropagateSkip,
    /// The first rejected step halts the run
    Halt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Program invoked as `<program> [args...] <tool_name> <args_json>`
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            skills_dir: PathBuf::from("skills"),
            retry: RetryPolicy::default(),
            step_timeout_secs: 300,
            tool_timeout_secs: 30,
            on_rejection: RejectionPolicy::default(),
            agent: AgentClientConfig::default(),
            tools: None,
            audit_log: None,
        }
    }
}

impl EngineConfig {
    /// Load engine configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse engine configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the engine configuration
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_retries > MAX_RETRY_CAP {
            anyhow::bail!(
                "retry.max_retries is {} but at most {} retries are allowed",
                self.retry.max_retries,
                MAX_RETRY_CAP
            );
        }

        if self.step_timeout_secs == 0 {
            anyhow::bail!("step_timeout_secs must be greater than zero");
        }

        if self.tool_timeout_secs == 0 {
            anyhow::bail!("tool_timeout_secs must be greater than zero");
        }

        if let Some(tools) = &self.tools {
            if tools.program.trim().is_empty() {
                anyhow::bail!("tools.program must not be empty");
            }
        }

        Ok(())
    }
}
