//! Tool backends

use crate::agent::subprocess_client::{SubprocessClient, SubprocessError};
use crate::tools::{ToolArgs, ToolError};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Executes external lookups. The wire format of the underlying services is
/// the backend's business; the dispatcher only sees names, scalar arguments
/// and JSON results.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn invoke(&self, tool: &str, args: &ToolArgs) -> Result<Value, ToolError>;
}

/// Runs `<program> [args...] <tool_name> <args_json>` and reads a JSON
/// result from stdout
#[derive(Debug, Clone)]
pub struct SubprocessToolBackend {
    client: SubprocessClient,
}

impl SubprocessToolBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            client: SubprocessClient::new(program, args, timeout_secs),
        }
    }
}

#[async_trait]
impl ToolBackend for SubprocessToolBackend {
    async fn invoke(&self, tool: &str, args: &ToolArgs) -> Result<Value, ToolError> {
        let failed = |reason: String| ToolError::Failed {
            tool: tool.to_string(),
            reason,
        };

        let args_json = serde_json::to_string(args).map_err(|e| failed(e.to_string()))?;
        let stdout = self
            .client
            .execute(&[tool, args_json.as_str()])
            .await
            .map_err(|e| match e {
                SubprocessError::Timeout(secs) => ToolError::Timeout {
                    tool: tool.to_string(),
                    secs,
                },
                other => failed(other.to_string()),
            })?;

        debug!("Tool {} returned {} bytes", tool, stdout.len());
        let result: Value = serde_json::from_str(stdout.trim())
            .map_err(|e| failed(format!("result is not JSON: {}", e)))?;

        // An explicit null is "no result", which must not pass for a lookup
        if result.is_null() {
            return Err(failed("no result".to_string()));
        }
        Ok(result)
    }
}
