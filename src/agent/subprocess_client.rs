//! Subprocess client - runs an external program and captures stdout

use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with code {code}: {stderr}")]
    Exit {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to decode output of `{program}`: {reason}")]
    Decode { program: String, reason: String },

    #[error("timed out after {0} seconds")]
    Timeout(u64),
}

/// Client for executing a program as a subprocess
#[derive(Debug, Clone)]
pub struct SubprocessClient {
    program: String,

    /// Fixed leading arguments
    args: Vec<String>,

    /// Timeout for command execution in seconds
    timeout_secs: u64,
}

impl SubprocessClient {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            args,
            timeout_secs,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run `<program> <args...> <extra...>` and return stdout.
    ///
    /// The child is killed if the timeout elapses or the future is dropped.
    pub async fn execute(&self, extra: &[&str]) -> Result<String, SubprocessError> {
        debug!(
            "Spawning {} with {} extra argument bytes",
            self.program,
            extra.iter().map(|a| a.len()).sum::<usize>()
        );

        let result = timeout(
            Duration::from_secs(self.timeout_secs),
            Command::new(&self.program)
                .args(&self.args)
                .args(extra)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| SubprocessError::Timeout(self.timeout_secs))?;

        let output = result.map_err(|source| SubprocessError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output.status.code().unwrap_or(-1);
            warn!("{} exited with code {}: {}", self.program, code, stderr);
            return Err(SubprocessError::Exit {
                program: self.program.clone(),
                code,
                stderr,
            });
        }

        let content = String::from_utf8(output.stdout).map_err(|e| SubprocessError::Decode {
            program: self.program.clone(),
            reason: e.to_string(),
        })?;

        debug!("{} returned {} bytes of output", self.program, content.len());

        Ok(content)
    }
}
