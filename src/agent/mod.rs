//! Reasoning provider contract and the subprocess-backed provider

pub mod client;
pub mod output_parse;
pub mod prompt;
pub mod request;
pub mod response;
pub mod subprocess_client;

use async_trait::async_trait;
pub use client::AgentClientConfig;
pub use output_parse::extract_json_object;
pub use prompt::render_prompt;
pub use request::ReasoningRequest;
pub use response::ReasoningError;
use serde_json::Value;
pub use subprocess_client::{SubprocessClient, SubprocessError};
use tracing::debug;

/// Produces a candidate output for one step attempt.
///
/// The returned value is untrusted: the engine validates it against the
/// step's output schema before accepting it.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    async fn reason(&self, request: &ReasoningRequest) -> Result<Value, ReasoningError>;
}

/// Reasoning provider that runs a program with the rendered prompt as its
/// last argument and parses a JSON object out of stdout
#[derive(Debug, Clone)]
pub struct SubprocessReasoner {
    client: SubprocessClient,
    timeout_secs: u64,
}

impl SubprocessReasoner {
    pub fn new(config: AgentClientConfig) -> Self {
        let client = SubprocessClient::new(
            config.program_or_default(),
            config.args.clone(),
            config.timeout_secs,
        );
        Self {
            client,
            timeout_secs: config.timeout_secs,
        }
    }

    pub fn program(&self) -> &str {
        self.client.program()
    }
}

#[async_trait]
impl ReasoningProvider for SubprocessReasoner {
    async fn reason(&self, request: &ReasoningRequest) -> Result<Value, ReasoningError> {
        let prompt = render_prompt(request);
        debug!(
            "Prompt for {} (attempt {}):\n{}",
            request.step_identifier, request.attempt, prompt
        );

        let content = self
            .client
            .execute(&[prompt.as_str()])
            .await
            .map_err(|e| match e {
                SubprocessError::Timeout(_) => ReasoningError::Timeout(self.timeout_secs),
                SubprocessError::Exit { .. } => ReasoningError::Api(e.to_string()),
                other => ReasoningError::Internal(other.to_string()),
            })?;

        debug!("Raw reply for {}:\n{}", request.step_identifier, content);
        extract_json_object(&content)
    }
}
