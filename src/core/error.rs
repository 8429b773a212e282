//! Load-time errors for step definitions and the registry

use thiserror::Error;

/// Errors raised while loading or indexing step definitions.
///
/// All of these are fatal to startup: no run may begin once one is raised.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("malformed step definition `{source_name}`: {reason}")]
    MalformedDefinition { source_name: String, reason: String },

    #[error("duplicate step identifier `{0}`")]
    DuplicateStep(String),

    #[error("invalid condition on step `{step}`: {reason}")]
    InvalidCondition { step: String, reason: String },

    #[error("unknown step `{0}`")]
    UnknownStep(String),

    #[error("failed to read step definitions from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DefinitionError {
    pub(crate) fn malformed(source_name: &str, reason: impl Into<String>) -> Self {
        DefinitionError::MalformedDefinition {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while assembling an engine from a registry, projection
/// table and tool catalogue. Like definition errors they prevent any run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("invalid input projection for step `{step}`: {reason}")]
    InvalidProjection { step: String, reason: String },

    #[error("unknown tool `{0}`")]
    UnknownTool(String),

    #[error("step `{step}` is granted tools but {reason}")]
    InvalidToolPermission { step: String, reason: String },

    #[error("engine is missing a {0}")]
    Incomplete(&'static str),
}
