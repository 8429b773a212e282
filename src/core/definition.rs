//! Step definitions and their markdown source format
//!
//! A step is described by a markdown document with YAML frontmatter:
//!
//! ```text
//! ---
//! identifier: pa_denial_letter_generator
//! order: 6
//! condition: pa_decision_engine.decision == "DENY"
//! ---
//! ## Role
//! ...
//! ## Instructions
//! ...
//! ## Input Schema
//! ```json
//! { ... }
//! ```
//! ## Output Schema
//! ```json
//! { ... }
//! ```
//! ```

use crate::core::condition::Condition;
use crate::core::error::DefinitionError;
use crate::core::schema::Schema;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

static ROLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)##\s*Role[ \t]*\n+(.*?)(?:\n##[^#]|\z)").expect("role pattern is valid")
});

static INSTRUCTIONS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)##\s*Instructions[ \t]*\n+(.*?)(?:\n##[^#]|\z)")
        .expect("instructions pattern is valid")
});

static INPUT_SCHEMA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)##\s*Input\s*Schema[ \t]*\n+```(?:json)?[ \t]*\n(.*?)```")
        .expect("input schema pattern is valid")
});

static OUTPUT_SCHEMA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)##\s*Output\s*Schema[ \t]*\n+```(?:json)?[ \t]*\n(.*?)```")
        .expect("output schema pattern is valid")
});

/// A schema together with the text it was declared as
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredSchema {
    /// Source text of the schema block, passed verbatim to the reasoning provider
    pub text: String,
    pub schema: Schema,
}

impl DeclaredSchema {
    pub fn new(schema: Schema) -> Self {
        let text = serde_json::to_string_pretty(&schema.to_shape()).unwrap_or_default();
        Self { text, schema }
    }
}

/// An immutable step definition
#[derive(Debug, Clone, PartialEq)]
pub struct StepDefinition {
    pub identifier: String,
    pub description: String,
    /// Position in the total execution order
    pub order: u32,
    pub version: Option<String>,
    /// Gating condition; `None` means the step always runs
    pub condition: Option<Condition>,
    pub role: String,
    pub instructions: String,
    /// Advisory input shape. `None` when the block is absent or not a valid shape.
    pub input_schema: Option<DeclaredSchema>,
    /// Input schema text as written, even when it did not parse
    pub input_schema_text: Option<String>,
    /// Enforced on every produced output
    pub output_schema: DeclaredSchema,
    pub uses_tools: bool,
    /// A mandatory step halts the run instead of being skipped or rejected quietly
    pub mandatory: bool,
    /// Per-step override of the reasoning timeout
    pub timeout_secs: Option<u64>,
}

/// A named definition document
#[derive(Debug, Clone)]
pub struct DefinitionSource {
    pub name: String,
    pub content: String,
}

impl DefinitionSource {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FrontMatter {
    #[serde(alias = "name")]
    identifier: Option<String>,
    #[serde(alias = "execution_order")]
    order: Option<u32>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    version: Option<serde_yaml::Value>,
    #[serde(default)]
    uses_tools: bool,
    #[serde(default)]
    mandatory: bool,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

impl StepDefinition {
    /// Create a definition programmatically
    pub fn new(identifier: impl Into<String>, order: u32, output_schema: Schema) -> Self {
        Self {
            identifier: identifier.into(),
            description: String::new(),
            order,
            version: None,
            condition: None,
            role: String::new(),
            instructions: String::new(),
            input_schema: None,
            input_schema_text: None,
            output_schema: DeclaredSchema::new(output_schema),
            uses_tools: false,
            mandatory: false,
            timeout_secs: None,
        }
    }

    /// Gate the step on a condition expression
    pub fn with_condition(mut self, expression: &str) -> Result<Self, DefinitionError> {
        let condition =
            Condition::parse(expression).map_err(|e| DefinitionError::InvalidCondition {
                step: self.identifier.clone(),
                reason: e.to_string(),
            })?;
        self.condition = Some(condition);
        Ok(self)
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tools(mut self) -> Self {
        self.uses_tools = true;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Parse a definition from a markdown document with YAML frontmatter.
    ///
    /// `source_name` is only used in error messages.
    pub fn from_markdown(source_name: &str, content: &str) -> Result<Self, DefinitionError> {
        let trimmed = content.trim_start();
        if !trimmed.starts_with("---") {
            return Err(DefinitionError::malformed(
                source_name,
                "missing YAML frontmatter",
            ));
        }

        let parts: Vec<&str> = trimmed.splitn(3, "---").collect();
        if parts.len() < 3 {
            return Err(DefinitionError::malformed(
                source_name,
                "unterminated YAML frontmatter",
            ));
        }
        let body = parts[2];

        let fm: FrontMatter = serde_yaml::from_str(parts[1].trim()).map_err(|e| {
            DefinitionError::malformed(source_name, format!("invalid frontmatter: {}", e))
        })?;

        let identifier = fm
            .identifier
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DefinitionError::malformed(source_name, "missing `identifier`"))?;
        let order = fm
            .order
            .ok_or_else(|| DefinitionError::malformed(source_name, "missing `order`"))?;

        let output_text = capture(&OUTPUT_SCHEMA_RE, body)
            .ok_or_else(|| DefinitionError::malformed(source_name, "missing output schema block"))?;
        let output_schema = Schema::from_json_str(&output_text).map_err(|e| {
            DefinitionError::malformed(source_name, format!("output schema: {}", e))
        })?;

        // Input schemas are advisory; keep the text even if it is not a usable shape.
        let input_schema_text = capture(&INPUT_SCHEMA_RE, body);
        let input_schema = input_schema_text.as_ref().and_then(|text| {
            Schema::from_json_str(text).ok().map(|schema| DeclaredSchema {
                text: text.clone(),
                schema,
            })
        });

        let condition = match fm.condition.as_deref().map(str::trim) {
            Some(expression) if !expression.is_empty() => {
                Some(Condition::parse(expression).map_err(|e| {
                    DefinitionError::InvalidCondition {
                        step: identifier.clone(),
                        reason: e.to_string(),
                    }
                })?)
            }
            _ => None,
        };

        let version = fm.version.and_then(|v| match v {
            serde_yaml::Value::String(s) => Some(s),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        Ok(Self {
            identifier,
            description: fm.description.unwrap_or_default(),
            order,
            version,
            condition,
            role: capture(&ROLE_RE, body).unwrap_or_default(),
            instructions: capture(&INSTRUCTIONS_RE, body).unwrap_or_default(),
            input_schema,
            input_schema_text,
            output_schema: DeclaredSchema {
                text: output_text,
                schema: output_schema,
            },
            uses_tools: fm.uses_tools,
            mandatory: fm.mandatory,
            timeout_secs: fm.timeout_secs,
        })
    }

    pub fn from_source(source: &DefinitionSource) -> Result<Self, DefinitionError> {
        Self::from_markdown(&source.name, &source.content)
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }
}

fn capture(re: &Regex, body: &str) -> Option<String> {
    re.captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}
