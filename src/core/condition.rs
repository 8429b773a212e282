//! Gating conditions
//!
//! A condition tests one field of a prior step's payload:
//!
//! ```text
//! pa_decision_engine.decision == "DENY"
//! pa_coverage_eligibility.coverage_eligible != true
//! pa_denial_letter_generator.denial_letter
//! !pa_coding_provider_validation.provider_valid
//! ```
//!
//! The first path segment names the step, the rest is a field path into its
//! payload. Evaluation never fails: a step without a payload, or a payload
//! without the field, makes the condition false (and the gated step is
//! skipped).

use crate::core::path::lookup;
use crate::core::store::StateSnapshot;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::warn;

static CONDITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(!)?\s*([A-Za-z_][\w-]*(?:\.[\w-]+)+)\s*(?:(==|!=)\s*(.+?))?\s*$")
        .expect("condition pattern is valid")
});

/// The comparison a condition performs on the resolved field
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionTest {
    Equals(Value),
    NotEquals(Value),
    Truthy,
    Falsy,
}

/// A parsed gating condition
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    expression: String,
    step: String,
    path: Vec<String>,
    test: ConditionTest,
}

/// Errors raised while parsing a condition expression
#[derive(Debug, Error, PartialEq)]
pub enum ConditionError {
    #[error("condition is empty")]
    Empty,

    #[error("cannot parse condition `{0}`; expected `step.field == literal`")]
    Syntax(String),

    #[error("invalid literal `{0}`")]
    Literal(String),

    #[error("negation cannot be combined with a comparison in `{0}`")]
    NegatedComparison(String),
}

impl Condition {
    /// Parse a condition expression
    pub fn parse(expression: &str) -> Result<Self, ConditionError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(ConditionError::Empty);
        }

        let caps = CONDITION_RE
            .captures(trimmed)
            .ok_or_else(|| ConditionError::Syntax(trimmed.to_string()))?;

        let negated = caps.get(1).is_some();
        let mut segments = caps[2].split('.').map(str::to_string);
        let step = segments.next().unwrap_or_default();
        let path: Vec<String> = segments.collect();

        let test = match (caps.get(3), caps.get(4)) {
            (Some(op), Some(literal)) => {
                if negated {
                    return Err(ConditionError::NegatedComparison(trimmed.to_string()));
                }
                let literal = parse_literal(literal.as_str())?;
                if op.as_str() == "==" {
                    ConditionTest::Equals(literal)
                } else {
                    ConditionTest::NotEquals(literal)
                }
            }
            _ if negated => ConditionTest::Falsy,
            _ => ConditionTest::Truthy,
        };

        Ok(Self {
            expression: trimmed.to_string(),
            step,
            path,
            test,
        })
    }

    /// The step whose payload this condition reads
    pub fn step(&self) -> &str {
        &self.step
    }

    /// Field path inside that step's payload
    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn test(&self) -> &ConditionTest {
        &self.test
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Evaluate against the state visible to the gated step.
    ///
    /// Missing payloads and missing fields evaluate to `false`.
    pub fn evaluate(&self, snapshot: &StateSnapshot<'_>) -> bool {
        let Some(payload) = snapshot.get(&self.step) else {
            warn!(
                "Condition `{}`: step `{}` has no output; treating as false",
                self.expression, self.step
            );
            return false;
        };

        let Some(value) = lookup(payload, &self.path) else {
            warn!(
                "Condition `{}`: field `{}` not present in `{}` output; treating as false",
                self.expression,
                self.path.join("."),
                self.step
            );
            return false;
        };

        match &self.test {
            ConditionTest::Equals(expected) => value == expected,
            ConditionTest::NotEquals(expected) => value != expected,
            ConditionTest::Truthy => is_truthy(value),
            ConditionTest::Falsy => !is_truthy(value),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Evaluate an optional condition; an absent condition always holds.
pub fn evaluate(condition: Option<&Condition>, snapshot: &StateSnapshot<'_>) -> bool {
    condition.map_or(true, |c| c.evaluate(snapshot))
}

fn parse_literal(text: &str) -> Result<Value, ConditionError> {
    let text = text.trim();
    if let Some(inner) = text
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Ok(Value::String(inner.to_string()));
    }
    serde_json::from_str(text).map_err(|_| ConditionError::Literal(text.to_string()))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
