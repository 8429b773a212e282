//! Input projector
//!
//! Each step's logical input is a fixed reshape of earlier steps' payloads
//! (and, for the first step, of the raw documents). Rules are data: a
//! [`Projection`] is a list of keyed [`Binding`]s, and the projector is a
//! table from step identifier to projection.

pub mod prior_auth;

use crate::core::path::{lookup, parse_dotted};
use crate::core::store::StateSnapshot;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Errors raised while projecting a step's input
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("step `{step}` needs the output of `{dependency}`, which is not available")]
    MissingDependency { step: String, dependency: String },

    #[error("no projection rule for step `{0}`")]
    NoRule(String),
}

/// Where one value of a projected input comes from
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// The raw documents as `[{name, text}]`
    Documents,
    /// A prior step's whole payload
    Payload(String),
    /// One field of a prior step's payload, or `default` when the field is absent
    Field {
        step: String,
        path: Vec<String>,
        default: Value,
    },
    Object(Vec<(String, Binding)>),
    List(Vec<Binding>),
    Literal(Value),
    /// Every visible payload, keyed by step identifier
    Accumulated,
}

impl Binding {
    pub fn payload(step: &str) -> Self {
        Binding::Payload(step.to_string())
    }

    pub fn field(step: &str, path: &str, default: Value) -> Self {
        Binding::Field {
            step: step.to_string(),
            path: parse_dotted(path),
            default,
        }
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Binding)>) -> Self {
        Binding::Object(entries.into_iter().map(|(k, b)| (k.into(), b)).collect())
    }

    fn collect_dependencies<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Binding::Payload(step) | Binding::Field { step, .. } => {
                out.insert(step.as_str());
            }
            Binding::Object(entries) => {
                for (_, binding) in entries {
                    binding.collect_dependencies(out);
                }
            }
            Binding::List(items) => {
                for binding in items {
                    binding.collect_dependencies(out);
                }
            }
            Binding::Documents | Binding::Literal(_) | Binding::Accumulated => {}
        }
    }

    fn resolve(&self, snapshot: &StateSnapshot<'_>) -> Result<Value, String> {
        Ok(match self {
            Binding::Documents => snapshot.raw_input().documents_value(),
            Binding::Payload(step) => snapshot.get(step).cloned().ok_or_else(|| step.clone())?,
            Binding::Field {
                step,
                path,
                default,
            } => {
                let payload = snapshot.get(step).ok_or_else(|| step.clone())?;
                lookup(payload, path).cloned().unwrap_or_else(|| default.clone())
            }
            Binding::Object(entries) => {
                let mut map = Map::new();
                for (key, binding) in entries {
                    map.insert(key.clone(), binding.resolve(snapshot)?);
                }
                Value::Object(map)
            }
            Binding::List(items) => Value::Array(
                items
                    .iter()
                    .map(|b| b.resolve(snapshot))
                    .collect::<Result<_, _>>()?,
            ),
            Binding::Literal(value) => value.clone(),
            Binding::Accumulated => Value::Object(snapshot.to_map()),
        })
    }
}

/// A projection rule: the keys of a step's logical input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    bindings: Vec<(String, Binding)>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, key: impl Into<String>, binding: Binding) -> Self {
        self.bindings.push((key.into(), binding));
        self
    }

    /// Raw documents plus every payload visible to the step
    pub fn accumulated() -> Self {
        Self::new()
            .bind("documents", Binding::Documents)
            .bind("steps", Binding::Accumulated)
    }

    pub fn bindings(&self) -> &[(String, Binding)] {
        &self.bindings
    }

    /// Steps whose payloads this projection requires
    pub fn dependencies(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        for (_, binding) in &self.bindings {
            binding.collect_dependencies(&mut out);
        }
        out
    }

    /// Build the logical input for `step` from the visible state
    pub fn apply(&self, step: &str, snapshot: &StateSnapshot<'_>) -> Result<Value, ProjectionError> {
        let mut input = Map::new();
        for (key, binding) in &self.bindings {
            let value = binding
                .resolve(snapshot)
                .map_err(|dependency| ProjectionError::MissingDependency {
                    step: step.to_string(),
                    dependency,
                })?;
            input.insert(key.clone(), value);
        }
        Ok(Value::Object(input))
    }
}

/// Table of projection rules keyed by step identifier
#[derive(Debug, Clone, Default)]
pub struct InputProjector {
    rules: HashMap<String, Projection>,
    fallback: Option<Projection>,
}

impl InputProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, step: impl Into<String>, projection: Projection) -> Self {
        self.rules.insert(step.into(), projection);
        self
    }

    /// Rule used for steps without an entry of their own
    pub fn with_fallback(mut self, projection: Projection) -> Self {
        self.fallback = Some(projection);
        self
    }

    pub fn rule_for(&self, step: &str) -> Option<&Projection> {
        self.rules.get(step).or(self.fallback.as_ref())
    }

    pub fn project(&self, step: &str, snapshot: &StateSnapshot<'_>) -> Result<Value, ProjectionError> {
        self.rule_for(step)
            .ok_or_else(|| ProjectionError::NoRule(step.to_string()))?
            .apply(step, snapshot)
    }
}
