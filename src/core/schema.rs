//! Declared payload shapes and the schema validator
//!
//! Step definitions describe their input and output by example: a JSON object
//! whose values are type tags (`"string"`, `"number"`, ...), literals, nested
//! objects, or single-element arrays describing the element shape. A key
//! ending in `?` is optional; every other key is required.
//!
//! Validation is deliberately permissive about additions: keys that are not
//! declared are accepted, only missing required keys and wrong types fail.

use crate::core::path::type_name;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// A declared shape
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Any,
    String,
    Number,
    Integer,
    Boolean,
    Array(Box<Schema>),
    Object(Vec<Field>),
}

/// A field of an object shape
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub required: bool,
    pub schema: Schema,
}

/// Errors raised while reading a schema block
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema block is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema block must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

impl Schema {
    /// Parse a schema block (the contents of a fenced ```json block).
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(SchemaError::NotAnObject(type_name(&value)));
        }
        Ok(Self::from_shape(&value))
    }

    /// Interpret an example value as a shape.
    pub fn from_shape(value: &Value) -> Self {
        match value {
            Value::Null => Schema::Any,
            Value::Bool(_) => Schema::Boolean,
            Value::Number(_) => Schema::Number,
            Value::String(tag) => Self::from_tag(tag),
            Value::Array(items) => Schema::Array(Box::new(
                items.first().map(Self::from_shape).unwrap_or(Schema::Any),
            )),
            Value::Object(map) => Schema::Object(
                map.iter()
                    .map(|(key, shape)| {
                        let (name, required) = match key.strip_suffix('?') {
                            Some(name) => (name.trim().to_string(), false),
                            None => (key.trim().to_string(), true),
                        };
                        Field {
                            name,
                            required,
                            schema: Self::from_shape(shape),
                        }
                    })
                    .collect(),
            ),
        }
    }

    // Anything that is not a recognised tag is an example string,
    // e.g. "APPROVE | DENY | PEND".
    fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "number" | "float" => Schema::Number,
            "integer" | "int" => Schema::Integer,
            "boolean" | "bool" => Schema::Boolean,
            "array" | "list" => Schema::Array(Box::new(Schema::Any)),
            "object" | "dict" => Schema::Object(Vec::new()),
            "any" => Schema::Any,
            _ => Schema::String,
        }
    }

    /// Render the shape back into the example notation it was read from.
    pub fn to_shape(&self) -> Value {
        match self {
            Schema::Any => Value::String("any".to_string()),
            Schema::String => Value::String("string".to_string()),
            Schema::Number => Value::String("number".to_string()),
            Schema::Integer => Value::String("integer".to_string()),
            Schema::Boolean => Value::String("boolean".to_string()),
            Schema::Array(items) => Value::Array(vec![items.to_shape()]),
            Schema::Object(fields) => {
                let mut map = Map::new();
                for field in fields {
                    let key = if field.required {
                        field.name.clone()
                    } else {
                        format!("{}?", field.name)
                    };
                    map.insert(key, field.schema.to_shape());
                }
                Value::Object(map)
            }
        }
    }

    /// Short type name for violation messages
    pub fn type_label(&self) -> &'static str {
        match self {
            Schema::Any => "any",
            Schema::String => "string",
            Schema::Number => "number",
            Schema::Integer => "integer",
            Schema::Boolean => "boolean",
            Schema::Array(_) => "array",
            Schema::Object(_) => "object",
        }
    }

    /// Required top-level field names (empty for non-object shapes)
    pub fn required_fields(&self) -> Vec<&str> {
        match self {
            Schema::Object(fields) => fields
                .iter()
                .filter(|f| f.required)
                .map(|f| f.name.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// What went wrong at one location of a candidate payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    TypeMismatch { expected: String, found: String },
}

/// A single schema violation, located by a `$.a.b[0]` style path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub path: String,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::Missing => write!(f, "{}: missing required field", self.path),
            ViolationKind::TypeMismatch { expected, found } => {
                write!(f, "{}: expected {}, found {}", self.path, expected, found)
            }
        }
    }
}

/// A candidate payload did not conform to its declared shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details = self
            .violations
            .iter()
            .map(Violation::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "schema validation failed: {}", details)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a value against a schema, collecting every violation.
pub fn validate(value: &Value, schema: &Schema) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    check(value, schema, "$", &mut violations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}

fn check(value: &Value, schema: &Schema, path: &str, out: &mut Vec<Violation>) {
    let matches = match (schema, value) {
        (Schema::Any, _) => true,
        (Schema::String, Value::String(_)) => true,
        (Schema::Number, Value::Number(_)) => true,
        (Schema::Integer, Value::Number(n)) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        (Schema::Boolean, Value::Bool(_)) => true,
        (Schema::Array(items), Value::Array(values)) => {
            for (i, item) in values.iter().enumerate() {
                check(item, items, &format!("{}[{}]", path, i), out);
            }
            true
        }
        (Schema::Object(fields), Value::Object(map)) => {
            for field in fields {
                let field_path = format!("{}.{}", path, field.name);
                match map.get(&field.name) {
                    None => {
                        if field.required {
                            out.push(Violation {
                                path: field_path,
                                kind: ViolationKind::Missing,
                            });
                        }
                    }
                    Some(Value::Null) if !field.required => {}
                    Some(inner) => check(inner, &field.schema, &field_path, out),
                }
            }
            true
        }
        _ => false,
    };

    if !matches {
        out.push(Violation {
            path: path.to_string(),
            kind: ViolationKind::TypeMismatch {
                expected: schema.type_label().to_string(),
                found: type_name(value).to_string(),
            },
        });
    }
}
