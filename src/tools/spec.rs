//! Tool declarations and argument-source rules

use crate::tools::{ToolArgs, ToolError};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    /// `[]`: one value per array element
    Each,
}

/// Path into a step's logical input, e.g. `provider.npi` or
/// `procedures_requested[].code`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSource {
    text: String,
    segments: Vec<Segment>,
}

impl ArgSource {
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        for part in text.split('.').map(str::trim).filter(|p| !p.is_empty()) {
            let mut key = part;
            let mut each = 0;
            while let Some(stripped) = key.strip_suffix("[]") {
                key = stripped;
                each += 1;
            }
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            segments.extend(std::iter::repeat(Segment::Each).take(each));
        }
        Self {
            text: text.to_string(),
            segments,
        }
    }

    /// Split at the first `[]` into the array path and the per-element path
    fn split_fan(&self) -> Option<(&[Segment], &[Segment])> {
        let at = self.segments.iter().position(|s| *s == Segment::Each)?;
        Some((&self.segments[..at], &self.segments[at + 1..]))
    }

    /// Scalar values found at this source. Nulls, blank strings, objects
    /// and arrays are not usable arguments and are left out.
    pub fn extract(&self, input: &Value) -> Vec<Value> {
        let mut out = Vec::new();
        collect(input, &self.segments, &mut out);
        out
    }
}

impl fmt::Display for ArgSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn collect(value: &Value, segments: &[Segment], out: &mut Vec<Value>) {
    let Some((first, rest)) = segments.split_first() else {
        match value {
            Value::String(s) if !s.trim().is_empty() => out.push(Value::String(s.trim().to_string())),
            Value::Number(_) | Value::Bool(_) => out.push(value.clone()),
            _ => {}
        }
        return;
    };

    match (first, value) {
        (Segment::Key(key), Value::Object(map)) => {
            if let Some(inner) = map.get(key) {
                collect(inner, rest, out);
            }
        }
        (Segment::Each, Value::Array(items)) => {
            for item in items {
                collect(item, rest, out);
            }
        }
        _ => {}
    }
}

/// One named argument and where its value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgRule {
    pub name: String,
    pub source: ArgSource,
}

/// A tool a step may call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    /// Backend tool actually invoked; usually the same as `name`
    pub target: String,
    pub description: String,
    pub args: Vec<ArgRule>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            target: name.clone(),
            name,
            description: description.into(),
            args: Vec::new(),
        }
    }

    /// Declare a variant of another backend tool with its own argument rules
    pub fn invoking(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn arg(mut self, name: impl Into<String>, source: &str) -> Self {
        self.args.push(ArgRule {
            name: name.into(),
            source: ArgSource::parse(source),
        });
        self
    }

    /// Derive the invocations for a logical input.
    ///
    /// Single-valued arguments are shared by every call. Fanned-out
    /// arguments over the same array are read from the same element, and
    /// an element lacking any of them is passed over. Arguments over
    /// different arrays are combined pairwise. Identical calls are planned
    /// once. An argument without any usable value yields
    /// `MissingToolArgument` and no calls at all.
    pub fn plan(&self, input: &Value) -> Result<Vec<ToolArgs>, ToolError> {
        let mut shared = ToolArgs::new();
        let mut groups: Vec<(&[Segment], Vec<(&ArgRule, &[Segment])>)> = Vec::new();
        for rule in &self.args {
            match rule.source.split_fan() {
                Some((array, element)) => match groups.iter_mut().find(|(a, _)| *a == array) {
                    Some((_, members)) => members.push((rule, element)),
                    None => groups.push((array, vec![(rule, element)])),
                },
                None => {
                    let value = rule
                        .source
                        .extract(input)
                        .into_iter()
                        .next()
                        .ok_or_else(|| self.missing(rule))?;
                    shared.insert(rule.name.clone(), value);
                }
            }
        }

        let mut calls = vec![shared];
        for (array, members) in &groups {
            let rows = element_rows(input, array, members).map_err(|rule| self.missing(rule))?;
            calls = calls
                .iter()
                .flat_map(|base| {
                    rows.iter().map(move |row| {
                        let mut args = base.clone();
                        args.extend(row.clone());
                        args
                    })
                })
                .collect();
        }

        let mut planned: Vec<ToolArgs> = Vec::with_capacity(calls.len());
        for args in calls {
            if !planned.contains(&args) {
                planned.push(args);
            }
        }
        Ok(planned)
    }

    fn missing(&self, rule: &ArgRule) -> ToolError {
        ToolError::MissingToolArgument {
            tool: self.name.clone(),
            argument: rule.name.clone(),
        }
    }
}

fn lookup<'a>(value: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, segment| match segment {
        Segment::Key(key) => current.get(key.as_str()),
        Segment::Each => None,
    })
}

/// Argument sets drawn from each element of one array. Errs with the first
/// argument found missing when no element supplies them all.
fn element_rows<'r>(
    input: &Value,
    array: &[Segment],
    members: &[(&'r ArgRule, &[Segment])],
) -> Result<Vec<ToolArgs>, &'r ArgRule> {
    let items: &[Value] = match lookup(input, array) {
        Some(Value::Array(items)) => items,
        _ => &[],
    };

    let mut rows = Vec::new();
    let mut first_missing = None;
    for item in items {
        let mut item_rows = vec![ToolArgs::new()];
        for (rule, path) in members {
            let mut values = Vec::new();
            collect(item, path, &mut values);
            if values.is_empty() {
                first_missing.get_or_insert(*rule);
                item_rows.clear();
                break;
            }
            item_rows = item_rows
                .iter()
                .flat_map(|row| {
                    values.iter().map(move |value| {
                        let mut args = row.clone();
                        args.insert(rule.name.clone(), value.clone());
                        args
                    })
                })
                .collect();
        }
        rows.extend(item_rows);
    }

    match (rows.is_empty(), first_missing, members.first()) {
        (false, _, _) => Ok(rows),
        (true, Some(rule), _) => Err(rule),
        (true, None, Some((rule, _))) => Err(*rule),
        (true, None, None) => Ok(rows),
    }
}
