//! Per-run state store
//!
//! The store holds the raw external input and every accepted step output of
//! one run. Writes are append-only and at most once per step identifier;
//! reads go through a [`StateSnapshot`], which can be restricted to outputs
//! of steps with a strictly smaller order.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use thiserror::Error;

/// One opaque source document handed to the first step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub name: String,
    pub content: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Document content as text (lossy for non-UTF-8 bytes)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Raw external input of a run: an unordered collection of documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInput {
    pub documents: Vec<SourceDocument>,
}

impl RawInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.documents.push(SourceDocument::new(name, content));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// The documents as a JSON array of `{name, text}` objects
    pub fn documents_value(&self) -> Value {
        Value::Array(
            self.documents
                .iter()
                .map(|doc| json!({ "name": doc.name, "text": doc.text() }))
                .collect(),
        )
    }
}

/// The validated output of one executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutput {
    pub step_identifier: String,
    pub order: u32,
    pub payload: Value,
    /// Logical write sequence within the run
    pub produced_at: u64,
}

/// Errors from state store access
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("step `{0}` already wrote its output in this run")]
    DuplicateWrite(String),

    #[error("no output recorded for step `{0}`")]
    NotFound(String),
}

/// Append-only mapping from step identifier to validated payload
#[derive(Debug, Default)]
pub struct StateStore {
    raw_input: RawInput,
    outputs: Vec<StepOutput>,
    index: HashMap<String, usize>,
}

impl StateStore {
    /// Create an empty store for one run
    pub fn new(raw_input: RawInput) -> Self {
        Self {
            raw_input,
            outputs: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Record a step's payload. A second write for the same step is refused.
    pub fn put(
        &mut self,
        step_identifier: &str,
        order: u32,
        payload: Value,
    ) -> Result<&StepOutput, StoreError> {
        if self.index.contains_key(step_identifier) {
            return Err(StoreError::DuplicateWrite(step_identifier.to_string()));
        }

        let position = self.outputs.len();
        self.outputs.push(StepOutput {
            step_identifier: step_identifier.to_string(),
            order,
            payload,
            produced_at: position as u64,
        });
        self.index.insert(step_identifier.to_string(), position);
        Ok(&self.outputs[position])
    }

    /// Get a step's payload
    pub fn get(&self, step_identifier: &str) -> Result<&Value, StoreError> {
        self.output(step_identifier)
            .map(|output| &output.payload)
            .ok_or_else(|| StoreError::NotFound(step_identifier.to_string()))
    }

    /// Get a step's full output record
    pub fn output(&self, step_identifier: &str) -> Option<&StepOutput> {
        self.index.get(step_identifier).map(|&i| &self.outputs[i])
    }

    pub fn contains(&self, step_identifier: &str) -> bool {
        self.index.contains_key(step_identifier)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn raw_input(&self) -> &RawInput {
        &self.raw_input
    }

    /// Read-only view of everything written so far
    pub fn snapshot(&self) -> StateSnapshot<'_> {
        StateSnapshot {
            store: self,
            visible_below: None,
        }
    }

    /// Read-only view restricted to steps ordered strictly before `order`
    pub fn snapshot_before(&self, order: u32) -> StateSnapshot<'_> {
        StateSnapshot {
            store: self,
            visible_below: Some(order),
        }
    }

    /// Outputs in write order
    pub fn outputs(&self) -> &[StepOutput] {
        &self.outputs
    }
}

/// A read-only view over a [`StateStore`]
#[derive(Debug, Clone, Copy)]
pub struct StateSnapshot<'a> {
    store: &'a StateStore,
    visible_below: Option<u32>,
}

impl<'a> StateSnapshot<'a> {
    fn visible(&self, output: &StepOutput) -> bool {
        self.visible_below.map_or(true, |limit| output.order < limit)
    }

    /// Payload of a visible step, if it was written
    pub fn get(&self, step_identifier: &str) -> Option<&'a Value> {
        self.store
            .output(step_identifier)
            .filter(|output| self.visible(output))
            .map(|output| &output.payload)
    }

    pub fn contains(&self, step_identifier: &str) -> bool {
        self.get(step_identifier).is_some()
    }

    pub fn raw_input(&self) -> &'a RawInput {
        &self.store.raw_input
    }

    /// Visible outputs in write order
    pub fn outputs(&self) -> impl Iterator<Item = &'a StepOutput> + '_ {
        self.store.outputs.iter().filter(|o| self.visible(o))
    }

    /// Visible payloads keyed by step identifier
    pub fn to_map(&self) -> Map<String, Value> {
        self.outputs()
            .map(|o| (o.step_identifier.clone(), o.payload.clone()))
            .collect()
    }
}
