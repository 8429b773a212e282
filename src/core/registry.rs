//! StepDefinition registry
//!
//! Loaded once at startup, read-only afterwards and shared between runs.

use crate::core::definition::{DefinitionSource, StepDefinition};
use crate::core::error::DefinitionError;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Ordered, indexed collection of step definitions
#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
    steps: Vec<StepDefinition>,
    index: HashMap<String, usize>,
}

impl StepRegistry {
    /// Parse and index definition sources. Any error loads nothing.
    pub fn load<I>(sources: I) -> Result<Self, DefinitionError>
    where
        I: IntoIterator<Item = DefinitionSource>,
    {
        let definitions = sources
            .into_iter()
            .map(|source| StepDefinition::from_source(&source))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_definitions(definitions)
    }

    /// Index already-built definitions.
    ///
    /// Sorting is stable, so equal orders keep their registration sequence.
    pub fn from_definitions(definitions: Vec<StepDefinition>) -> Result<Self, DefinitionError> {
        let mut seen = HashMap::new();
        for def in &definitions {
            if seen.insert(def.identifier.clone(), def.order).is_some() {
                return Err(DefinitionError::DuplicateStep(def.identifier.clone()));
            }
        }

        for def in &definitions {
            let Some(condition) = &def.condition else {
                continue;
            };
            match seen.get(condition.step()) {
                None => {
                    return Err(DefinitionError::InvalidCondition {
                        step: def.identifier.clone(),
                        reason: format!("references unknown step `{}`", condition.step()),
                    })
                }
                Some(&order) if order >= def.order => {
                    return Err(DefinitionError::InvalidCondition {
                        step: def.identifier.clone(),
                        reason: format!(
                            "references step `{}` (order {}) which does not run before order {}",
                            condition.step(),
                            order,
                            def.order
                        ),
                    })
                }
                Some(_) => {}
            }
        }

        let mut steps = definitions;
        steps.sort_by_key(|def| def.order);

        let index = steps
            .iter()
            .enumerate()
            .map(|(i, def)| (def.identifier.clone(), i))
            .collect();

        for def in &steps {
            debug!("Registered step {} (order {})", def.identifier, def.order);
        }

        Ok(Self { steps, index })
    }

    /// Load every `*.md` file in a directory, in file-name order
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let dir = dir.as_ref();
        let io_err = |source: std::io::Error| DefinitionError::Io {
            path: dir.display().to_string(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("md") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let content = std::fs::read_to_string(&path).map_err(|source| DefinitionError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            sources.push(DefinitionSource::new(name, content));
        }

        let registry = Self::load(sources)?;
        info!(
            "Loaded {} step definitions from {}",
            registry.len(),
            dir.display()
        );
        Ok(registry)
    }

    /// Look up a step, failing with `UnknownStep`
    pub fn lookup(&self, identifier: &str) -> Result<&StepDefinition, DefinitionError> {
        self.get(identifier)
            .ok_or_else(|| DefinitionError::UnknownStep(identifier.to_string()))
    }

    pub fn get(&self, identifier: &str) -> Option<&StepDefinition> {
        self.index.get(identifier).map(|&i| &self.steps[i])
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn order_of(&self, identifier: &str) -> Option<u32> {
        self.get(identifier).map(|def| def.order)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
