//! Resolves and invokes the tools a step is permitted to use

use crate::core::error::EngineError;
use crate::core::registry::StepRegistry;
use crate::persistence::{AuditEntry, AuditLog, TracingAuditLog};
use crate::tools::{ToolArgs, ToolBackend, ToolError, ToolOutcome, ToolSpec, ToolStatus};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

pub struct ToolDispatcher {
    specs: HashMap<String, ToolSpec>,
    /// Step identifier -> permitted tool names, in declaration order
    permissions: HashMap<String, Vec<String>>,
    backend: Option<Arc<dyn ToolBackend>>,
    audit: Arc<dyn AuditLog>,
    timeout_secs: u64,
}

impl ToolDispatcher {
    /// Create a dispatcher. Without a backend every planned call is
    /// reported unverified.
    pub fn new(backend: Option<Arc<dyn ToolBackend>>) -> Self {
        Self {
            specs: HashMap::new(),
            permissions: HashMap::new(),
            backend,
            audit: Arc::new(TracingAuditLog),
            timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
        }
    }

    pub fn with_tool(mut self, spec: ToolSpec) -> Self {
        self.specs.insert(spec.name.clone(), spec);
        self
    }

    /// Grant a step the use of the named tools
    pub fn permit<I, S>(mut self, step: &str, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let granted = self.permissions.entry(step.to_string()).or_default();
        for tool in tools {
            let tool = tool.into();
            if !granted.contains(&tool) {
                granted.push(tool);
            }
        }
        self
    }

    pub fn with_audit_log(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn spec(&self, tool: &str) -> Option<&ToolSpec> {
        self.specs.get(tool)
    }

    /// Names of the tools a step may call
    pub fn resolve(&self, step: &str) -> Vec<&str> {
        self.permissions
            .get(step)
            .map(|tools| tools.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Drop grants to steps the registry does not contain, so a built-in
    /// catalogue can be applied to any set of definitions
    pub fn retain_registered(mut self, registry: &StepRegistry) -> Self {
        self.permissions.retain(|step, _| {
            let known = registry.contains(step);
            if !known {
                debug!("Dropping tool grants for unregistered step {}", step);
            }
            known
        });
        self
    }

    /// Check every permission against the registry and the tool catalogue
    pub fn validate_against(&self, registry: &StepRegistry) -> Result<(), EngineError> {
        for (step, tools) in &self.permissions {
            let def = registry.lookup(step)?;
            if !def.uses_tools && !tools.is_empty() {
                return Err(EngineError::InvalidToolPermission {
                    step: step.clone(),
                    reason: "its definition does not declare `uses_tools`".to_string(),
                });
            }
            for tool in tools {
                if !self.specs.contains_key(tool) {
                    return Err(EngineError::UnknownTool(tool.clone()));
                }
            }
        }
        Ok(())
    }

    /// Invoke a tool by name, bounded by the tool timeout
    pub async fn invoke(&self, tool: &str, args: &ToolArgs) -> Result<Value, ToolError> {
        let Some(spec) = self.specs.get(tool) else {
            return Err(ToolError::UnknownTool(tool.to_string()));
        };
        let Some(backend) = &self.backend else {
            return Err(ToolError::Failed {
                tool: tool.to_string(),
                reason: "no tool backend configured".to_string(),
            });
        };

        match tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            backend.invoke(&spec.target, args),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool: tool.to_string(),
                secs: self.timeout_secs,
            }),
        }
    }

    /// Invoke a tool on behalf of a step, refusing tools it was not granted
    pub async fn invoke_for(
        &self,
        step: &str,
        tool: &str,
        args: &ToolArgs,
    ) -> Result<Value, ToolError> {
        if !self.resolve(step).contains(&tool) {
            return Err(ToolError::NotPermitted {
                step: step.to_string(),
                tool: tool.to_string(),
            });
        }
        self.invoke(tool, args).await
    }

    /// Plan and run every permitted tool for a step's logical input.
    ///
    /// Never fails: missing arguments become skipped outcomes and failed
    /// lookups become unverified ones. Every attempt is audited.
    pub async fn run_for_step(&self, run_id: Uuid, step: &str, input: &Value) -> Vec<ToolOutcome> {
        let mut outcomes = Vec::new();

        for tool in self.resolve(step) {
            let Some(spec) = self.specs.get(tool) else {
                continue;
            };

            let calls = match spec.plan(input) {
                Ok(calls) => calls,
                Err(ToolError::MissingToolArgument { argument, .. }) => {
                    warn!(
                        "Step {}: skipping {} (no value for `{}`)",
                        step, tool, argument
                    );
                    let outcome = ToolOutcome {
                        tool: tool.to_string(),
                        args: ToolArgs::new(),
                        status: ToolStatus::Skipped {
                            missing_argument: argument,
                        },
                    };
                    self.audit(run_id, step, &outcome).await;
                    outcomes.push(outcome);
                    continue;
                }
                Err(e) => {
                    error!("Step {}: cannot plan {}: {}", step, tool, e);
                    continue;
                }
            };

            for args in calls {
                debug!("Step {}: invoking {} with {:?}", step, tool, args);
                let status = match self.invoke(tool, &args).await {
                    Ok(result) => ToolStatus::Completed { result },
                    Err(e) => {
                        error!("Step {}: {}", step, e);
                        ToolStatus::Unverified {
                            error: e.to_string(),
                        }
                    }
                };
                let outcome = ToolOutcome {
                    tool: tool.to_string(),
                    args,
                    status,
                };
                self.audit(run_id, step, &outcome).await;
                outcomes.push(outcome);
            }
        }

        outcomes
    }

    async fn audit(&self, run_id: Uuid, step: &str, outcome: &ToolOutcome) {
        if let Err(e) = self
            .audit
            .append(&AuditEntry::new(run_id, step, outcome))
            .await
        {
            warn!("Failed to append tool audit entry: {}", e);
        }
    }
}

impl Default for ToolDispatcher {
    fn default() -> Self {
        Self::new(None)
    }
}
