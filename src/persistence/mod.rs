//! Append-only audit log of tool invocations

pub mod jsonl;

pub use jsonl::JsonlAuditLog;

use crate::tools::{ToolArgs, ToolOutcome, ToolStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One tool invocation attempt, including skipped ones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub run_id: Uuid,

    /// Step that requested the tool
    pub step_identifier: String,

    pub tool: String,

    pub args: ToolArgs,

    #[serde(flatten)]
    pub status: ToolStatus,

    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(run_id: Uuid, step_identifier: &str, outcome: &ToolOutcome) -> Self {
        Self {
            run_id,
            step_identifier: step_identifier.to_string(),
            tool: outcome.tool.clone(),
            args: outcome.args.clone(),
            status: outcome.status.clone(),
            recorded_at: Utc::now(),
        }
    }
}

/// Trait for audit log backends
#[async_trait::async_trait]
pub trait AuditLog: Send + Sync {
    /// Append an entry. Entries are never rewritten or removed.
    async fn append(&self, entry: &AuditEntry) -> Result<()>;

    /// All entries recorded for a run, in append order
    async fn entries(&self, run_id: Uuid) -> Result<Vec<AuditEntry>>;
}

/// In-memory audit log (for testing or ephemeral use)
pub struct InMemoryAuditLog {
    entries: tokio::sync::RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self {
            entries: tokio::sync::RwLock::new(Vec::new()),
        }
    }

    /// Every entry across all runs
    pub async fn all(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn entries(&self, run_id: Uuid) -> Result<Vec<AuditEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|e| e.run_id == run_id).cloned().collect())
    }
}

/// Audit log that only emits entries on the `skillflow::audit` tracing target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLog;

#[async_trait::async_trait]
impl AuditLog for TracingAuditLog {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        let args = serde_json::to_string(&entry.args)?;
        tracing::info!(
            target: "skillflow::audit",
            run_id = %entry.run_id,
            step = %entry.step_identifier,
            tool = %entry.tool,
            status = entry.status.label(),
            "{} {}",
            entry.tool,
            args
        );
        Ok(())
    }

    async fn entries(&self, _run_id: Uuid) -> Result<Vec<AuditEntry>> {
        Ok(Vec::new())
    }
}
