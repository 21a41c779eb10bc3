//! Best-effort audit sink: one line per execute/rollback.
//!
//! Sink failures are swallowed by the engine; they never fail the
//! surrounding transaction or surface to the caller.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Execute,
    Rollback,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execute => write!(f, "EXECUTE"),
            Self::Rollback => write!(f, "ROLLBACK"),
        }
    }
}

/// One audit line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub rule_id: String,
    pub table: String,
    pub affected_count: u64,
    pub success: bool,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

/// Destination for audit records. Implementations may write to a table, a
/// file, or an external service; the engine treats them all as best-effort.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> Result<(), EngineError>;
}

/// Default sink: emits the audit line through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), EngineError> {
        info!(
            action = %record.action,
            rule_id = record.rule_id.as_str(),
            table = record.table.as_str(),
            affected = record.affected_count,
            success = record.success,
            actor = record.actor.as_str(),
            "audit"
        );
        Ok(())
    }
}
