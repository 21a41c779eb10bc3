//! Execution ledger: the process-lifetime history of execution results,
//! the only source of truth for later rollbacks.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::model::ExecutionResult;

/// Append-only map of execution id → result, safe under concurrent writers.
/// Cloning shares the underlying ledger.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLedger {
    inner: Arc<RwLock<HashMap<String, ExecutionResult>>>,
}

impl ExecutionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, result: ExecutionResult) {
        debug!(
            execution_id = result.execution_id.as_str(),
            success = result.success,
            "ledger append"
        );
        let mut entries = self.inner.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(result.execution_id.clone(), result);
    }

    pub fn get(&self, execution_id: &str) -> Option<ExecutionResult> {
        let entries = self.inner.read().unwrap_or_else(|e| e.into_inner());
        entries.get(execution_id).cloned()
    }

    /// All recorded executions, oldest first.
    pub fn history(&self) -> Vec<ExecutionResult> {
        let entries = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut results: Vec<_> = entries.values().cloned().collect();
        results.sort_by_key(|r| r.start_time);
        results
    }

    /// Executions still eligible for rollback, oldest first.
    pub fn rollbackable(&self) -> Vec<ExecutionResult> {
        self.history()
            .into_iter()
            .filter(ExecutionResult::can_rollback)
            .collect()
    }

    /// Mark the stored entry rolled back. Returns false when the entry is
    /// absent or no longer eligible, so a second rollback cannot sneak in.
    pub fn mark_rolled_back(&self, execution_id: &str) -> bool {
        let mut entries = self.inner.write().unwrap_or_else(|e| e.into_inner());
        match entries.get_mut(execution_id) {
            Some(entry) if entry.can_rollback() => {
                entry.mark_rolled_back();
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        let entries = self.inner.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
