//! Engine configuration.
//!
//! Loadable from YAML so deployments can carry the mechanism→table registry
//! and operational knobs next to the rest of their config.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables plus the mechanism→table registry entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for any single database call (SELECT, UPDATE batch, commit).
    pub statement_timeout_ms: u64,
    /// Capacity of the compiled-expression cache.
    pub expression_cache_capacity: usize,
    /// Primary key column used for per-row UPDATE targeting.
    pub primary_key_column: String,
    /// Actor recorded on execution results and audit lines.
    pub actor: String,
    /// Mechanism name (ITEM, SKILL, NPC, ...) to physical table.
    pub mechanisms: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            statement_timeout_ms: 30_000,
            expression_cache_capacity: 256,
            primary_key_column: "id".to_string(),
            actor: "system".to_string(),
            mechanisms: HashMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    pub fn with_mechanism(
        mut self,
        mechanism: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        self.mechanisms.insert(mechanism.into(), table.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }
}
