//! The rule aggregate: target, predicate, modifications, lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::{Condition, FieldModification};

/// Rule lifecycle status. Advances forward only, except the one-way
/// COMPLETED → ROLLED_BACK transition after a rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    Draft,
    PendingReview,
    Approved,
    Executing,
    Completed,
    RolledBack,
    Deprecated,
}

impl RuleStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::PendingReview => 1,
            Self::Approved => 2,
            Self::Executing => 3,
            Self::Completed => 4,
            Self::RolledBack => 5,
            Self::Deprecated => 6,
        }
    }

    /// Whether `self → next` is a legal lifecycle transition.
    pub fn can_transition(self, next: RuleStatus) -> bool {
        if next == Self::RolledBack {
            return self == Self::Completed;
        }
        next.rank() > self.rank()
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Draft => "DRAFT",
            Self::PendingReview => "PENDING_REVIEW",
            Self::Approved => "APPROVED",
            Self::Executing => "EXECUTING",
            Self::Completed => "COMPLETED",
            Self::RolledBack => "ROLLED_BACK",
            Self::Deprecated => "DEPRECATED",
        };
        write!(f, "{name}")
    }
}

/// A named, reusable design intent: a predicate over one mechanism's table
/// plus a set of per-field modifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Game-design category (ITEM, SKILL, NPC, ...) resolved to a table
    /// through the mechanism registry when `target_table` is unset.
    pub target_mechanism: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_table: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub modifications: Vec<FieldModification>,
    pub status: RuleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_executed_at: Option<DateTime<Utc>>,
    pub version: u32,
}

impl Rule {
    pub fn new(name: impl Into<String>, target_mechanism: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            target_mechanism: target_mechanism.into(),
            target_table: None,
            conditions: Vec::new(),
            modifications: Vec::new(),
            status: RuleStatus::Draft,
            created_at: now,
            updated_at: now,
            last_executed_at: None,
            version: 1,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Pin the physical table, bypassing mechanism resolution.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.target_table = Some(table.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_modification(mut self, modification: FieldModification) -> Self {
        self.modifications.push(modification);
        self
    }

    /// Advance the lifecycle status, rejecting backwards moves.
    pub fn advance(&mut self, next: RuleStatus) -> Result<(), EngineError> {
        if !self.status.can_transition(next) {
            return Err(EngineError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a successful execution on the rule itself.
    pub fn mark_executed(&mut self) {
        let now = Utc::now();
        self.last_executed_at = Some(now);
        self.updated_at = now;
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_advances_forward_only() {
        assert!(RuleStatus::Draft.can_transition(RuleStatus::PendingReview));
        assert!(RuleStatus::Draft.can_transition(RuleStatus::Approved));
        assert!(RuleStatus::Approved.can_transition(RuleStatus::Executing));
        assert!(!RuleStatus::Approved.can_transition(RuleStatus::Draft));
        assert!(!RuleStatus::Completed.can_transition(RuleStatus::Executing));
    }

    #[test]
    fn rolled_back_only_from_completed() {
        assert!(RuleStatus::Completed.can_transition(RuleStatus::RolledBack));
        assert!(!RuleStatus::Draft.can_transition(RuleStatus::RolledBack));
        assert!(!RuleStatus::Executing.can_transition(RuleStatus::RolledBack));
        // and rolled-back is not revisitable
        assert!(!RuleStatus::RolledBack.can_transition(RuleStatus::Completed));
        assert!(RuleStatus::RolledBack.can_transition(RuleStatus::Deprecated));
    }

    #[test]
    fn advance_rejects_backwards_move() {
        let mut rule = Rule::new("buff mages", "ITEM");
        rule.advance(RuleStatus::Approved).unwrap();
        assert!(rule.advance(RuleStatus::Draft).is_err());
        assert_eq!(rule.status, RuleStatus::Approved);
    }

    #[test]
    fn mark_executed_bumps_version() {
        let mut rule = Rule::new("buff mages", "ITEM");
        assert_eq!(rule.version, 1);
        rule.mark_executed();
        assert_eq!(rule.version, 2);
        assert!(rule.last_executed_at.is_some());
    }
}
