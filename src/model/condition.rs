//! Typed filter conditions.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Comparison operator carried by a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Between,
    Regex,
}

impl ConditionOperator {
    /// IS NULL / IS NOT NULL are the only operators that take no literal.
    pub fn requires_value(&self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Equals => "EQUALS",
            Self::NotEquals => "NOT_EQUALS",
            Self::Gt => "GT",
            Self::Gte => "GTE",
            Self::Lt => "LT",
            Self::Lte => "LTE",
            Self::Contains => "CONTAINS",
            Self::NotContains => "NOT_CONTAINS",
            Self::StartsWith => "STARTS_WITH",
            Self::EndsWith => "ENDS_WITH",
            Self::In => "IN",
            Self::NotIn => "NOT_IN",
            Self::IsNull => "IS_NULL",
            Self::IsNotNull => "IS_NOT_NULL",
            Self::Between => "BETWEEN",
            Self::Regex => "REGEX",
        };
        write!(f, "{name}")
    }
}

/// How a condition joins the *previous* condition in the list.
///
/// Conditions form a flat left-to-right chain, not a tree: there is no
/// cross-condition grouping, so mixed AND/OR chains resolve under default
/// SQL precedence (AND binds tighter than OR). Rule authors relying on
/// mixed chains should be told this explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicOperator {
    #[default]
    And,
    Or,
}

impl fmt::Display for LogicOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// One typed filter condition on a target-table field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field_name: String,
    pub operator: ConditionOperator,
    /// Literal operand; `None` only for IS_NULL / IS_NOT_NULL.
    #[serde(default)]
    pub value: Option<JsonValue>,
    /// Join with the previous condition; ignored on the first one.
    #[serde(default)]
    pub logic: LogicOperator,
}

impl Condition {
    pub fn new(
        field_name: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<JsonValue>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            operator,
            value: Some(value.into()),
            logic: LogicOperator::And,
        }
    }

    /// A condition without a literal (IS_NULL / IS_NOT_NULL).
    pub fn bare(field_name: impl Into<String>, operator: ConditionOperator) -> Self {
        Self {
            field_name: field_name.into(),
            operator,
            value: None,
            logic: LogicOperator::And,
        }
    }

    /// Join this condition to the previous one with OR instead of AND.
    pub fn or(mut self) -> Self {
        self.logic = LogicOperator::Or;
        self
    }
}
