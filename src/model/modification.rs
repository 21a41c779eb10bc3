//! Per-field modification expressions.

use serde::{Deserialize, Serialize};

/// A modification of one field, expressed in the constrained arithmetic
/// grammar over the implicit `current` variable (the field's value for the
/// row being processed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldModification {
    pub field_name: String,
    /// Source text, e.g. `current * 1.2`, `current - 10%`,
    /// `CLAMP(current * 1.5, 100, 300)`.
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldModification {
    pub fn new(field_name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            expression: expression.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
