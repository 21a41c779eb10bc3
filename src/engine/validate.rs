//! Rule shape validation.

use crate::compiler::ExpressionCompiler;
use crate::error::RuleViolation;
use crate::model::Rule;

/// Check a rule's shape and compile every modification expression.
/// Violations accumulate so the author sees all of them at once; an empty
/// vec means the rule is executable.
pub fn validate_rule(rule: &Rule, compiler: &ExpressionCompiler) -> Vec<RuleViolation> {
    let mut violations = Vec::new();

    if rule.name.trim().is_empty() {
        violations.push(RuleViolation::EmptyName);
    }
    if rule.target_mechanism.trim().is_empty() {
        violations.push(RuleViolation::EmptyMechanism);
    }
    if rule.modifications.is_empty() {
        violations.push(RuleViolation::NoModifications);
    }

    for (index, modification) in rule.modifications.iter().enumerate() {
        if modification.field_name.trim().is_empty() {
            violations.push(RuleViolation::ModificationFieldEmpty { index });
            continue;
        }
        if let Err(err) = compiler.compile(&modification.expression) {
            violations.push(RuleViolation::ExpressionInvalid {
                field: modification.field_name.clone(),
                message: err.to_string(),
            });
        }
    }

    for (index, condition) in rule.conditions.iter().enumerate() {
        if condition.field_name.trim().is_empty() {
            violations.push(RuleViolation::ConditionFieldEmpty { index });
        }
        if condition.operator.requires_value() && condition.value.is_none() {
            violations.push(RuleViolation::ConditionValueMissing {
                field: condition.field_name.clone(),
                operator: condition.operator.to_string(),
            });
        }
    }

    violations
}
