//! Condition-list → SQL filter compiler.
//!
//! Fragments are joined left to right as `(f1) OP (f2) OP (f3) ...` with the
//! logic operator carried on the following condition. There is no grouping
//! across conditions; mixed AND/OR chains resolve under default SQL
//! precedence. IN/NOT_IN lists are bind-parameterized; scalar literals are
//! inlined with single-quote doubling.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::PredicateError;
use crate::model::{Condition, ConditionOperator};

/// A compiled boolean filter: clause text plus bind values for the
/// parameterized branches.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFilter {
    pub clause: String,
    pub binds: Vec<JsonValue>,
}

impl SqlFilter {
    /// The empty-condition filter: matches every row.
    pub fn match_all() -> Self {
        Self {
            clause: "1 = 1".to_string(),
            binds: Vec::new(),
        }
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
        .is_match(name)
}

/// Compile a condition list into one boolean SQL expression.
pub fn compile(conditions: &[Condition]) -> Result<SqlFilter, PredicateError> {
    if conditions.is_empty() {
        return Ok(SqlFilter::match_all());
    }

    let mut clause = String::new();
    let mut binds = Vec::new();
    for (index, condition) in conditions.iter().enumerate() {
        let frag = fragment(condition, &mut binds)?;
        if index > 0 {
            clause.push_str(&format!(" {} ", condition.logic));
        }
        clause.push('(');
        clause.push_str(&frag);
        clause.push(')');
    }
    Ok(SqlFilter { clause, binds })
}

fn fragment(condition: &Condition, binds: &mut Vec<JsonValue>) -> Result<String, PredicateError> {
    let field = condition.field_name.as_str();
    if !is_identifier(field) {
        return Err(PredicateError::InvalidIdentifier {
            field: field.to_string(),
        });
    }

    let required = || {
        condition
            .value
            .as_ref()
            .ok_or_else(|| PredicateError::MissingValue {
                field: field.to_string(),
                operator: condition.operator.to_string(),
            })
    };

    match condition.operator {
        ConditionOperator::Equals => scalar(field, "=", required()?),
        ConditionOperator::NotEquals => scalar(field, "!=", required()?),
        ConditionOperator::Gt => scalar(field, ">", required()?),
        ConditionOperator::Gte => scalar(field, ">=", required()?),
        ConditionOperator::Lt => scalar(field, "<", required()?),
        ConditionOperator::Lte => scalar(field, "<=", required()?),
        ConditionOperator::Contains => like(field, required()?, "%", "%", false),
        ConditionOperator::NotContains => like(field, required()?, "%", "%", true),
        ConditionOperator::StartsWith => like(field, required()?, "", "%", false),
        ConditionOperator::EndsWith => like(field, required()?, "%", "", false),
        ConditionOperator::In => in_list(field, required()?, binds, false),
        ConditionOperator::NotIn => in_list(field, required()?, binds, true),
        ConditionOperator::IsNull => Ok(format!("{field} IS NULL")),
        ConditionOperator::IsNotNull => Ok(format!("{field} IS NOT NULL")),
        ConditionOperator::Between => between(field, required()?),
        // Pass-through to the store's regex operator; availability depends
        // on the underlying database.
        ConditionOperator::Regex => {
            Ok(format!("{field} REGEXP {}", sql_literal(required()?, field)?))
        }
    }
}

fn scalar(field: &str, op: &str, value: &JsonValue) -> Result<String, PredicateError> {
    Ok(format!("{field} {op} {}", sql_literal(value, field)?))
}

fn like(
    field: &str,
    value: &JsonValue,
    prefix: &str,
    suffix: &str,
    negated: bool,
) -> Result<String, PredicateError> {
    let text = literal_text(value, field)?;
    let pattern = quote_str(&format!("{prefix}{text}{suffix}"));
    let keyword = if negated { "NOT LIKE" } else { "LIKE" };
    Ok(format!("{field} {keyword} {pattern}"))
}

fn in_list(
    field: &str,
    value: &JsonValue,
    binds: &mut Vec<JsonValue>,
    negated: bool,
) -> Result<String, PredicateError> {
    let elements: Vec<JsonValue> = match value {
        JsonValue::Array(items) => items.clone(),
        // Accept pre-formatted list text ("1, 2, 3" or "a,b,c") from older
        // authoring surfaces; each element becomes a bind parameter.
        JsonValue::String(text) => text
            .split(',')
            .map(|part| part.trim().trim_matches('\'').trim_matches('"'))
            .filter(|part| !part.is_empty())
            .map(parse_list_element)
            .collect(),
        _ => {
            return Err(PredicateError::UnsupportedLiteral {
                field: field.to_string(),
            })
        }
    };
    if elements.is_empty() {
        return Err(PredicateError::EmptyInList {
            field: field.to_string(),
        });
    }

    let placeholders = vec!["?"; elements.len()].join(", ");
    binds.extend(elements);
    let keyword = if negated { "NOT IN" } else { "IN" };
    Ok(format!("{field} {keyword} ({placeholders})"))
}

fn parse_list_element(text: &str) -> JsonValue {
    if let Ok(int) = text.parse::<i64>() {
        return JsonValue::from(int);
    }
    if let Ok(float) = text.parse::<f64>() {
        return JsonValue::from(float);
    }
    JsonValue::from(text)
}

fn between(field: &str, value: &JsonValue) -> Result<String, PredicateError> {
    let bounds = match value {
        JsonValue::Array(items) if items.len() == 2 => items,
        _ => {
            return Err(PredicateError::InvalidBetweenBound {
                field: field.to_string(),
            })
        }
    };
    Ok(format!(
        "{field} BETWEEN {} AND {}",
        sql_literal(&bounds[0], field)?,
        sql_literal(&bounds[1], field)?
    ))
}

/// Render a scalar JSON value as an inline SQL literal. Strings are quoted
/// with embedded single quotes doubled.
pub(crate) fn sql_literal(value: &JsonValue, field: &str) -> Result<String, PredicateError> {
    match value {
        JsonValue::Null => Ok("NULL".to_string()),
        JsonValue::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::String(s) => Ok(quote_str(s)),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(PredicateError::UnsupportedLiteral {
            field: field.to_string(),
        }),
    }
}

fn literal_text(value: &JsonValue, field: &str) -> Result<String, PredicateError> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        _ => Err(PredicateError::UnsupportedLiteral {
            field: field.to_string(),
        }),
    }
}

fn quote_str(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
