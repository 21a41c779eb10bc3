//! Dynamic row decoding for `SELECT *` results.
//!
//! The engine only needs field names plus runtime values; numeric-ness is
//! inferred from the fetched value, not from schema metadata.

use serde_json::{Map, Number, Value as JsonValue};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row, TypeInfo};

/// One fetched row as a field → value map.
pub(crate) type Record = Map<String, JsonValue>;

pub(crate) fn record_from_row(row: &SqliteRow) -> Result<Record, sqlx::Error> {
    let mut record = Record::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "NULL" => JsonValue::Null,
            "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" => row
                .try_get::<Option<i64>, _>(index)?
                .map(JsonValue::from)
                .unwrap_or(JsonValue::Null),
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row
                .try_get::<Option<f64>, _>(index)?
                .and_then(Number::from_f64)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            "BOOLEAN" => row
                .try_get::<Option<bool>, _>(index)?
                .map(JsonValue::from)
                .unwrap_or(JsonValue::Null),
            // Binary columns are not addressable by rules.
            "BLOB" => JsonValue::Null,
            _ => row
                .try_get::<Option<String>, _>(index)?
                .map(JsonValue::from)
                .unwrap_or(JsonValue::Null),
        };
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

pub(crate) fn numeric_value(value: &JsonValue) -> Option<f64> {
    value.as_f64()
}

/// Render a computed value as JSON, keeping integral results integral so
/// INTEGER columns stay INTEGER after an UPDATE.
pub(crate) fn json_number(value: f64) -> JsonValue {
    if value.fract() == 0.0 && value.abs() < 9.007_199_254_740_992e15 {
        JsonValue::from(value as i64)
    } else {
        Number::from_f64(value)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

/// Human-readable form of a row value, without JSON string quoting.
pub(crate) fn value_display(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &JsonValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        JsonValue::Null => query.bind(None::<String>),
        JsonValue::Bool(b) => query.bind(*b),
        JsonValue::Number(n) if n.is_i64() => query.bind(n.as_i64().unwrap_or_default()),
        JsonValue::Number(n) => query.bind(n.as_f64().unwrap_or_default()),
        JsonValue::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}
