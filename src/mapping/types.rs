//! Target types and coerced values

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Target type of a mapped field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    /// UUID identifier
    Identifier,
    Timestamp,
    Boolean,
    Integer,
    Float,
    String,
    /// Structured blob (JSON object)
    Json,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Identifier => "identifier",
            TypeTag::Timestamp => "timestamp",
            TypeTag::Boolean => "boolean",
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::Json => "json",
        }
    }

    /// SQLite column affinity used when creating entity tables
    pub fn sql_type(&self) -> &'static str {
        match self {
            TypeTag::Identifier | TypeTag::Timestamp | TypeTag::String | TypeTag::Json => "TEXT",
            TypeTag::Boolean | TypeTag::Integer => "INTEGER",
            TypeTag::Float => "REAL",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coerced, typed value. Null is `Option::None` at the use site.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Id(Uuid),
    Timestamp(DateTime<Utc>),
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Map<String, serde_json::Value>),
}

impl FieldValue {
    /// Canonical text form, used as the identity key of a row
    pub fn key_string(&self) -> String {
        match self {
            FieldValue::Id(id) => id.hyphenated().to_string(),
            FieldValue::Timestamp(ts) => format_timestamp(ts),
            FieldValue::Bool(b) => String::from(if *b { "1" } else { "0" }),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Json(map) => serde_json::Value::Object(map.clone()).to_string(),
        }
    }

    /// True for values that cannot serve as a row identity
    pub fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Fixed-width RFC 3339 form so lexical order in SQLite matches time order
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            FieldValue::Id(id) => SqlValue::Text(id.hyphenated().to_string()),
            FieldValue::Timestamp(ts) => SqlValue::Text(format_timestamp(ts)),
            FieldValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
            FieldValue::Int(i) => SqlValue::Integer(*i),
            FieldValue::Float(f) => SqlValue::Real(*f),
            FieldValue::Text(s) => return Ok(ToSqlOutput::from(s.as_str())),
            FieldValue::Json(map) => SqlValue::Text(
                serde_json::to_string(map)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
            ),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}
