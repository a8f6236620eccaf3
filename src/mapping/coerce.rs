//! Type coercion from raw JSON to typed field values
//!
//! Coercion never fails a record on its own: a value that cannot be
//! converted becomes `None` (null) and a warning is logged. Whether null is
//! acceptable is decided by the mapping (`required` / `default`).

use super::types::{FieldValue, TypeTag};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

/// Offset-aware formats tried after RFC 3339, in order
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

/// Formats without an offset; interpreted as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Coerce a present JSON value to the target type
///
/// `field` names the mapping for log messages only.
pub fn coerce(value: &Value, tag: TypeTag, field: &str) -> Option<FieldValue> {
    let coerced = match tag {
        TypeTag::Identifier => coerce_identifier(value),
        TypeTag::Timestamp => coerce_timestamp(value),
        TypeTag::Boolean => coerce_boolean(value),
        TypeTag::Integer => coerce_integer(value),
        TypeTag::Float => coerce_float(value),
        TypeTag::String => Ok(Some(coerce_string(value))),
        TypeTag::Json => coerce_json(value),
    };

    match coerced {
        Ok(v) => v,
        Err(reason) => {
            warn!(field = field, field_type = %tag, "Failed to parse field: {}", reason);
            None
        }
    }
}

/// Result of a single coercion: `Ok(None)` is a legitimate null,
/// `Err` is a conversion failure that is logged and then treated as null.
type Coerced = std::result::Result<Option<FieldValue>, String>;

fn coerce_identifier(value: &Value) -> Coerced {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Uuid::parse_str(s.trim())
            .map(|id| Some(FieldValue::Id(id)))
            .map_err(|e| format!("invalid identifier '{}': {}", s, e)),
        other => Err(format!("expected identifier string, got {}", kind(other))),
    }
}

fn coerce_timestamp(value: &Value) -> Coerced {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_timestamp(s)
            .map(|ts| Some(FieldValue::Timestamp(ts)))
            .ok_or_else(|| format!("unrecognized timestamp '{}'", s)),
        other => Err(format!("expected timestamp string, got {}", kind(other))),
    }
}

/// Parse a date/time string in any of the accepted layouts, normalized to UTC
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(s, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn coerce_boolean(value: &Value) -> Coerced {
    let truthy = match value {
        Value::Null => return Ok(None),
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    };
    Ok(Some(FieldValue::Bool(truthy)))
}

fn coerce_integer(value: &Value) -> Coerced {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(FieldValue::Int(i64::from(*b)))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(Some(FieldValue::Int(i)));
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f.trunc().abs() < i64::MAX as f64 => {
                    Ok(Some(FieldValue::Int(f.trunc() as i64)))
                }
                _ => Err(format!("integer out of range: {}", n)),
            }
        }
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(|i| Some(FieldValue::Int(i)))
            .map_err(|e| format!("invalid integer '{}': {}", s, e)),
        other => Err(format!("expected integer, got {}", kind(other))),
    }
}

fn coerce_float(value: &Value) -> Coerced {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(FieldValue::Float(if *b { 1.0 } else { 0.0 }))),
        Value::Number(n) => n
            .as_f64()
            .map(|f| Some(FieldValue::Float(f)))
            .ok_or_else(|| format!("float out of range: {}", n)),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Some(FieldValue::Float(f))),
            Ok(_) => Err(format!("non-finite float '{}'", s)),
            Err(e) => Err(format!("invalid float '{}': {}", s, e)),
        },
        other => Err(format!("expected float, got {}", kind(other))),
    }
}

// Strings are never null once the key is present.
fn coerce_string(value: &Value) -> FieldValue {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    };
    FieldValue::Text(text)
}

fn coerce_json(value: &Value) -> Coerced {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(FieldValue::Json(map.clone()))),
        other => Err(format!("expected object, got {}", kind(other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
