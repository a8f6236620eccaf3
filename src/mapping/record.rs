//! Declarative field mappings and record extraction

use super::coerce::coerce;
use super::types::{FieldValue, TypeTag};
use crate::store::validate_sql_identifier;
use crate::{ImportError, Result};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::error;

/// Mapping of one JSON field onto one table column
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    /// Key in the raw record; dotted paths reach into nested objects
    pub source_key: String,

    /// Column name in the target table
    pub target_key: String,

    pub field_type: TypeTag,

    /// Reject the record when the coerced value is null
    pub required: bool,

    /// Value used when the coerced value is null
    pub default: Option<FieldValue>,

    /// Designated unique key for insert-vs-update decisions
    pub is_identifier: bool,
}

impl FieldMapping {
    /// Optional field with no default
    pub fn new(
        source_key: impl Into<String>,
        target_key: impl Into<String>,
        field_type: TypeTag,
    ) -> Self {
        Self {
            source_key: source_key.into(),
            target_key: target_key.into(),
            field_type,
            required: false,
            default: None,
            is_identifier: false,
        }
    }

    /// Field whose absence rejects the record
    pub fn required(
        source_key: impl Into<String>,
        target_key: impl Into<String>,
        field_type: TypeTag,
    ) -> Self {
        Self {
            required: true,
            ..Self::new(source_key, target_key, field_type)
        }
    }

    pub fn with_default(mut self, default: impl Into<FieldValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Mark this field as the entity's identifier
    pub fn identifier(mut self) -> Self {
        self.is_identifier = true;
        self
    }
}

/// Validated set of field mappings for one entity
#[derive(Debug, Clone, PartialEq)]
pub struct MappingSet {
    mappings: Vec<FieldMapping>,
}

impl MappingSet {
    /// Validate and build a mapping set
    ///
    /// Rejects required fields with defaults, more than one identifier,
    /// duplicate target keys, and target keys that are not plain SQL names.
    pub fn new(mappings: Vec<FieldMapping>) -> Result<Self> {
        if mappings.is_empty() {
            return Err(ImportError::Mapping(
                "at least one field mapping is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut identifiers = Vec::new();

        for mapping in &mappings {
            if mapping.required && mapping.default.is_some() {
                return Err(ImportError::Mapping(format!(
                    "Field {} cannot be both required and have a default value",
                    mapping.target_key
                )));
            }
            validate_sql_identifier(&mapping.target_key)?;
            if !seen.insert(mapping.target_key.as_str()) {
                return Err(ImportError::Mapping(format!(
                    "Duplicate target field: {}",
                    mapping.target_key
                )));
            }
            if mapping.is_identifier {
                identifiers.push(mapping.target_key.as_str());
            }
        }

        if identifiers.len() > 1 {
            return Err(ImportError::Mapping(format!(
                "At most one identifier field is allowed, found: {}",
                identifiers.join(", ")
            )));
        }

        Ok(Self { mappings })
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldMapping> {
        self.mappings.iter()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// The identifier mapping, if the entity has one
    pub fn identifier(&self) -> Option<&FieldMapping> {
        self.mappings.iter().find(|m| m.is_identifier)
    }

    pub fn get(&self, target_key: &str) -> Option<&FieldMapping> {
        self.mappings.iter().find(|m| m.target_key == target_key)
    }
}

/// A fully populated typed row, keyed by target column
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypedRow {
    values: BTreeMap<String, Option<FieldValue>>,
}

impl TypedRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: impl Into<String>, value: Option<FieldValue>) {
        self.values.insert(column.into(), value);
    }

    /// Value of a column; `None` for null or unknown columns
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.values.get(column).and_then(|v| v.as_ref())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, Option<&FieldValue>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }
}

/// A record that could not be mapped
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("record rejected: {}", .reasons.join("; "))]
pub struct Rejected {
    pub reasons: Vec<String>,
}

/// Rows produced from one page of raw records
#[derive(Debug, Default)]
pub struct MappedBatch {
    pub rows: Vec<TypedRow>,
    pub rejected: usize,
    pub errors: Vec<String>,
}

/// Turns raw JSON records into typed rows
pub struct RecordMapper<'a> {
    mappings: &'a MappingSet,
}

impl<'a> RecordMapper<'a> {
    pub fn new(mappings: &'a MappingSet) -> Self {
        Self { mappings }
    }

    /// Map a single record
    pub fn extract(&self, raw: &Value) -> std::result::Result<TypedRow, Rejected> {
        let record = raw.as_object().ok_or_else(|| Rejected {
            reasons: vec!["record is not a JSON object".to_string()],
        })?;

        let mut row = TypedRow::new();
        let mut missing = Vec::new();

        for mapping in self.mappings.iter() {
            let coerced = lookup(record, &mapping.source_key)
                .and_then(|value| coerce(value, mapping.field_type, &mapping.target_key));

            if mapping.required && coerced.is_none() {
                error!(field = %mapping.target_key, "Missing required field");
                missing.push(format!("Missing required field: {}", mapping.target_key));
                continue;
            }

            row.set(mapping.target_key.clone(), coerced.or_else(|| mapping.default.clone()));
        }

        if missing.is_empty() {
            Ok(row)
        } else {
            Err(Rejected { reasons: missing })
        }
    }

    /// Map every record of a page; rejections never affect sibling records
    pub fn extract_all(&self, records: &[Value]) -> MappedBatch {
        let mut batch = MappedBatch::default();
        for raw in records {
            match self.extract(raw) {
                Ok(row) => batch.rows.push(row),
                Err(rejected) => {
                    batch.rejected += 1;
                    batch.errors.push(rejected.to_string());
                }
            }
        }
        batch
    }
}

fn lookup<'v>(record: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
    if let Some(value) = record.get(key) {
        return Some(value);
    }
    if !key.contains('.') {
        return None;
    }

    let mut parts = key.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue_type_mappings() -> MappingSet {
        MappingSet::new(vec![
            FieldMapping::required("id", "id", TypeTag::String).identifier(),
            FieldMapping::new("name", "name", TypeTag::String),
            FieldMapping::new("hierarchyLevel", "hierarchy_level", TypeTag::Integer),
            FieldMapping::new("subtask", "subtask", TypeTag::Boolean).with_default(false),
            FieldMapping::new("fields.status.name", "status", TypeTag::String),
        ])
        .unwrap()
    }

    #[test]
    fn test_required_with_default_is_rejected() {
        let err = MappingSet::new(vec![
            FieldMapping::required("id", "id", TypeTag::String).with_default("x")
        ])
        .unwrap_err();
        assert!(err.to_string().contains("cannot be both required"));
    }

    #[test]
    fn test_single_identifier_enforced() {
        let err = MappingSet::new(vec![
            FieldMapping::required("id", "id", TypeTag::String).identifier(),
            FieldMapping::required("key", "key", TypeTag::String).identifier(),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("At most one identifier"));
    }

    #[test]
    fn test_duplicate_and_invalid_targets() {
        assert!(MappingSet::new(vec![
            FieldMapping::new("a", "name", TypeTag::String),
            FieldMapping::new("b", "name", TypeTag::String),
        ])
        .is_err());
        assert!(MappingSet::new(vec![FieldMapping::new("a", "bad name", TypeTag::String)]).is_err());
    }

    #[test]
    fn test_extract_fills_defaults() {
        let mappings = issue_type_mappings();
        let mapper = RecordMapper::new(&mappings);

        let row = mapper
            .extract(&json!({"id": "10001", "name": "Bug", "hierarchyLevel": 0}))
            .unwrap();

        assert_eq!(row.len(), mappings.len());
        assert_eq!(row.get("id"), Some(&FieldValue::from("10001")));
        assert_eq!(row.get("hierarchy_level"), Some(&FieldValue::Int(0)));
        assert_eq!(row.get("subtask"), Some(&FieldValue::Bool(false)));
        // absent string key stays null
        assert!(row.contains("status"));
        assert_eq!(row.get("status"), None);
    }

    #[test]
    fn test_extract_nested_path() {
        let mappings = issue_type_mappings();
        let mapper = RecordMapper::new(&mappings);

        let row = mapper
            .extract(&json!({"id": "1", "fields": {"status": {"name": "Done"}}}))
            .unwrap();
        assert_eq!(row.get("status"), Some(&FieldValue::from("Done")));
    }

    #[test]
    fn test_missing_required_rejects_record() {
        let mappings = issue_type_mappings();
        let mapper = RecordMapper::new(&mappings);

        let rejected = mapper.extract(&json!({"name": "Orphan"})).unwrap_err();
        assert_eq!(rejected.reasons, vec!["Missing required field: id".to_string()]);

        assert!(mapper.extract(&json!("not an object")).is_err());

        // a present-but-null string key coerces to "" and is left to the partitioner
        let row = mapper.extract(&json!({"id": null})).unwrap();
        assert!(row.get("id").unwrap().is_blank());
    }

    #[test]
    fn test_rejection_is_isolated() {
        let mappings = issue_type_mappings();
        let mapper = RecordMapper::new(&mappings);

        let batch = mapper.extract_all(&[
            json!({"id": "1", "name": "Bug"}),
            json!({"name": "no id"}),
            json!({"id": "3", "name": "Story"}),
            json!({"title": "still no id"}),
        ]);

        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.rejected, 2);
        assert_eq!(batch.errors.len(), 2);
    }
}
