//! Target store abstraction
//!
//! The pipeline only talks to [`EntityStore`], so the SQLite implementation
//! can be replaced without touching fetch, mapping, or partitioning logic.

mod sqlite;

pub use sqlite::{default_database_path, SqliteStore, StoreConfig, TableStats};

use crate::mapping::{FieldValue, MappingSet, TypeTag, TypedRow};
use crate::{ImportError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Storage operations needed by the import pipeline
pub trait EntityStore {
    /// Create the entity table if it does not exist yet
    fn ensure_table(&self, table: &TableSpec) -> Result<()>;

    /// Identifiers among `ids` already present, in canonical text form.
    /// One query for the whole slice.
    fn existing_ids(&self, table: &TableSpec, ids: &[FieldValue]) -> Result<HashSet<String>>;

    /// Insert rows in one transaction, skipping identifier conflicts.
    /// Returns the number of rows actually inserted.
    fn insert_batch(&self, table: &TableSpec, rows: &[TypedRow]) -> Result<usize>;

    /// Update rows by identifier in one transaction.
    /// Returns the number of rows that matched an existing identifier.
    fn update_batch(&self, table: &TableSpec, rows: &[TypedRow]) -> Result<usize>;

    /// Latest value of the table's cursor column
    fn high_water_mark(&self, table: &TableSpec) -> Result<Option<DateTime<Utc>>>;
}

/// Column of an entity table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub field_type: TypeTag,
}

/// Shape of an entity table, derived from its mapping set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    name: String,
    columns: Vec<ColumnSpec>,
    identifier: Option<String>,
    cursor_column: Option<String>,
}

impl TableSpec {
    /// One column per mapping, in mapping order
    pub fn from_mappings(name: impl Into<String>, mappings: &MappingSet) -> Result<Self> {
        let name = name.into();
        validate_sql_identifier(&name)?;

        let columns = mappings
            .iter()
            .map(|m| ColumnSpec {
                name: m.target_key.clone(),
                field_type: m.field_type,
            })
            .collect();

        Ok(Self {
            name,
            columns,
            identifier: mappings.identifier().map(|m| m.target_key.clone()),
            cursor_column: None,
        })
    }

    /// Use a timestamp column as the entity's high-water mark
    pub fn with_cursor_column(mut self, column: impl Into<String>) -> Result<Self> {
        let column = column.into();
        match self.column(&column).map(|c| c.field_type) {
            Some(TypeTag::Timestamp) => {
                self.cursor_column = Some(column);
                Ok(self)
            }
            Some(other) => Err(ImportError::Mapping(format!(
                "Cursor column {}.{} must be a timestamp, not {}",
                self.name, column, other
            ))),
            None => Err(ImportError::Mapping(format!(
                "Cursor column {}.{} is not mapped",
                self.name, column
            ))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn cursor_column(&self) -> Option<&str> {
        self.cursor_column.as_deref()
    }

    /// Columns written by an update: everything except the identifier
    pub fn update_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns
            .iter()
            .filter(move |c| Some(c.name.as_str()) != self.identifier())
    }
}

/// Check that a table or column name is a plain SQL identifier.
///
/// Names are interpolated into SQL, so only `[A-Za-z_][A-Za-z0-9_]*` is allowed.
pub fn validate_sql_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid && name.len() <= 63 {
        Ok(())
    } else {
        Err(ImportError::Mapping(format!(
            "Invalid SQL identifier: '{}'",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::FieldMapping;

    fn mappings() -> MappingSet {
        MappingSet::new(vec![
            FieldMapping::required("id", "id", TypeTag::String).identifier(),
            FieldMapping::new("name", "name", TypeTag::String),
            FieldMapping::new("updated", "last_update", TypeTag::Timestamp),
        ])
        .unwrap()
    }

    #[test]
    fn test_sql_identifier_validation() {
        assert!(validate_sql_identifier("issue_types").is_ok());
        assert!(validate_sql_identifier("_hidden2").is_ok());
        assert!(validate_sql_identifier("").is_err());
        assert!(validate_sql_identifier("2fast").is_err());
        assert!(validate_sql_identifier("drop table;").is_err());
        assert!(validate_sql_identifier("a\"b").is_err());
    }

    #[test]
    fn test_table_from_mappings() {
        let table = TableSpec::from_mappings("issue_types", &mappings()).unwrap();
        assert_eq!(table.columns().len(), 3);
        assert_eq!(table.identifier(), Some("id"));
        let update: Vec<_> = table.update_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(update, vec!["name", "last_update"]);
    }

    #[test]
    fn test_cursor_column_must_be_timestamp() {
        let table = TableSpec::from_mappings("issues", &mappings()).unwrap();
        assert!(table.clone().with_cursor_column("name").is_err());
        assert!(table.clone().with_cursor_column("missing").is_err());
        let table = table.with_cursor_column("last_update").unwrap();
        assert_eq!(table.cursor_column(), Some("last_update"));
    }
}
