//! SQLite entity store

use super::{EntityStore, TableSpec};
use crate::mapping::{parse_timestamp, FieldValue, TypedRow};
use crate::{ImportError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to SQLite database file
    pub path: PathBuf,

    /// Enable WAL mode for better concurrency
    pub wal_mode: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            wal_mode: true,
        }
    }
}

/// Default database location (~/.config/jira-import/import.db)
pub fn default_database_path() -> PathBuf {
    // Always use ~/.config for consistency across platforms (macOS, Linux)
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".config");
    path.push("jira-import");
    path.push("import.db");
    path
}

/// Row count and high-water mark of one entity table
#[derive(Debug, Clone, PartialEq)]
pub struct TableStats {
    pub table: String,
    pub rows: usize,
    pub high_water_mark: Option<DateTime<Utc>>,
}

/// SQLite-backed [`EntityStore`]
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create a database file
    pub fn new(config: StoreConfig) -> Result<Self> {
        // Create parent directory if needed
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %config.path.display(), "Opening import database");

        let conn = Connection::open(&config.path)?;

        if config.wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }

        Ok(Self {
            conn,
            path: Some(config.path),
        })
    }

    /// Private in-memory database
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    /// Database file path; `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of rows in an entity table (0 if it does not exist yet)
    pub fn row_count(&self, table: &TableSpec) -> Result<usize> {
        if !self.table_exists(table.name())? {
            return Ok(0);
        }
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", table.name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Row count and high-water mark for the status view
    pub fn table_stats(&self, table: &TableSpec) -> Result<TableStats> {
        let exists = self.table_exists(table.name())?;
        Ok(TableStats {
            table: table.name().to_string(),
            rows: if exists { self.row_count(table)? } else { 0 },
            high_water_mark: if exists {
                self.high_water_mark(table)?
            } else {
                None
            },
        })
    }

    /// Canonical text values of one column, ordered; used by tests and the status view
    pub fn column_values(&self, table: &TableSpec, column: &str) -> Result<Vec<Option<String>>> {
        if table.column(column).is_none() {
            return Err(ImportError::Storage(format!(
                "Unknown column {}.{}",
                table.name(),
                column
            )));
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT CAST(\"{col}\" AS TEXT) FROM \"{table}\" ORDER BY \"{col}\"",
            col = column,
            table = table.name()
        ))?;
        let values = stmt
            .query_map([], |row| row.get::<_, Option<String>>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(values)
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn require_identifier<'t>(&self, table: &'t TableSpec) -> Result<&'t str> {
        table.identifier().ok_or_else(|| {
            ImportError::Storage(format!(
                "Table {} has no identifier column; only inserts are possible",
                table.name()
            ))
        })
    }
}

impl EntityStore for SqliteStore {
    fn ensure_table(&self, table: &TableSpec) -> Result<()> {
        let columns = table
            .columns()
            .iter()
            .map(|c| {
                if Some(c.name.as_str()) == table.identifier() {
                    format!("\"{}\" {} PRIMARY KEY", c.name, c.field_type.sql_type())
                } else {
                    format!("\"{}\" {}", c.name, c.field_type.sql_type())
                }
            })
            .collect::<Vec<_>>()
            .join(",\n    ");

        let mut ddl = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\n    {}\n);",
            table.name(),
            columns
        );
        if let Some(cursor) = table.cursor_column() {
            ddl.push_str(&format!(
                "\nCREATE INDEX IF NOT EXISTS \"idx_{table}_{col}\" ON \"{table}\"(\"{col}\");",
                table = table.name(),
                col = cursor
            ));
        }

        self.conn.execute_batch(&ddl)?;
        Ok(())
    }

    fn existing_ids(&self, table: &TableSpec, ids: &[FieldValue]) -> Result<HashSet<String>> {
        let id_column = self.require_identifier(table)?;
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT CAST(\"{id}\" AS TEXT) FROM \"{table}\" WHERE \"{id}\" IN ({placeholders})",
            id = id_column,
            table = table.name(),
            placeholders = placeholders
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let found = stmt
            .query_map(params_from_iter(ids.iter()), |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;

        tracing::debug!(
            table = table.name(),
            checked = ids.len(),
            found = found.len(),
            "Checked existing identifiers"
        );
        Ok(found)
    }

    fn insert_batch(&self, table: &TableSpec, rows: &[TypedRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let names: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
        let quoted = names
            .iter()
            .map(|n| format!("\"{}\"", n))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=names.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let conflict = match table.identifier() {
            Some(id) => format!(" ON CONFLICT(\"{}\") DO NOTHING", id),
            None => String::new(),
        };
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({}){}",
            table.name(),
            quoted,
            placeholders,
            conflict
        );

        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for row in rows {
                let values = names.iter().map(|n| row.get(n));
                inserted += stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn update_batch(&self, table: &TableSpec, rows: &[TypedRow]) -> Result<usize> {
        let id_column = self.require_identifier(table)?;
        if rows.is_empty() {
            return Ok(0);
        }

        let names: Vec<&str> = table.update_columns().map(|c| c.name.as_str()).collect();
        if names.is_empty() {
            // nothing but the identifier is mapped; a match is a row that exists
            let ids: Vec<FieldValue> = rows
                .iter()
                .filter_map(|r| r.get(id_column))
                .cloned()
                .collect();
            let existing = self.existing_ids(table, &ids)?;
            return Ok(rows
                .iter()
                .filter_map(|r| r.get(id_column))
                .filter(|id| existing.contains(&id.key_string()))
                .count());
        }

        let assignments = names
            .iter()
            .enumerate()
            .map(|(i, n)| format!("\"{}\" = ?{}", n, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE \"{}\" = ?{}",
            table.name(),
            assignments,
            id_column,
            names.len() + 1
        );

        let tx = self.conn.unchecked_transaction()?;
        let mut matched = 0;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for row in rows {
                let values = names
                    .iter()
                    .map(|n| row.get(n))
                    .chain(std::iter::once(row.get(id_column)));
                matched += stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        Ok(matched)
    }

    fn high_water_mark(&self, table: &TableSpec) -> Result<Option<DateTime<Utc>>> {
        let Some(cursor) = table.cursor_column() else {
            return Ok(None);
        };

        let latest: Option<String> = self.conn.query_row(
            &format!("SELECT MAX(\"{}\") FROM \"{}\"", cursor, table.name()),
            [],
            |row| row.get(0),
        )?;

        Ok(latest.as_deref().and_then(parse_timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{FieldMapping, MappingSet, TypeTag};
    use chrono::TimeZone;
    use tempfile::NamedTempFile;

    fn issue_table() -> TableSpec {
        let mappings = MappingSet::new(vec![
            FieldMapping::required("id", "id", TypeTag::String).identifier(),
            FieldMapping::new("name", "name", TypeTag::String),
            FieldMapping::new("updated", "last_update", TypeTag::Timestamp),
        ])
        .unwrap();
        TableSpec::from_mappings("issues", &mappings)
            .unwrap()
            .with_cursor_column("last_update")
            .unwrap()
    }

    fn row(id: &str, name: &str, day: u32) -> TypedRow {
        let mut row = TypedRow::new();
        row.set("id", Some(FieldValue::from(id)));
        row.set("name", Some(FieldValue::from(name)));
        row.set(
            "last_update",
            Some(FieldValue::Timestamp(
                Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
            )),
        );
        row
    }

    #[test]
    fn test_store_creation() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = StoreConfig {
            path: temp_file.path().to_path_buf(),
            ..Default::default()
        };

        let store = SqliteStore::new(config).unwrap();
        assert!(store.path().unwrap().exists());
    }

    #[test]
    fn test_insert_ignores_conflicts() {
        let store = SqliteStore::in_memory().unwrap();
        let table = issue_table();
        store.ensure_table(&table).unwrap();

        assert_eq!(store.insert_batch(&table, &[row("1", "a", 1), row("2", "b", 2)]).unwrap(), 2);
        // "2" already exists: skipped, not an error
        assert_eq!(store.insert_batch(&table, &[row("2", "changed", 3), row("3", "c", 3)]).unwrap(), 1);

        assert_eq!(store.row_count(&table).unwrap(), 3);
        let names = store.column_values(&table, "name").unwrap();
        assert!(names.contains(&Some("b".to_string())));
        assert!(!names.contains(&Some("changed".to_string())));
    }

    #[test]
    fn test_existing_ids_and_update() {
        let store = SqliteStore::in_memory().unwrap();
        let table = issue_table();
        store.ensure_table(&table).unwrap();
        store.insert_batch(&table, &[row("1", "a", 1), row("2", "b", 2)]).unwrap();

        let ids = vec![FieldValue::from("1"), FieldValue::from("2"), FieldValue::from("9")];
        let found = store.existing_ids(&table, &ids).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.contains("1") && found.contains("2"));

        let matched = store.update_batch(&table, &[row("1", "renamed", 5), row("9", "ghost", 5)]).unwrap();
        assert_eq!(matched, 1);
        assert_eq!(store.row_count(&table).unwrap(), 2);
        let names = store.column_values(&table, "name").unwrap();
        assert_eq!(names, vec![Some("b".to_string()), Some("renamed".to_string())]);
    }

    #[test]
    fn test_identifier_only_update_counts_existing_rows() {
        let mappings = MappingSet::new(vec![
            FieldMapping::required("id", "id", TypeTag::String).identifier(),
        ])
        .unwrap();
        let table = TableSpec::from_mappings("watchers", &mappings).unwrap();
        let store = SqliteStore::in_memory().unwrap();
        store.ensure_table(&table).unwrap();

        let id_row = |id: &str| {
            let mut row = TypedRow::new();
            row.set("id", Some(FieldValue::from(id)));
            row
        };
        store.insert_batch(&table, &[id_row("1"), id_row("2")]).unwrap();

        let matched = store
            .update_batch(&table, &[id_row("1"), id_row("7"), id_row("8")])
            .unwrap();
        assert_eq!(matched, 1);
    }

    #[test]
    fn test_high_water_mark() {
        let store = SqliteStore::in_memory().unwrap();
        let table = issue_table();
        store.ensure_table(&table).unwrap();
        assert_eq!(store.high_water_mark(&table).unwrap(), None);

        store
            .insert_batch(&table, &[row("1", "a", 9), row("2", "b", 21), row("3", "c", 4)])
            .unwrap();
        assert_eq!(
            store.high_water_mark(&table).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 21, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_identifierless_table_is_insert_only() {
        let mappings =
            MappingSet::new(vec![FieldMapping::new("name", "name", TypeTag::String)]).unwrap();
        let table = TableSpec::from_mappings("labels", &mappings).unwrap();
        let store = SqliteStore::in_memory().unwrap();
        store.ensure_table(&table).unwrap();

        let mut r = TypedRow::new();
        r.set("name", Some(FieldValue::from("ops")));
        store.insert_batch(&table, &[r.clone()]).unwrap();
        store.insert_batch(&table, &[r.clone()]).unwrap();
        assert_eq!(store.row_count(&table).unwrap(), 2);

        assert!(store.update_batch(&table, &[r]).is_err());
        assert!(store.existing_ids(&table, &[]).is_err());
    }

    #[test]
    fn test_failed_chunk_rolls_back() {
        let store = SqliteStore::in_memory().unwrap();
        let table = issue_table();
        store.ensure_table(&table).unwrap();

        store
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON issues
                 WHEN NEW.name = 'boom' BEGIN SELECT RAISE(ABORT, 'boom'); END;",
            )
            .unwrap();

        let result = store.insert_batch(&table, &[row("1", "a", 1), row("2", "boom", 2)]);
        assert!(result.is_err());
        assert_eq!(store.row_count(&table).unwrap(), 0);
    }

    #[test]
    fn test_table_stats_before_creation() {
        let store = SqliteStore::in_memory().unwrap();
        let stats = store.table_stats(&issue_table()).unwrap();
        assert_eq!(stats.rows, 0);
        assert_eq!(stats.high_water_mark, None);
    }
}
