//! Insert-vs-update routing for a batch of typed rows

use crate::mapping::{FieldValue, TypedRow};
use crate::store::{EntityStore, TableSpec};
use crate::Result;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Rows of one batch split by destination
#[derive(Debug, Default)]
pub struct Partition {
    pub to_insert: Vec<TypedRow>,
    pub to_update: Vec<TypedRow>,
    /// Rows dropped for lacking an identifier value
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Split rows into inserts and updates with one existence lookup
///
/// Tables without an identifier column are insert-only. Otherwise rows
/// with a null or blank identifier are dropped as failed, and the store
/// is asked once about the identifiers of the remaining rows.
pub fn partition<S>(rows: Vec<TypedRow>, table: &TableSpec, store: &S) -> Result<Partition>
where
    S: EntityStore + ?Sized,
{
    let Some(id_field) = table.identifier() else {
        return Ok(Partition {
            to_insert: rows,
            ..Default::default()
        });
    };

    let mut result = Partition::default();
    let mut keyed = Vec::with_capacity(rows.len());
    let mut lookup: Vec<FieldValue> = Vec::new();
    let mut seen = HashSet::new();

    for row in rows {
        match row.get(id_field) {
            Some(id) if !id.is_blank() => {
                let key = id.key_string();
                if seen.insert(key.clone()) {
                    lookup.push(id.clone());
                }
                keyed.push((key, row));
            }
            _ => {
                warn!(table = table.name(), field = id_field, "Row has no identifier, skipping");
                result.failed += 1;
                result
                    .errors
                    .push(format!("Missing identifier field: {}", id_field));
            }
        }
    }

    if keyed.is_empty() {
        return Ok(result);
    }

    let existing = store.existing_ids(table, &lookup)?;
    let mut inserting = HashSet::new();

    for (key, row) in keyed {
        if existing.contains(&key) || inserting.contains(&key) {
            result.to_update.push(row);
        } else {
            inserting.insert(key);
            result.to_insert.push(row);
        }
    }

    debug!(
        table = table.name(),
        inserts = result.to_insert.len(),
        updates = result.to_update.len(),
        failed = result.failed,
        "Partitioned batch"
    );

    Ok(result)
}


#[cfg(test)]
mod tests {
    use super::testing::CountingStore;
    use super::*;
    use crate::mapping::{FieldMapping, MappingSet, TypeTag};

    fn keyed_table() -> TableSpec {
        let mappings = MappingSet::new(vec![
            FieldMapping::required("id", "id", TypeTag::String).identifier(),
            FieldMapping::new("name", "name", TypeTag::String),
        ])
        .unwrap();
        TableSpec::from_mappings("issue_types", &mappings).unwrap()
    }

    fn row(id: Option<&str>, name: &str) -> TypedRow {
        let mut row = TypedRow::new();
        row.set("id", id.map(FieldValue::from));
        row.set("name", Some(FieldValue::from(name)));
        row
    }

    #[test]
    fn test_existing_route_to_update() {
        let store = CountingStore::with_ids(["1", "3", "5", "7"]);
        let rows: Vec<TypedRow> = (1..=10)
            .map(|i| row(Some(i.to_string().as_str()), "x"))
            .collect();

        let result = partition(rows, &keyed_table(), &store).unwrap();

        assert_eq!(result.to_update.len(), 4);
        assert_eq!(result.to_insert.len(), 6);
        assert_eq!(result.failed, 0);
        assert_eq!(store.lookups.get(), 1);

        let updated: Vec<&FieldValue> = result
            .to_update
            .iter()
            .filter_map(|r| r.get("id"))
            .collect();
        assert_eq!(
            updated,
            vec![
                &FieldValue::from("1"),
                &FieldValue::from("3"),
                &FieldValue::from("5"),
                &FieldValue::from("7")
            ]
        );
    }

    #[test]
    fn test_rows_without_identifier_fail() {
        let store = CountingStore::default();
        let rows = vec![row(Some("1"), "a"), row(None, "b"), row(Some(""), "c")];

        let result = partition(rows, &keyed_table(), &store).unwrap();

        assert_eq!(result.to_insert.len(), 1);
        assert_eq!(result.failed, 2);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_no_lookup_without_keyed_rows() {
        let store = CountingStore::default();

        let result = partition(vec![row(None, "a")], &keyed_table(), &store).unwrap();
        assert_eq!(result.failed, 1);

        let result = partition(Vec::new(), &keyed_table(), &store).unwrap();
        assert!(result.to_insert.is_empty());

        assert_eq!(store.lookups.get(), 0);
    }

    #[test]
    fn test_table_without_identifier_is_insert_only() {
        let mappings =
            MappingSet::new(vec![FieldMapping::new("name", "name", TypeTag::String)]).unwrap();
        let table = TableSpec::from_mappings("events", &mappings).unwrap();
        let store = CountingStore::default();

        let mut a = TypedRow::new();
        a.set("name", Some(FieldValue::from("a")));
        let result = partition(vec![a.clone(), a], &table, &store).unwrap();

        assert_eq!(result.to_insert.len(), 2);
        assert!(result.to_update.is_empty());
        assert_eq!(store.lookups.get(), 0);
    }

    #[test]
    fn test_duplicate_identifier_in_batch() {
        let store = CountingStore::default();
        let rows = vec![row(Some("9"), "first"), row(Some("9"), "second")];

        let result = partition(rows, &keyed_table(), &store).unwrap();

        assert_eq!(result.to_insert.len(), 1);
        assert_eq!(result.to_update.len(), 1);
        assert_eq!(
            result.to_update[0].get("name"),
            Some(&FieldValue::from("second"))
        );
    }
}
