//! Endpoint registry
//!
//! Static table of importable entities. Each entry names the REST path, the
//! field of the response holding the records, the target table, and the
//! field mappings. Entries are added by explicit [`EndpointRegistry::register`]
//! calls; [`EndpointRegistry::builtin`] registers the shipped Jira entities.

mod builtin;

use crate::mapping::MappingSet;
use crate::store::TableSpec;
use crate::{ImportError, Result};

/// One importable entity
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSpec {
    name: String,
    path: String,
    list_field: Option<String>,
    paginated: bool,
    mappings: MappingSet,
    table: TableSpec,
}

impl EndpointSpec {
    /// Entity whose response body is a bare JSON array
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        table: impl Into<String>,
        mappings: MappingSet,
    ) -> Result<Self> {
        let name = name.into();
        let path = path.into();
        if name.is_empty() {
            return Err(ImportError::Mapping("endpoint name cannot be empty".to_string()));
        }
        if !path.starts_with('/') {
            return Err(ImportError::Mapping(format!(
                "Endpoint {} path must start with '/': {}",
                name, path
            )));
        }

        let table = TableSpec::from_mappings(table, &mappings)?;
        Ok(Self {
            name,
            path,
            list_field: None,
            paginated: true,
            mappings,
            table,
        })
    }

    /// Records live under this field of the response object
    pub fn with_list_field(mut self, field: impl Into<String>) -> Self {
        self.list_field = Some(field.into());
        self
    }

    /// Endpoint ignores `startAt`/`maxResults` and returns everything at once
    pub fn without_pagination(mut self) -> Self {
        self.paginated = false;
        self
    }

    /// Timestamp column whose maximum is the incremental sync cursor
    pub fn with_cursor_column(mut self, column: impl Into<String>) -> Result<Self> {
        self.table = self.table.with_cursor_column(column)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn list_field(&self) -> Option<&str> {
        self.list_field.as_deref()
    }

    pub fn is_paginated(&self) -> bool {
        self.paginated
    }

    pub fn mappings(&self) -> &MappingSet {
        &self.mappings
    }

    pub fn table(&self) -> &TableSpec {
        &self.table
    }
}

/// Registered entities, in registration order
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: Vec<EndpointSpec>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the shipped Jira entities
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        builtin::register_all(&mut registry)?;
        Ok(registry)
    }

    /// Add an entity; names and table names must be unique
    pub fn register(&mut self, endpoint: EndpointSpec) -> Result<()> {
        if self.get(endpoint.name()).is_some() {
            return Err(ImportError::Mapping(format!(
                "Endpoint {} is already registered",
                endpoint.name()
            )));
        }
        if let Some(other) = self
            .endpoints
            .iter()
            .find(|e| e.table().name() == endpoint.table().name())
        {
            return Err(ImportError::Mapping(format!(
                "Table {} is already used by endpoint {}",
                endpoint.table().name(),
                other.name()
            )));
        }

        tracing::debug!(
            endpoint = endpoint.name(),
            path = endpoint.path(),
            table = endpoint.table().name(),
            "Registered endpoint"
        );
        self.endpoints.push(endpoint);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&EndpointSpec> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.endpoints.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointSpec> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// One named entity, or all of them when `name` is `None`
    pub fn select(&self, name: Option<&str>) -> Result<Vec<&EndpointSpec>> {
        match name {
            None => Ok(self.endpoints.iter().collect()),
            Some(name) => self
                .get(name)
                .map(|e| vec![e])
                .ok_or_else(|| ImportError::UnknownEndpoint {
                    name: name.to_string(),
                    registered: self.names().join(", "),
                }),
        }
    }
}
