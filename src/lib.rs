//! jira-import - Incremental, idempotent Jira REST importer
//!
//! Pulls paginated records from the Jira Cloud REST API and upserts them
//! into a local SQLite database. Re-running an import only fetches records
//! updated since the newest one already stored, and never duplicates rows.
//!
//! # Architecture
//!
//! - **integrations**: HTTP transport, paged fetching, retry with backoff
//! - **mapping**: declarative field mappings and JSON type coercion
//! - **pipeline**: partitioning into inserts/updates, batched writes, the import driver
//! - **registry**: the importable entities and their table layouts
//! - **store**: storage trait and the SQLite implementation
//! - **config**: YAML settings, credentials, validation

pub mod config;
pub mod error;
pub mod integrations;
pub mod logging;
pub mod mapping;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod store;

// Re-exports
pub use error::{ImportError, Result};
