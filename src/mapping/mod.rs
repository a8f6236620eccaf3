//! Field mapping and type coercion
//!
//! Turns heterogeneous Jira JSON records into typed rows:
//!
//! - **types**: the closed set of target types and coerced values
//! - **coerce**: one coercion function per type tag
//! - **record**: declarative field mappings and record extraction

pub mod coerce;
mod record;
mod types;

pub use coerce::{coerce, parse_timestamp};
pub use record::{FieldMapping, MappedBatch, MappingSet, RecordMapper, Rejected, TypedRow};
pub use types::{format_timestamp, FieldValue, TypeTag};
