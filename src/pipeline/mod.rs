//! Import pipeline
//!
//! Each fetched page flows through the same steps:
//!
//! 1. **Map**: `RecordMapper` turns raw JSON records into typed rows
//! 2. **Partition**: one identifier lookup splits rows into inserts and updates
//! 3. **Write**: `BatchWriter` commits both sets in bounded transactions
//!
//! `Importer` drives these steps per entity and collects the summaries.

pub mod importer;
pub mod outcome;
pub mod partition;
pub mod writer;

pub use importer::{skip_all, ImportSettings, Importer};
pub use outcome::{Abort, AbortKind, EntitySummary, ImportOutcome, RunSummary};
pub use partition::{partition, Partition};
pub use writer::{BatchWriter, WriteFailure, WriteReport};
