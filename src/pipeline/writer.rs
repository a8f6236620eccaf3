//! Chunked, transactional commits of partitioned rows

use crate::mapping::TypedRow;
use crate::store::{EntityStore, TableSpec};
use crate::ImportError;
use tracing::{debug, error};

/// Rows committed by a writer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub inserted: usize,
    /// Insert rows skipped because the identifier already existed
    pub ignored: usize,
    pub updated: usize,
    /// Update rows whose identifier was no longer present
    pub unmatched: usize,
}

impl WriteReport {
    /// Rows in committed chunks
    pub fn committed(&self) -> usize {
        self.inserted + self.ignored + self.updated + self.unmatched
    }

    pub fn merge(&mut self, other: WriteReport) {
        self.inserted += other.inserted;
        self.ignored += other.ignored;
        self.updated += other.updated;
        self.unmatched += other.unmatched;
    }
}

/// Storage failure part-way through a commit
#[derive(Debug, thiserror::Error)]
#[error("{error} (after {} rows committed)", .report.committed())]
pub struct WriteFailure {
    /// Chunks committed before the failure
    pub report: WriteReport,
    #[source]
    pub error: ImportError,
}

/// Writes inserts then updates in chunks of `batch_size`, one transaction each
#[derive(Debug, Clone, Copy)]
pub struct BatchWriter {
    batch_size: usize,
}

impl BatchWriter {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Commit both sets; the first failing chunk stops the rest
    pub fn commit<S>(
        &self,
        store: &S,
        table: &TableSpec,
        inserts: &[TypedRow],
        updates: &[TypedRow],
    ) -> Result<WriteReport, WriteFailure>
    where
        S: EntityStore + ?Sized,
    {
        let mut report = WriteReport::default();

        for chunk in inserts.chunks(self.batch_size) {
            match store.insert_batch(table, chunk) {
                Ok(inserted) => {
                    report.inserted += inserted;
                    report.ignored += chunk.len().saturating_sub(inserted);
                }
                Err(error) => return Err(self.fail(table, "insert", report, error)),
            }
        }

        for chunk in updates.chunks(self.batch_size) {
            match store.update_batch(table, chunk) {
                Ok(matched) => {
                    report.updated += matched;
                    report.unmatched += chunk.len().saturating_sub(matched);
                }
                Err(error) => return Err(self.fail(table, "update", report, error)),
            }
        }

        debug!(
            table = table.name(),
            inserted = report.inserted,
            ignored = report.ignored,
            updated = report.updated,
            "Committed batch"
        );

        Ok(report)
    }

    fn fail(
        &self,
        table: &TableSpec,
        operation: &str,
        report: WriteReport,
        error: ImportError,
    ) -> WriteFailure {
        error!(
            table = table.name(),
            operation = operation,
            committed = report.committed(),
            "Chunk {} failed, remaining chunks skipped: {}",
            operation,
            error
        );
        WriteFailure { report, error }
    }
}
