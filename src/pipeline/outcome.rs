//! Result types for batches, entity runs, and whole runs

use super::writer::WriteReport;
use crate::ImportError;
use std::fmt;
use std::time::Duration;

/// Record counts for one batch, or several merged batches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Raw records seen
    pub attempted: usize,
    /// Rows committed (inserted, ignored as duplicates, or updated)
    pub succeeded: usize,
    /// Rejected records, rows without an identifier, and rows lost to a storage failure
    pub failed: usize,
    pub errors: Vec<String>,
}

impl ImportOutcome {
    pub fn merge(&mut self, other: ImportOutcome) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.errors.extend(other.errors);
    }
}

/// Why an entity run stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortKind {
    /// Never started: missing credentials or a halted run
    Precondition,
    /// Fetch failed fatally (non-retryable status, retries exhausted)
    Fetch,
    /// Target store failed
    Storage,
}

impl fmt::Display for AbortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortKind::Precondition => write!(f, "precondition"),
            AbortKind::Fetch => write!(f, "fetch"),
            AbortKind::Storage => write!(f, "storage"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abort {
    pub kind: AbortKind,
    pub message: String,
}

impl Abort {
    pub fn new(kind: AbortKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classify a pipeline error by where it came from
    pub fn from_error(error: &ImportError) -> Self {
        let kind = if error.is_storage() {
            AbortKind::Storage
        } else {
            AbortKind::Fetch
        };
        Self::new(kind, error.to_string())
    }
}

/// What happened to one entity during a run
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySummary {
    pub entity: String,
    pub outcome: ImportOutcome,
    pub writes: WriteReport,
    pub pages: u32,
    pub requests: u32,
    pub retries: u32,
    pub duration: Duration,
    pub abort: Option<Abort>,
}

impl EntitySummary {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            outcome: ImportOutcome::default(),
            writes: WriteReport::default(),
            pages: 0,
            requests: 0,
            retries: 0,
            duration: Duration::ZERO,
            abort: None,
        }
    }

    /// Entity that was never started
    pub fn skipped(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            abort: Some(Abort::new(AbortKind::Precondition, reason)),
            ..Self::new(entity)
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_some()
    }

    pub fn is_skipped(&self) -> bool {
        matches!(&self.abort, Some(a) if a.kind == AbortKind::Precondition)
    }

    /// Metric label: "ok", "skipped" or "aborted"
    pub fn result_label(&self) -> &'static str {
        match &self.abort {
            None => "ok",
            Some(a) if a.kind == AbortKind::Precondition => "skipped",
            Some(_) => "aborted",
        }
    }
}

impl fmt::Display for EntitySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} attempted, {} succeeded, {} failed ({} inserted, {} updated; {} pages, {} requests, {:.2}s)",
            self.entity,
            self.outcome.attempted,
            self.outcome.succeeded,
            self.outcome.failed,
            self.writes.inserted,
            self.writes.updated,
            self.pages,
            self.requests,
            self.duration.as_secs_f64()
        )?;
        if let Some(abort) = &self.abort {
            if abort.kind == AbortKind::Precondition {
                write!(f, " [skipped: {}]", abort.message)?;
            } else {
                write!(f, " [aborted ({}): {}]", abort.kind, abort.message)?;
            }
        }
        Ok(())
    }
}

/// Summaries of every selected entity, in run order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub entities: Vec<EntitySummary>,
    /// Set when a storage failure stopped the run early
    pub halted: Option<String>,
}

impl RunSummary {
    /// Every entity skipped for the same reason
    pub fn skipped<'n>(entities: impl IntoIterator<Item = &'n str>, reason: &str) -> Self {
        Self {
            entities: entities
                .into_iter()
                .map(|name| EntitySummary::skipped(name, reason))
                .collect(),
            halted: None,
        }
    }

    pub fn any_aborted(&self) -> bool {
        self.entities.iter().any(EntitySummary::is_aborted)
    }

    /// Outcome of all entities merged
    pub fn total(&self) -> ImportOutcome {
        let mut total = ImportOutcome::default();
        for summary in &self.entities {
            total.merge(summary.outcome.clone());
        }
        total
    }

    pub fn get(&self, entity: &str) -> Option<&EntitySummary> {
        self.entities.iter().find(|s| s.entity == entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_merge() {
        let mut total = ImportOutcome {
            attempted: 50,
            succeeded: 48,
            failed: 2,
            errors: vec!["a".to_string(), "b".to_string()],
        };
        total.merge(ImportOutcome {
            attempted: 30,
            succeeded: 30,
            failed: 0,
            errors: vec![],
        });

        assert_eq!(total.attempted, 80);
        assert_eq!(total.succeeded, 78);
        assert_eq!(total.failed, 2);
        assert_eq!(total.errors.len(), 2);
    }

    #[test]
    fn test_abort_classification() {
        let storage = Abort::from_error(&ImportError::Storage("disk full".to_string()));
        assert_eq!(storage.kind, AbortKind::Storage);

        let fetch = Abort::from_error(&ImportError::Api {
            status: 500,
            body: "boom".to_string(),
        });
        assert_eq!(fetch.kind, AbortKind::Fetch);
    }

    #[test]
    fn test_skipped_run() {
        let run = RunSummary::skipped(["issuetypes", "issues"], "missing credentials");
        assert_eq!(run.entities.len(), 2);
        assert!(run.any_aborted());
        assert!(run.entities.iter().all(EntitySummary::is_skipped));
        assert_eq!(run.get("issues").unwrap().result_label(), "skipped");
        assert!(run.entities[0].to_string().contains("skipped: missing credentials"));
    }

    #[test]
    fn test_summary_labels() {
        let ok = EntitySummary::new("issues");
        assert_eq!(ok.result_label(), "ok");
        assert!(!ok.is_aborted());

        let mut aborted = EntitySummary::new("issues");
        aborted.abort = Some(Abort::new(AbortKind::Fetch, "HTTP 500"));
        assert_eq!(aborted.result_label(), "aborted");
        assert!(aborted.to_string().contains("aborted (fetch): HTTP 500"));
    }
}
