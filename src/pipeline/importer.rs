//! Per-entity import driver and the multi-entity run loop

use super::outcome::{Abort, AbortKind, EntitySummary, ImportOutcome, RunSummary};
use super::partition::partition;
use super::writer::{BatchWriter, WriteReport};
use crate::config::ImportConfig;
use crate::integrations::{
    ApiTransport, FetchSettings, ListRequest, Page, PagedFetcher, RetryConfig, Sleeper,
};
use crate::mapping::RecordMapper;
use crate::metrics;
use crate::registry::EndpointSpec;
use crate::store::EntityStore;
use crate::ImportError;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Knobs for one import run
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSettings {
    pub page_size: u32,
    pub batch_size: usize,
    pub max_concurrent: usize,
    pub retry: RetryConfig,
    /// Stop the whole run on the first storage failure
    pub fail_fast: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            batch_size: 50,
            max_concurrent: 1,
            retry: RetryConfig::default(),
            fail_fast: false,
        }
    }
}

impl ImportSettings {
    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            page_size: config.page_size,
            batch_size: config.batch_size,
            max_concurrent: config.max_concurrent,
            retry: config.retry.to_retry_config(),
            fail_fast: false,
        }
    }

    fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            page_size: self.page_size,
            max_concurrent: self.max_concurrent,
            retry: self.retry.clone(),
        }
    }
}

/// Result of pushing one page through map, partition and write
struct PageResult {
    outcome: ImportOutcome,
    writes: WriteReport,
    storage_error: Option<ImportError>,
}

/// Drives fetch → map → partition → write for registered entities
pub struct Importer<'a, T: ?Sized, St: ?Sized, S: ?Sized> {
    transport: &'a T,
    store: &'a St,
    sleeper: &'a S,
    settings: ImportSettings,
}

impl<'a, T, St, S> Importer<'a, T, St, S>
where
    T: ApiTransport + ?Sized,
    St: EntityStore + ?Sized,
    S: Sleeper + ?Sized,
{
    pub fn new(transport: &'a T, store: &'a St, sleeper: &'a S, settings: ImportSettings) -> Self {
        Self {
            transport,
            store,
            sleeper,
            settings,
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Import every endpoint in order
    ///
    /// A failing entity is recorded and the run moves on, unless
    /// `fail_fast` is set and the failure came from the store.
    pub async fn import_all(&self, endpoints: &[&EndpointSpec]) -> RunSummary {
        let mut run = RunSummary::default();

        for (index, endpoint) in endpoints.iter().enumerate() {
            let summary = self.import_endpoint(endpoint).await;
            let storage_failed = matches!(&summary.abort, Some(a) if a.kind == AbortKind::Storage);
            run.entities.push(summary);

            if storage_failed && self.settings.fail_fast {
                let reason = format!("run halted after storage failure in {}", endpoint.name());
                error!(entity = endpoint.name(), "Storage failure, halting run");
                for remaining in &endpoints[index + 1..] {
                    let skipped = EntitySummary::skipped(remaining.name(), reason.clone());
                    metrics::record_entity_run(remaining.name(), skipped.result_label());
                    run.entities.push(skipped);
                }
                run.halted = Some(reason);
                break;
            }
        }

        let total = run.total();
        info!(
            entities = run.entities.len(),
            attempted = total.attempted,
            succeeded = total.succeeded,
            failed = total.failed,
            "Import run finished"
        );
        run
    }

    /// Import one entity; never fails, problems land in the summary
    pub async fn import_endpoint(&self, endpoint: &EndpointSpec) -> EntitySummary {
        let started = Instant::now();
        let mut summary = EntitySummary::new(endpoint.name());

        match self.cursor(endpoint) {
            Ok(cursor) => self.run_entity(endpoint, cursor, &mut summary).await,
            Err(e) => {
                error!(entity = endpoint.name(), "Cannot prepare target table: {}", e);
                summary.abort = Some(Abort::new(AbortKind::Storage, e.to_string()));
            }
        }

        summary.duration = started.elapsed();
        self.report(&summary);
        summary
    }

    /// Create the table if needed and read its high-water mark
    fn cursor(&self, endpoint: &EndpointSpec) -> crate::Result<DateTime<Utc>> {
        let table = endpoint.table();
        self.store.ensure_table(table)?;
        Ok(self
            .store
            .high_water_mark(table)?
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH))
    }

    async fn run_entity(
        &self,
        endpoint: &EndpointSpec,
        cursor: DateTime<Utc>,
        summary: &mut EntitySummary,
    ) {
        info!(
            entity = endpoint.name(),
            since = %cursor.to_rfc3339(),
            "Started fetching"
        );

        let request = ListRequest {
            entity: endpoint.name(),
            path: endpoint.path(),
            list_field: endpoint.list_field(),
            paginated: endpoint.is_paginated(),
            cursor,
        };
        let mut fetcher = PagedFetcher::new(
            self.transport,
            self.sleeper,
            request,
            self.settings.fetch_settings(),
        );
        let mapper = RecordMapper::new(endpoint.mappings());
        let writer = BatchWriter::new(self.settings.batch_size);

        loop {
            match fetcher.next_page().await {
                Ok(Some(page)) => {
                    let result = self.process_page(endpoint, &mapper, &writer, &page);
                    summary.outcome.merge(result.outcome);
                    summary.writes.merge(result.writes);
                    if let Some(e) = result.storage_error {
                        summary.abort = Some(Abort::new(AbortKind::Storage, e.to_string()));
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!(entity = endpoint.name(), "Fetch aborted: {}", e);
                    summary.abort = Some(Abort::from_error(&e));
                    break;
                }
            }
        }

        let stats = fetcher.stats();
        summary.pages = stats.pages;
        summary.requests = stats.requests;
        summary.retries = stats.retries;
    }

    fn process_page(
        &self,
        endpoint: &EndpointSpec,
        mapper: &RecordMapper<'_>,
        writer: &BatchWriter,
        page: &Page,
    ) -> PageResult {
        let table = endpoint.table();
        let mapped = mapper.extract_all(&page.records);
        let mut outcome = ImportOutcome {
            attempted: page.len(),
            succeeded: 0,
            failed: mapped.rejected,
            errors: mapped.errors,
        };
        let row_count = mapped.rows.len();

        let split = match partition(mapped.rows, table, self.store) {
            Ok(split) => split,
            Err(e) => {
                error!(entity = endpoint.name(), offset = page.offset, "Identifier lookup failed: {}", e);
                outcome.failed += row_count;
                outcome.errors.push(e.to_string());
                return PageResult {
                    outcome,
                    writes: WriteReport::default(),
                    storage_error: Some(e),
                };
            }
        };
        outcome.failed += split.failed;
        outcome.errors.extend(split.errors);

        let pending = split.to_insert.len() + split.to_update.len();
        let (writes, storage_error) =
            match writer.commit(self.store, table, &split.to_insert, &split.to_update) {
                Ok(report) => (report, None),
                Err(failure) => {
                    outcome.errors.push(failure.to_string());
                    (failure.report, Some(failure.error))
                }
            };
        outcome.succeeded += writes.committed();
        outcome.failed += pending - writes.committed();

        if outcome.failed > 0 {
            warn!(
                entity = endpoint.name(),
                offset = page.offset,
                failed = outcome.failed,
                "Some records were not imported"
            );
        }
        debug!(
            entity = endpoint.name(),
            offset = page.offset,
            attempted = outcome.attempted,
            succeeded = outcome.succeeded,
            "Processed page"
        );

        PageResult {
            outcome,
            writes,
            storage_error,
        }
    }

    fn report(&self, summary: &EntitySummary) {
        let entity = summary.entity.as_str();
        metrics::record_duration(entity, summary.duration.as_secs_f64());
        metrics::record_records(entity, "inserted", summary.writes.inserted);
        metrics::record_records(entity, "ignored", summary.writes.ignored);
        metrics::record_records(entity, "updated", summary.writes.updated);
        metrics::record_records(entity, "failed", summary.outcome.failed);
        metrics::record_entity_run(entity, summary.result_label());

        match &summary.abort {
            None => info!(
                entity = entity,
                attempted = summary.outcome.attempted,
                succeeded = summary.outcome.succeeded,
                failed = summary.outcome.failed,
                pages = summary.pages,
                requests = summary.requests,
                duration_secs = summary.duration.as_secs_f64(),
                "Finished processing"
            ),
            Some(abort) => error!(
                entity = entity,
                attempted = summary.outcome.attempted,
                succeeded = summary.outcome.succeeded,
                failed = summary.outcome.failed,
                pages = summary.pages,
                requests = summary.requests,
                kind = %abort.kind,
                "Import aborted: {}",
                abort.message
            ),
        }
    }
}

/// Report every endpoint as skipped without touching the network
pub fn skip_all(endpoints: &[&EndpointSpec], reason: &str) -> RunSummary {
    error!("{}; skipping {} endpoint(s)", reason, endpoints.len());
    let run = RunSummary::skipped(endpoints.iter().map(|e| e.name()), reason);
    for summary in &run.entities {
        metrics::record_entity_run(&summary.entity, summary.result_label());
    }
    run
}
