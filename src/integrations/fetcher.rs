//! Paginated fetch of Jira list endpoints
//!
//! `PagedFetcher` walks a list endpoint with `startAt`/`maxResults` and
//! yields pages strictly in offset order:
//!
//! - **200**: emit the page; a full page continues, a short one finishes
//! - **503**: back off and retry, aborting once the retry budget is spent
//! - **400/404**: finish quietly, keeping the pages already emitted
//! - **anything else**: abort the fetch for this entity

use super::jira::{ApiResponse, ApiTransport};
use super::retry::{with_retry_using, RetryConfig, RetryDecision, RetryableError, Sleeper};
use crate::{metrics, ImportError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::join_all;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info, warn};

/// Error bodies are cut to this many characters in messages
const MAX_ERROR_BODY: usize = 500;

/// Paging behavior of a fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    /// Records requested per page (`maxResults`)
    pub page_size: u32,

    /// Page requests allowed in flight at once
    pub max_concurrent: usize,

    pub retry: RetryConfig,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_concurrent: 1,
            retry: RetryConfig::default(),
        }
    }
}

/// What to fetch
#[derive(Debug, Clone, Copy)]
pub struct ListRequest<'a> {
    /// Entity name, for logs and metrics
    pub entity: &'a str,

    /// Endpoint path appended to the base URL
    pub path: &'a str,

    /// Field of the response object holding the records; `None` when the
    /// body itself is the array
    pub list_field: Option<&'a str>,

    /// `false` for endpoints that return everything in one response and
    /// ignore `startAt`
    pub paginated: bool,

    /// Only records updated at or after this instant are requested
    pub cursor: DateTime<Utc>,
}

/// One page of raw records
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub offset: u32,
    pub records: Vec<Value>,
    pub has_more: bool,
}

impl Page {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Requesting { offset: u32 },
    Finished(FinishReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Last page held fewer records than the page size
    ShortPage,
    /// Unpaginated endpoint answered with its full result
    SinglePage,
    /// Response had no list field or an empty list
    NoRecords,
    /// Server answered 400 or 404
    NotFound(u16),
    /// Fatal error, already returned to the caller
    Aborted,
}

/// Request counters for one fetch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchStats {
    /// HTTP requests issued, retries included
    pub requests: u32,
    pub retries: u32,
    pub pages: u32,
    pub records: usize,
}

#[derive(Debug)]
enum PageResponse {
    Records(Vec<Value>),
    NoRecords,
    NotFound(u16),
}

/// Offset/limit pagination state machine
pub struct PagedFetcher<'a, T: ?Sized, S: ?Sized> {
    transport: &'a T,
    sleeper: &'a S,
    request: ListRequest<'a>,
    settings: FetchSettings,
    state: FetchState,
    ready: VecDeque<Result<Page>>,
    requests: AtomicU32,
    retries: AtomicU32,
    pages: u32,
    records: usize,
}

impl<'a, T, S> PagedFetcher<'a, T, S>
where
    T: ApiTransport + ?Sized,
    S: Sleeper + ?Sized,
{
    pub fn new(
        transport: &'a T,
        sleeper: &'a S,
        request: ListRequest<'a>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            transport,
            sleeper,
            request,
            settings,
            state: FetchState::Requesting { offset: 0 },
            ready: VecDeque::new(),
            requests: AtomicU32::new(0),
            retries: AtomicU32::new(0),
            pages: 0,
            records: 0,
        }
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn stats(&self) -> FetchStats {
        FetchStats {
            requests: self.requests.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            pages: self.pages,
            records: self.records,
        }
    }

    /// Next page in offset order; `Ok(None)` once the data is exhausted
    ///
    /// After an `Err` the fetcher is finished and keeps returning `Ok(None)`.
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        loop {
            if let Some(ready) = self.ready.pop_front() {
                return ready.map(Some);
            }

            let offset = match self.state {
                FetchState::Requesting { offset } => offset,
                FetchState::Finished(_) => return Ok(None),
            };

            let responses = self.fetch_window(offset).await;
            self.absorb(responses);
        }
    }

    /// Request up to `max_concurrent` consecutive pages at once
    async fn fetch_window(&self, offset: u32) -> Vec<(u32, Result<PageResponse>)> {
        let window = if self.request.paginated {
            self.settings.max_concurrent.max(1) as u32
        } else {
            1
        };
        let offsets: Vec<u32> = (0..window)
            .map(|i| offset.saturating_add(i.saturating_mul(self.settings.page_size)))
            .collect();

        let responses = join_all(offsets.iter().map(|&o| self.request_page(o))).await;
        offsets.into_iter().zip(responses).collect()
    }

    /// Queue pages in order up to the first terminal response
    fn absorb(&mut self, responses: Vec<(u32, Result<PageResponse>)>) {
        let page_size = self.settings.page_size as usize;

        for (offset, response) in responses {
            match response {
                Ok(PageResponse::Records(records)) => {
                    let count = records.len();
                    if count > page_size {
                        warn!(
                            entity = self.request.entity,
                            count = count,
                            page_size = page_size,
                            "Server ignored pagination, treating page as complete result"
                        );
                    }
                    let has_more = self.request.paginated && count == page_size;

                    self.pages += 1;
                    self.records += count;
                    debug!(
                        entity = self.request.entity,
                        offset = offset,
                        count = count,
                        "Received page"
                    );
                    self.ready.push_back(Ok(Page {
                        offset,
                        records,
                        has_more,
                    }));

                    if has_more {
                        self.state = FetchState::Requesting {
                            offset: offset.saturating_add(self.settings.page_size),
                        };
                    } else if self.request.paginated {
                        self.finish(FinishReason::ShortPage);
                        return;
                    } else {
                        self.finish(FinishReason::SinglePage);
                        return;
                    }
                }
                Ok(PageResponse::NoRecords) => {
                    self.finish(FinishReason::NoRecords);
                    return;
                }
                Ok(PageResponse::NotFound(status)) => {
                    warn!(
                        entity = self.request.entity,
                        offset = offset,
                        status = status,
                        "Endpoint exhausted, treating as end of data"
                    );
                    self.finish(FinishReason::NotFound(status));
                    return;
                }
                Err(e) => {
                    self.state = FetchState::Finished(FinishReason::Aborted);
                    self.ready.push_back(Err(e));
                    return;
                }
            }
        }
    }

    fn finish(&mut self, reason: FinishReason) {
        info!(
            entity = self.request.entity,
            pages = self.pages,
            records = self.records,
            reason = ?reason,
            "Finished fetching"
        );
        self.state = FetchState::Finished(reason);
    }

    async fn request_page(&self, offset: u32) -> Result<PageResponse> {
        let operation = format!("fetch {} page at {}", self.request.entity, offset);
        with_retry_using(&self.settings.retry, self.sleeper, &operation, move |attempt| {
            self.try_request(offset, attempt)
        })
        .await
        .map_err(|e| escalate(e, &self.settings.retry))
    }

    async fn try_request(&self, offset: u32, attempt: u32) -> Result<PageResponse> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if attempt > 0 {
            self.retries.fetch_add(1, Ordering::Relaxed);
            metrics::record_retry(self.request.entity);
        }

        debug!(
            entity = self.request.entity,
            offset = offset,
            attempt = attempt + 1,
            "Fetching page"
        );

        let query = self.query(offset);
        let response = self.transport.get(self.request.path, &query).await?;
        metrics::record_response(self.request.entity, response.status);

        classify_list_response(response, self.request.list_field)
    }

    fn query(&self, offset: u32) -> Vec<(String, String)> {
        let mut query = Vec::with_capacity(3);
        if self.request.paginated {
            query.push(("startAt".to_string(), offset.to_string()));
            query.push(("maxResults".to_string(), self.settings.page_size.to_string()));
        }
        query.push((
            "updated".to_string(),
            self.request.cursor.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
        query
    }
}

/// Fetch `/rest/api/3/issue/{id}/{relation}`
///
/// Same retry rules as list pages; 400/404 yields `None`.
pub async fn fetch_related<T, S>(
    transport: &T,
    sleeper: &S,
    retry: &RetryConfig,
    issue_id: &str,
    relation: &str,
) -> Result<Option<Value>>
where
    T: ApiTransport + ?Sized,
    S: Sleeper + ?Sized,
{
    for (name, segment) in [("issue id", issue_id), ("relation", relation)] {
        if segment.is_empty()
            || segment
                .chars()
                .any(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace())
        {
            return Err(ImportError::Config(format!(
                "Invalid {} for related fetch: '{}'",
                name, segment
            )));
        }
    }

    let path = format!("/rest/api/3/issue/{}/{}", issue_id, relation);
    let path = path.as_str();
    let operation = format!("fetch {} of {}", relation, issue_id);

    with_retry_using(retry, sleeper, &operation, |_| async move {
        let response = transport.get(path, &[]).await?;
        match response.status {
            200 => Ok(Some(serde_json::from_str(&response.body)?)),
            400 | 404 => {
                warn!(
                    issue = issue_id,
                    relation = relation,
                    status = response.status,
                    "Related resource not found"
                );
                Ok(None)
            }
            _ => Err(status_error(response)),
        }
    })
    .await
    .map_err(|e| escalate(e, retry))
}

fn classify_list_response(response: ApiResponse, list_field: Option<&str>) -> Result<PageResponse> {
    match response.status {
        200 => {
            let body: Value = serde_json::from_str(&response.body)?;
            extract_records(body, list_field)
        }
        400 | 404 => Ok(PageResponse::NotFound(response.status)),
        _ => Err(status_error(response)),
    }
}

fn status_error(response: ApiResponse) -> ImportError {
    let body = snippet(&response.body);
    if response.status == 503 {
        ImportError::Unavailable(body)
    } else {
        ImportError::Api {
            status: response.status,
            body,
        }
    }
}

fn extract_records(body: Value, list_field: Option<&str>) -> Result<PageResponse> {
    let list = match (list_field, body) {
        (Some(field), Value::Object(mut map)) => map.remove(field),
        (Some(_), Value::Null) => None,
        (Some(field), other) => {
            return Err(ImportError::Parse(format!(
                "expected an object holding '{}', got {}",
                field,
                snippet(&other.to_string())
            )))
        }
        (None, body) => Some(body),
    };

    match list {
        None | Some(Value::Null) => Ok(PageResponse::NoRecords),
        Some(Value::Array(items)) if items.is_empty() => Ok(PageResponse::NoRecords),
        Some(Value::Array(items)) => Ok(PageResponse::Records(items)),
        Some(other) => Err(ImportError::Parse(format!(
            "record list is not an array: {}",
            snippet(&other.to_string())
        ))),
    }
}

/// Turn a still-retryable error into the fatal "budget spent" error
fn escalate(error: ImportError, retry: &RetryConfig) -> ImportError {
    match error.retry_decision() {
        RetryDecision::Retry => ImportError::RetriesExhausted {
            attempts: retry.max_retries + 1,
            last_error: error.to_string(),
        },
        RetryDecision::NoRetry => error,
    }
}

fn snippet(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{}...", cut)
    }
}
