//! Jira API access
//!
//! - **jira**: authenticated HTTP transport (`JiraClient`) behind the `ApiTransport` trait
//! - **fetcher**: offset/limit pagination with retry on 503 and end-of-data on 400/404
//! - **retry**: exponential backoff with jitter, shared by page and related-resource fetches

pub mod fetcher;
pub mod jira;
pub mod retry;

pub use fetcher::{
    fetch_related, FetchSettings, FetchState, FetchStats, FinishReason, ListRequest, Page,
    PagedFetcher,
};
pub use jira::{ApiResponse, ApiTransport, JiraClient};
pub use retry::{
    with_retry_using, RetryConfig, RetryDecision, RetryableError, Sleeper, TokioSleeper,
};
