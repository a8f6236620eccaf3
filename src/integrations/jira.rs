//! JIRA REST client
//!
//! Thin transport over the Jira Cloud REST API. Status handling (retry,
//! end-of-data, abort) lives in the fetcher; this layer only sends an
//! authenticated GET and hands back the status and body.

use crate::config::Credentials;
use crate::Result;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Request};
use std::time::Duration;
use tracing::debug;

/// Per-request timeout for list and related-resource fetches
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for establishing the TCP/TLS connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw HTTP response: status code and body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// GET access to the remote API
///
/// Implementations return `Ok` for every HTTP status; `Err` means the
/// request never produced a response (connect, timeout, TLS, ...).
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse>;
}

/// JIRA API client authenticated with basic auth (email + API token)
pub struct JiraClient {
    client: Client,
    credentials: Credentials,
}

impl JiraClient {
    /// Create a new client
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?; // reqwest::Error converts to ImportError::Http via #[from]

        Ok(Self {
            client,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.credentials.base_url
    }

    /// Build an authenticated GET for `{base}{path}`
    pub fn build_request(&self, path: &str, query: &[(String, String)]) -> Result<Request> {
        let url = format!("{}{}", self.credentials.base_url, path);

        let request = self
            .client
            .get(&url)
            .query(query)
            .basic_auth(&self.credentials.email, Some(&self.credentials.api_token))
            .header(ACCEPT, "application/json")
            .build()?;

        Ok(request)
    }
}

#[async_trait]
impl ApiTransport for JiraClient {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse> {
        let request = self.build_request(path, query)?;

        debug!(url = %request.url(), "Fetching from Jira API");

        let response = self.client.execute(request).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::ImportError;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// One recorded GET: path and query pairs
    pub type Call = (String, Vec<(String, String)>);

    /// Answers requests from a fixed script, in order
    #[derive(Default)]
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<Result<ApiResponse>>>,
        pub calls: Mutex<Vec<Call>>,
    }

    impl ScriptedTransport {
        pub fn new(script: Vec<Result<ApiResponse>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        /// `startAt` of every request, in order
        pub fn offsets(&self) -> Vec<u32> {
            self.calls()
                .iter()
                .filter_map(|(_, q)| q.iter().find(|(k, _)| k == "startAt"))
                .filter_map(|(_, v)| v.parse().ok())
                .collect()
        }
    }

    #[async_trait]
    impl ApiTransport for ScriptedTransport {
        async fn get(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((path.to_string(), query.to_vec()));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ImportError::Other("script exhausted".to_string())))
        }
    }

    /// Serves a fixed dataset, honoring `startAt` and `maxResults`
    pub struct DatasetTransport {
        records: Vec<Value>,
        pub calls: Mutex<Vec<Call>>,
    }

    impl DatasetTransport {
        pub fn new(records: Vec<Value>) -> Self {
            Self {
                records,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn request_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ApiTransport for DatasetTransport {
        async fn get(&self, path: &str, query: &[(String, String)]) -> Result<ApiResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((path.to_string(), query.to_vec()));
            let param = |name: &str| -> usize {
                query
                    .iter()
                    .find(|(k, _)| k == name)
                    .and_then(|(_, v)| v.parse().ok())
                    .unwrap_or(0)
            };
            let start = param("startAt").min(self.records.len());
            let end = (start + param("maxResults")).min(self.records.len());
            let body = json!({ "issues": self.records[start..end] });
            Ok(ApiResponse::new(200, body.to_string()))
        }
    }

    /// `{"issues": [...]}` body with `count` records numbered from `first`
    pub fn issues_body(first: usize, count: usize) -> String {
        let issues: Vec<Value> = (first..first + count)
            .map(|i| json!({"id": i.to_string(), "name": format!("record {}", i)}))
            .collect();
        json!({ "issues": issues }).to_string()
    }

    pub fn ok(body: impl Into<String>) -> Result<ApiResponse> {
        Ok(ApiResponse::new(200, body))
    }

    pub fn status(code: u16) -> Result<ApiResponse> {
        Ok(ApiResponse::new(code, format!("status {}", code)))
    }
}
