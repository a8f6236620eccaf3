//! Jira credentials
//!
//! Read once at startup. All three values must be present before any
//! network call is made.

use crate::{ImportError, Result};

pub const BASE_URL_ENV: &str = "JIRA_BASE_URL";
pub const USER_ENV: &str = "JIRA_USER";
pub const TOKEN_ENV: &str = "JIRA_API_TOKEN";

/// Base URL plus basic-auth credentials for the Jira REST API
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
}

impl Credentials {
    /// Build from optional parts, naming every missing variable in the error
    pub fn from_parts(
        base_url: Option<String>,
        email: Option<String>,
        api_token: Option<String>,
    ) -> Result<Self> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        let missing: Vec<&str> = [
            (BASE_URL_ENV, present(&base_url)),
            (USER_ENV, present(&email)),
            (TOKEN_ENV, present(&api_token)),
        ]
        .iter()
        .filter(|(_, ok)| !ok)
        .map(|(name, _)| *name)
        .collect();

        match (base_url, email, api_token) {
            (Some(base_url), Some(email), Some(api_token)) if missing.is_empty() => Ok(Self {
                base_url: base_url.trim().trim_end_matches('/').to_string(),
                email: email.trim().to_string(),
                api_token,
            }),
            _ => Err(ImportError::Config(format!(
                "Missing required Jira API credentials: {}",
                missing.join(", ")
            ))),
        }
    }

    /// Read from JIRA_BASE_URL, JIRA_USER and JIRA_API_TOKEN
    pub fn from_env() -> Result<Self> {
        Self::from_parts(
            std::env::var(BASE_URL_ENV).ok(),
            std::env::var(USER_ENV).ok(),
            std::env::var(TOKEN_ENV).ok(),
        )
    }
}

// Keep the token out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("api_token", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_credentials() {
        let creds = Credentials::from_parts(
            Some("https://example.atlassian.net/".to_string()),
            Some("me@example.com".to_string()),
            Some("secret".to_string()),
        )
        .unwrap();
        assert_eq!(creds.base_url, "https://example.atlassian.net");
        assert!(!format!("{:?}", creds).contains("secret"));
    }

    #[test]
    fn test_missing_parts_are_named() {
        let err = Credentials::from_parts(
            Some("https://example.atlassian.net".to_string()),
            None,
            Some("  ".to_string()),
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(USER_ENV));
        assert!(msg.contains(TOKEN_ENV));
        assert!(!msg.contains(BASE_URL_ENV));
    }
}
