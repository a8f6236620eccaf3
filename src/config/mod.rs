//! Configuration system
//!
//! - **import_config**: the optional YAML file with paging, batching and retry settings
//! - **credentials**: Jira base URL and basic-auth credentials from the environment
//! - **validation**: checks that report every configuration problem at once

mod credentials;
mod import_config;
pub mod validation;

pub use credentials::{Credentials, BASE_URL_ENV, TOKEN_ENV, USER_ENV};
pub use import_config::{ImportConfig, RetrySettings};
pub use validation::{validate_config, validate_config_result, ValidationError};
