//! CLI command definitions
//!
//! All CLI structs and subcommand enums are defined here.

use clap::{Args, Parser, Subcommand};
use jira_import::config::{BASE_URL_ENV, TOKEN_ENV, USER_ENV};
use std::path::PathBuf;

/// jira-import - Incremental Jira REST importer
#[derive(Parser, Debug)]
#[command(name = "jira-import")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (default: ~/.config/jira-import/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path (overrides the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Print Prometheus metrics to stdout when the command finishes
    #[arg(long, global = true)]
    pub print_metrics: bool,

    #[command(flatten)]
    pub jira: JiraArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Jira connection settings, also read from the environment
#[derive(Args, Debug, Default)]
pub struct JiraArgs {
    /// Jira base URL (e.g., https://example.atlassian.net)
    #[arg(long, env = BASE_URL_ENV, global = true)]
    pub base_url: Option<String>,

    /// Account email used for basic auth
    #[arg(long, env = USER_ENV, global = true)]
    pub user: Option<String>,

    /// API token used for basic auth
    #[arg(long, env = TOKEN_ENV, hide_env_values = true, global = true)]
    pub api_token: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import records updated since the last run
    Import {
        /// Import only this endpoint (default: all, in registration order)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Page requests allowed in flight at once (overrides the config file)
        #[arg(long)]
        max_concurrent: Option<usize>,

        /// Stop the whole run on the first storage failure
        #[arg(long)]
        fail_fast: bool,
    },

    /// List registered endpoints
    Endpoints,

    /// Show row count and latest update per entity table
    Status,

    /// Fetch and print a resource related to an issue
    Related {
        /// Issue id or key (e.g., 10042 or PROJ-12)
        issue_id: String,

        /// Related resource (e.g., comment, worklog, remotelink)
        relation: String,
    },
}
