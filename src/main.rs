//! jira-import - Incremental Jira REST importer
//!
//! Main entry point for the jira-import CLI.

mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Cli, Commands, JiraArgs};
use jira_import::config::{validate_config_result, Credentials, ImportConfig};
use jira_import::integrations::{fetch_related, JiraClient, TokioSleeper};
use jira_import::pipeline::{skip_all, ImportSettings, Importer, RunSummary};
use jira_import::registry::EndpointRegistry;
use jira_import::store::SqliteStore;
use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    if let Err(e) = jira_import::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();
    let print_metrics = cli.print_metrics;

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    if print_metrics {
        match jira_import::metrics::encode_metrics() {
            Ok(text) => print!("{}", text),
            Err(e) => eprintln!("Failed to encode metrics: {}", e),
        }
    }

    process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = load_config(&cli)?;
    let registry = EndpointRegistry::builtin().context("Failed to build endpoint registry")?;

    match cli.command {
        Commands::Import {
            endpoint,
            max_concurrent,
            fail_fast,
        } => {
            if let Some(n) = max_concurrent {
                config.max_concurrent = n;
            }
            validate_config_result(&config)?;
            let selected = registry.select(endpoint.as_deref())?;

            let run = match credentials(&cli.jira) {
                Ok(credentials) => {
                    let store = open_store(&config)?;
                    let client =
                        JiraClient::new(credentials).context("Failed to create HTTP client")?;
                    let mut settings = ImportSettings::from_config(&config);
                    settings.fail_fast = fail_fast;

                    Importer::new(&client, &store, &TokioSleeper, settings)
                        .import_all(&selected)
                        .await
                }
                Err(e) => skip_all(&selected, &e.to_string()),
            };

            print_run(&run);
            Ok(if run.any_aborted() { 1 } else { 0 })
        }

        Commands::Endpoints => {
            println!("{:<12} {:<24} {:<12} {:<8} CURSOR", "NAME", "PATH", "TABLE", "LIST");
            for endpoint in registry.iter() {
                println!(
                    "{:<12} {:<24} {:<12} {:<8} {}",
                    endpoint.name(),
                    endpoint.path(),
                    endpoint.table().name(),
                    endpoint.list_field().unwrap_or("-"),
                    endpoint.table().cursor_column().unwrap_or("-")
                );
            }
            Ok(0)
        }

        Commands::Status => {
            let store = open_store(&config)?;
            println!("Database: {}", config.database.display());
            println!("{:<12} {:<12} {:>8}  LATEST UPDATE", "ENTITY", "TABLE", "ROWS");
            for endpoint in registry.iter() {
                let stats = store
                    .table_stats(endpoint.table())
                    .with_context(|| format!("Failed to read table {}", endpoint.table().name()))?;
                println!(
                    "{:<12} {:<12} {:>8}  {}",
                    endpoint.name(),
                    stats.table,
                    stats.rows,
                    stats
                        .high_water_mark
                        .map(|ts| ts.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            Ok(0)
        }

        Commands::Related { issue_id, relation } => {
            let client = JiraClient::new(credentials(&cli.jira)?)
                .context("Failed to create HTTP client")?;
            let retry = config.retry.to_retry_config();

            match fetch_related(&client, &TokioSleeper, &retry, &issue_id, &relation).await? {
                Some(value) => {
                    println!("{}", serde_json::to_string_pretty(&value)?);
                    Ok(0)
                }
                None => {
                    eprintln!("No {} found for issue {}", relation, issue_id);
                    Ok(1)
                }
            }
        }
    }
}

fn load_config(cli: &Cli) -> Result<ImportConfig> {
    let mut config = match &cli.config {
        Some(path) => ImportConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ImportConfig::load_default().context("Failed to load default config")?,
    };

    if let Some(db) = &cli.db {
        config.database = db.clone();
    }
    Ok(config)
}

fn credentials(args: &JiraArgs) -> jira_import::Result<Credentials> {
    Credentials::from_parts(
        args.base_url.clone(),
        args.user.clone(),
        args.api_token.clone(),
    )
}

fn open_store(config: &ImportConfig) -> Result<SqliteStore> {
    SqliteStore::new(config.store_config())
        .with_context(|| format!("Failed to open database {}", config.database.display()))
}

fn print_run(run: &RunSummary) {
    for summary in &run.entities {
        println!("{}", summary);
    }
    if let Some(reason) = &run.halted {
        println!("Run halted: {}", reason);
    }

    let total = run.total();
    println!(
        "Total: {} attempted, {} succeeded, {} failed",
        total.attempted, total.succeeded, total.failed
    );
}
