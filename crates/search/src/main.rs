//! ragdesk ask
//!
//! Asks one question against a store and prints the [`QueryResult`] as JSON.
//!
//! [`QueryResult`]: ragdesk_common::models::QueryResult

use anyhow::{bail, Context, Result};
use clap::Parser;
use ragdesk_common::client::{FileSearchApi, GeminiClient};
use ragdesk_common::models::StoreHandle;
use ragdesk_common::{config::AppConfig, metrics, telemetry, VERSION};
use ragdesk_search::{QueryOptions, QueryOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "ask", about = "Ask a question grounded in a file-search store", version)]
struct Cli {
    /// Question to answer
    #[arg(required = true)]
    question: Vec<String>,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store resource id (defaults to store.resource_id)
    #[arg(short, long)]
    store: Option<String>,

    /// Retry transient generation failures
    #[arg(long)]
    retry: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path.to_str().context("config path is not valid UTF-8")?),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    telemetry::init_tracing(&config.observability);
    metrics::register_metrics();
    info!("ragdesk ask v{}", VERSION);

    config.validate()?;

    let Some(resource_id) = cli.store.clone().or_else(|| config.store.resource_id.clone()) else {
        bail!("no store given; pass --store or set RAGDESK__STORE__RESOURCE_ID");
    };

    let api: Arc<dyn FileSearchApi> = Arc::new(GeminiClient::new(&config.api)?);
    let store = StoreHandle::new(resource_id, "");

    let mut options = QueryOptions::from_config(&config);
    options.retry_generation |= cli.retry;

    let retry = config
        .retry_policy()
        .on_retry(|event| eprintln!("{}", event));
    let orchestrator = QueryOrchestrator::new(api, options).with_retry_policy(retry);

    let question = cli.question.join(" ");
    let result = orchestrator.run_query(&question, &store).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        bail!(
            "query failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}
