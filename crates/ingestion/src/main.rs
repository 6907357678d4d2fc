//! ragdesk ingest
//!
//! Command-line front end for store management and document upload.
//! Results are printed to stdout as JSON; logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ragdesk_common::client::{FileSearchApi, GeminiClient};
use ragdesk_common::models::StoreHandle;
use ragdesk_common::{config::AppConfig, metrics, telemetry, VERSION};
use ragdesk_ingestion::{DocumentIngestor, StoreManager};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "ingest", about = "Manage file-search stores and upload documents", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store resource id, e.g. fileSearchStores/abc (overrides config)
    #[arg(short, long, global = true)]
    store: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify that the API key works
    Check,

    /// List all stores
    Stores,

    /// Create a store
    CreateStore {
        /// Display name (defaults to store.default_display_name)
        display_name: Option<String>,
    },

    /// Delete a store and everything in it
    DeleteStore { resource_id: String },

    /// Upload files into the store
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Wait for remote indexing of each uploaded file
        #[arg(long)]
        wait: bool,
    },

    /// Delete one indexed file by its remote corpus id
    DeleteFile { remote_corpus_id: String },

    /// Wait for an import operation to finish
    Wait {
        operation_id: String,

        /// Give up after this many seconds (defaults to ingestion.index_timeout_secs)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => {
            let path = path.to_str().context("config path is not valid UTF-8")?;
            AppConfig::from_file(path)?
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Explicit store id if given, otherwise the default store by display name
async fn resolve_store(
    stores: &StoreManager,
    explicit: Option<&str>,
    config: &AppConfig,
) -> Result<StoreHandle> {
    if let Some(resource_id) = explicit.or(config.store.resource_id.as_deref()) {
        return stores
            .get_store(resource_id)
            .await
            .with_context(|| format!("store {} is not available", resource_id));
    }

    let display_name = &config.store.default_display_name;
    stores
        .get_or_create_store(display_name)
        .await
        .with_context(|| format!("could not find or create store {:?}", display_name))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref()).context("Failed to load configuration")?;

    telemetry::init_tracing(&config.observability);
    metrics::register_metrics();
    info!("ragdesk ingest v{}", VERSION);

    config.validate()?;
    let api: Arc<dyn FileSearchApi> = Arc::new(GeminiClient::new(&config.api)?);
    let stores = StoreManager::new(api.clone());

    match cli.command {
        Command::Check => {
            let connected = api.verify_connection().await;
            print_json(&serde_json::json!({ "connected": connected }))?;
            if !connected {
                bail!("connection check failed");
            }
        }
        Command::Stores => {
            print_json(&stores.list_stores().await)?;
        }
        Command::CreateStore { display_name } => {
            let display_name =
                display_name.unwrap_or_else(|| config.store.default_display_name.clone());
            match stores.create_store(&display_name).await {
                Some(store) => print_json(&store)?,
                None => bail!("store {:?} was not created", display_name),
            }
        }
        Command::DeleteStore { resource_id } => {
            let deleted = stores.delete_store(&resource_id).await;
            print_json(&serde_json::json!({ "resource_id": resource_id, "deleted": deleted }))?;
        }
        Command::Upload { paths, wait } => {
            let store = resolve_store(&stores, cli.store.as_deref(), &config).await?;
            let retry = config
                .retry_policy()
                .on_retry(|event| eprintln!("{}", event));
            let ingestor = DocumentIngestor::new(api.clone(), store, config.chunking(), retry)?;

            let outcome = ingestor.upload_batch(&paths).await;

            if wait {
                for file in &outcome.succeeded {
                    if let Some(operation_id) = &file.operation_id {
                        let indexed = ingestor
                            .wait_for_remote_indexing(
                                operation_id,
                                config.index_timeout(),
                                config.index_poll_interval(),
                            )
                            .await;
                        info!(file = %file.local_name, indexed, "Indexing wait finished");
                    }
                }
            }

            print_json(&outcome)?;
            if !outcome.is_complete_success() {
                bail!(
                    "{} of {} files failed to upload",
                    outcome.failure_count(),
                    outcome.total
                );
            }
        }
        Command::DeleteFile { remote_corpus_id } => {
            let deleted = stores.delete_indexed_file(&remote_corpus_id).await;
            print_json(&serde_json::json!({
                "remote_corpus_id": remote_corpus_id,
                "deleted": deleted,
            }))?;
        }
        Command::Wait {
            operation_id,
            timeout_secs,
        } => {
            // Import operations are named `{store}/operations/{id}`
            let store = match operation_id.split_once("/operations/") {
                Some((store_id, _)) => StoreHandle::new(store_id, ""),
                None => resolve_store(&stores, cli.store.as_deref(), &config).await?,
            };
            let ingestor =
                DocumentIngestor::new(api.clone(), store, config.chunking(), config.retry_policy())?;
            let timeout = timeout_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.index_timeout());

            let indexed = ingestor
                .wait_for_remote_indexing(&operation_id, timeout, config.index_poll_interval())
                .await;
            print_json(&serde_json::json!({ "operation_id": operation_id, "indexed": indexed }))?;
        }
    }

    Ok(())
}
