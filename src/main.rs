//! paperdigest - Scrape, summarize and catalogue academic articles
//!
//! Stage 1 searches Scopus and scrapes full texts through the institutional
//! library proxy, stage 2 summarizes them with Gemini, stage 3 uploads the
//! summaries to a Notion database.
//!
//! ## Usage
//!
//! ```bash
//! paperdigest run                 # all stages
//! paperdigest search              # write the work list only
//! paperdigest scrape              # scrape the saved work list
//! paperdigest summarize
//! paperdigest upload
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paperdigest::{
    config::{resolve_config_path, PipelineConfig},
    delay::BetaDelay,
    gemini::{GeminiClient, GeminiConfig},
    models::WorkItem,
    notion::{self, NotionClient},
    retry::RetryOrchestrator,
    scopus,
    session::{Credentials, LibrarySessionManager, LoginSettings},
    storage::ArtifactStore,
    summarize,
    throttle::{RateLimitedCaller, ThrottleQueue},
    worker::ArticleWorker,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Work list written by `search` and read by `scrape`
const MANIFEST_FILE: &str = "search_results.csv";

/// Used when a database has to be created and none is configured
const DEFAULT_DATABASE_TITLE: &str = "Paper Summaries";

// ============================================================================
// CLI Definition
// ============================================================================

/// Scrape, summarize and catalogue academic articles
#[derive(Parser)]
#[command(name = "paperdigest")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Config file (default: ./config.yaml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run search, scrape, summarize and upload in sequence
    Run,
    /// Query Scopus and save the work list
    Search,
    /// Scrape every article in the saved work list
    Scrape,
    /// Summarize scraped articles with Gemini
    Summarize,
    /// Upload summaries to Notion
    Upload,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    let config_path = resolve_config_path(cli.config.as_deref())?;
    let config = PipelineConfig::load(&config_path)
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

    match cli.command {
        Commands::Run => {
            let items = run_search(&config).await?;
            run_scrape(&config, &items).await?;
            run_summarize(&config).await?;
            run_upload(&config).await
        }
        Commands::Search => run_search(&config).await.map(|_| ()),
        Commands::Scrape => {
            let manifest = config.scrape.output_folder.join(MANIFEST_FILE);
            let items = load_csv(&manifest)
                .with_context(|| format!("Cannot read work list {} (run `search` first)", manifest.display()))?;
            run_scrape(&config, &items).await
        }
        Commands::Summarize => run_summarize(&config).await,
        Commands::Upload => run_upload(&config).await,
    }
}

// ============================================================================
// Stages
// ============================================================================

async fn run_search(config: &PipelineConfig) -> Result<Vec<WorkItem>> {
    println!("\n--- Stage 1a: Scopus Search ---");

    let items = scopus::search(&config.elsevier)
        .await
        .context("Scopus search failed")?;
    if items.is_empty() {
        anyhow::bail!("Scopus returned no articles for: {}", config.elsevier.query);
    }
    println!("Found {} articles with ScienceDirect full text.", items.len());

    std::fs::create_dir_all(&config.scrape.output_folder)
        .context("Failed to create scrape output directory")?;
    save_csv(&config.scrape.output_folder.join(MANIFEST_FILE), &items)?;
    Ok(items)
}

async fn run_scrape(config: &PipelineConfig, items: &[WorkItem]) -> Result<()> {
    println!("\n--- Stage 1b: Library Scrape ---");
    if items.is_empty() {
        anyhow::bail!("Work list is empty, nothing to scrape");
    }

    let store = ArtifactStore::new(&config.scrape.output_folder)
        .context("Failed to open scrape output directory")?;
    let leftovers = store.clean_staging()?;
    if leftovers > 0 {
        info!(count = leftovers, "Removed staging files from an interrupted run");
    }

    let credentials = Credentials {
        username: config.library.username.clone(),
        password: config.library.password.clone(),
    };
    let provider = LibrarySessionManager::new(
        credentials,
        LoginSettings::from_config(&config.library, config.scrape.wait()),
    );
    let delay = BetaDelay::new(config.scrape.delay_min_secs, config.scrape.delay_max_secs);
    let worker = ArticleWorker::new(store.clone(), Box::new(delay), config.scrape.wait())?
        .with_min_bytes(config.scrape.min_document_bytes);

    let report = RetryOrchestrator::new(provider, worker, store)
        .with_max_retries(config.scrape.max_retries)
        .run(items)
        .await;

    println!(
        "Scraped {} / {} articles ({} attempts, {} session recreations).",
        report.committed(),
        items.len(),
        report.total_attempts(),
        report.session_recreations
    );
    let failed = report.failed_ids();
    if !failed.is_empty() {
        println!("Skipped after {} attempts: {}", config.scrape.max_retries, failed.join(", "));
    }
    Ok(())
}

async fn run_summarize(config: &PipelineConfig) -> Result<()> {
    println!("\n--- Stage 2: Gemini Summaries ---");

    let source = ArtifactStore::new(&config.scrape.output_folder)
        .context("Failed to open scrape output directory")?;
    let dest = ArtifactStore::new(&config.gemini.output_folder)
        .context("Failed to create summary output directory")?;

    let client = GeminiClient::new(GeminiConfig::from(&config.gemini))?;
    let mut caller = RateLimitedCaller::new(
        ThrottleQueue::per_minute(config.gemini.requests_per_minute),
        Duration::from_millis(config.gemini.pacing_ms),
    );

    let report = summarize::summarize_documents(&client, &mut caller, &source, &dest)
        .await
        .context("Summarization stage failed")?;

    println!(
        "Summarized {} articles, {} failed.",
        report.written.len(),
        report.failed.len()
    );
    for (id, reason) in &report.failed {
        println!("  {}: {}", id, reason);
    }
    println!(
        "Token usage: {} prompt + {} completion = {} total",
        report.usage.prompt_tokens, report.usage.completion_tokens, report.usage.total_tokens
    );
    Ok(())
}

async fn run_upload(config: &PipelineConfig) -> Result<()> {
    println!("\n--- Stage 3: Notion Upload ---");

    let store = ArtifactStore::new(&config.gemini.output_folder)
        .context("Failed to open summary directory")?;
    let client = NotionClient::new(config.notion.api_token.clone())?;

    let database_id = match &config.notion.database_id {
        Some(id) if !id.trim().is_empty() => id.clone(),
        _ => {
            let parent = config
                .notion
                .parent_page_id
                .as_deref()
                .context("notion.database_id or notion.parent_page_id is required")?;
            let title = config
                .notion
                .new_database_title
                .as_deref()
                .unwrap_or(DEFAULT_DATABASE_TITLE);
            let id = client
                .create_database(parent, title)
                .await
                .context("Failed to create Notion database")?;
            println!("Created Notion database {} ({})", title, id);
            id
        }
    };

    let report = notion::upload_summaries(&client, &database_id, &store)
        .await
        .context("Upload stage failed")?;

    println!(
        "Uploaded {} pages, {} failed.",
        report.created.len(),
        report.failed.len()
    );
    for (id, reason) in &report.failed {
        println!("  {}: {}", id, reason);
    }
    Ok(())
}

// ============================================================================
// CSV Helpers
// ============================================================================

fn save_csv<T: Serialize>(path: &Path, data: &[T]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context("Failed to create CSV writer")?;

    for item in data {
        wtr.serialize(item).context("Failed to write CSV record")?;
    }

    wtr.flush().context("Failed to flush CSV")?;
    println!("Saved: {:?}", path);
    Ok(())
}

fn load_csv(path: &Path) -> Result<Vec<WorkItem>> {
    let mut rdr = csv::Reader::from_path(path).context("Failed to open CSV")?;
    rdr.deserialize()
        .map(|row| row.context("Failed to read CSV record"))
        .collect()
}
