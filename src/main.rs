//! # Headline Digest
//!
//! A business-news headline aggregator that fetches a fixed table of news
//! section pages and feeds, extracts headline candidates with per-site
//! heuristics, normalizes and deduplicates them, and delivers the result as
//! chat-sized text blocks.
//!
//! ## Features
//!
//! - Adaptive fetch chain: plain HTTP, hardened HTTP, and (with the `headless`
//!   feature) a headless browser for pages behind anti-bot challenges
//! - Ordered extraction strategies per site, with a page-title fallback
//! - RSS 2.0 and Atom feed sources
//! - Concurrent per-source pipelines that tolerate individual failures
//! - JSON snapshot cache with atomic writes and a background refresh cycle
//!
//! ## Usage
//!
//! ```sh
//! headline_digest fetch
//! headline_digest --config digest.yaml watch
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: Each source's endpoint goes through the fetch chain
//! 2. **Extraction**: Feed parser or HTML strategies produce candidates
//! 3. **Normalization**: Clean, resolve, filter and dedup per source
//! 4. **Aggregation**: Merge in source-table order, dedup across sources
//! 5. **Output**: Save the snapshot and/or print chunked text blocks

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregate;
mod cache;
mod cli;
mod config;
mod error;
mod extract;
mod fetch;
mod models;
mod normalize;
mod outputs;
mod service;
mod utils;

use cli::{Cli, Command};
use config::Settings;
use error::CacheError;
use models::NewsItem;
use outputs::chunks;
use service::{NewsService, RefreshOutcome};
use utils::truncate_for_log;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("headline_digest starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.cache_path, ?args.command, "Parsed CLI arguments");

    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(path) = &args.cache_path {
        settings.cache.path = path.clone();
    }
    settings.validate()?;

    let service = Arc::new(NewsService::from_settings(settings).await?);
    let limit = service.settings().output.message_limit;

    match args.command {
        Command::Sources => {
            for spec in &service.settings().sources {
                println!("{:<24} {:<16} {}", spec.name, spec.kind, spec.endpoint);
            }
        }
        Command::Fetch { limit: override_limit } => {
            let result = service.fetch_live().await;
            report_errors(&result.per_source_errors);
            print_blocks(&result.items, override_limit.unwrap_or(limit));
        }
        Command::Refresh => {
            let outcome = service.force_refresh().await?;
            let result = outcome.result();
            report_errors(&result.per_source_errors);
            match outcome {
                RefreshOutcome::Saved(ref r) => {
                    println!("Saved {} headlines to {}", r.items.len(), service.settings().cache.path)
                }
                RefreshOutcome::Kept(_) => {
                    println!("No headlines fetched; previous snapshot kept")
                }
            }
        }
        Command::Show { limit: override_limit } => match service.get_latest_news().await {
            Ok(snapshot) => {
                if let Some(ts) = snapshot.timestamp {
                    info!(timestamp = %ts.to_rfc3339(), "Serving stored snapshot");
                }
                print_blocks(&snapshot.items, override_limit.unwrap_or(limit));
            }
            Err(CacheError::Unavailable) => {
                println!("News is not ready yet. Run `headline_digest refresh` first.");
            }
            Err(e) => return Err(e.into()),
        },
        Command::Watch => {
            let handle = service.clone().spawn_refresher();
            info!(
                interval_secs = service.settings().cache.refresh_interval_secs,
                "Background refresh running; Ctrl-C to stop"
            );
            tokio::signal::ctrl_c().await?;
            handle.abort();
            info!("Stopping background refresh");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

fn report_errors(errors: &std::collections::BTreeMap<String, String>) {
    for (source, error) in errors {
        warn!(%source, error = %truncate_for_log(error, 200), "Source failed");
    }
}

fn print_blocks(items: &[NewsItem], limit: usize) {
    for (i, block) in chunks::format(items, limit).enumerate() {
        if i > 0 {
            println!();
        }
        println!("{block}");
    }
}
