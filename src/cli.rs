//! Command-line interface definitions for Headline Digest.
//!
//! This module defines the CLI arguments and subcommands using the `clap`
//! crate. Global options can also be provided via environment variables.

use clap::{Parser, Subcommand};

/// Command-line arguments for the Headline Digest application.
///
/// # Examples
///
/// ```sh
/// # Live aggregation, printed as chat-sized blocks
/// headline_digest fetch
///
/// # Refresh the snapshot every hour until interrupted
/// headline_digest --config digest.yaml watch
///
/// # Print the stored snapshot in 2000-character blocks
/// headline_digest --cache-path /var/lib/digest/news.json show --limit 2000
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long, env = "HEADLINE_DIGEST_CONFIG", global = true)]
    pub config: Option<String>,

    /// Snapshot file path (overrides `cache.path` from the settings)
    #[arg(long, env = "HEADLINE_DIGEST_CACHE", global = true)]
    pub cache_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Aggregate all sources now and print the result without saving it
    Fetch {
        /// Characters per printed block (defaults to `output.message_limit`)
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Aggregate all sources now and replace the stored snapshot
    Refresh,
    /// Print the stored snapshot
    Show {
        /// Characters per printed block (defaults to `output.message_limit`)
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Refresh the snapshot on the configured interval until interrupted
    Watch,
    /// List the configured sources
    Sources,
}
