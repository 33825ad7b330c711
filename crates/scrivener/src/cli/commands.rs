//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Scrivener - rate-limited, cached, multi-key AI request orchestration
#[derive(Parser, Debug)]
#[command(name = "scrivener")]
#[command(about = "Inspect Scrivener provider configuration and cache keys", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Read configuration from this file instead of the default locations
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build every provider with credentials and print its stats
    Providers {
        /// Output format
        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },

    /// Print the resolved configuration as TOML (credentials omitted)
    Config,

    /// Print the cache fingerprint of a document
    Fingerprint {
        /// Path to the document
        file: PathBuf,

        /// Prompt the document would be analyzed with
        #[arg(long)]
        prompt: String,

        /// Operation kind (e.g. "invoice", "ocr")
        #[arg(long)]
        kind: String,
    },
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}
