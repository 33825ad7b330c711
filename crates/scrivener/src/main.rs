//! Scrivener CLI binary.
//!
//! This binary provides command-line access to Scrivener's configuration:
//! - Build configured providers and print their stats
//! - Print the resolved configuration
//! - Compute cache fingerprints of documents

use clap::Parser;
use scrivener::ObservabilityConfig;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, load_config, show_config, show_fingerprint, show_providers};

    // Credentials are usually supplied through keys_env variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    scrivener::init_observability_with_config(ObservabilityConfig::for_cli(
        cli.verbose,
        cli.json_logs,
    ))?;

    match cli.command {
        Commands::Providers { format } => {
            let config = load_config(cli.config.as_deref())?;
            show_providers(&config, format)?;
        }

        Commands::Config => {
            let config = load_config(cli.config.as_deref())?;
            show_config(&config)?;
        }

        Commands::Fingerprint { file, prompt, kind } => {
            show_fingerprint(&file, &prompt, &kind)?;
        }
    }

    Ok(())
}
