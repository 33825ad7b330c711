//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the scrivener binary.

mod commands;
mod inspect;

pub use commands::{Cli, Commands, OutputFormat};
pub use inspect::{load_config, show_config, show_fingerprint, show_providers};
