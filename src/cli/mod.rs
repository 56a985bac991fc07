use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "piiguard")]
#[command(about = "PII gateway - inspects user submissions and enforces warn/block rules")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "piiguard.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway in front of the configured upstream
    Serve,
    /// Classify a piece of text and show what the rules would see
    Check {
        /// Text to classify
        text: String,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Write a starter configuration file
    Init,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the loaded rules
    Show,
    /// Load and validate the configuration without starting anything
    Validate,
}
