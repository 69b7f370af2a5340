//! CLI command implementations.

pub mod config;
pub mod explain;
pub mod key;

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Arguments for the explain command.
#[derive(Args)]
pub struct ExplainArgs {
    /// Origin Cache-Control header value.
    pub cache_control: String,

    /// Evaluation time in epoch milliseconds (default: now).
    #[arg(long)]
    pub now: Option<u64>,
}

/// Arguments for the key command.
#[derive(Args)]
pub struct KeyArgs {
    /// Upstream URL the request is forwarded to.
    pub url: String,

    /// Request body as text.
    #[arg(short, long, conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Read the request body from a file.
    #[arg(long)]
    pub body_file: Option<PathBuf>,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Write a default config file.
    Init {
        /// Output path.
        #[arg(default_value = "swr-proxy.toml")]
        path: PathBuf,

        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Load and validate a config file.
    Check {
        /// Config file path (.toml or .json).
        path: PathBuf,
    },
}
