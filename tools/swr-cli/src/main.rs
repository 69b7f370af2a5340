//! SWR CLI - Operator tooling for the stale-while-revalidate edge proxy.
//!
//! Commands:
//! - `swr explain` - Show how an origin `Cache-Control` maps to edge and client policies
//! - `swr key` - Derive the cache key for a request
//! - `swr config` - Generate and check proxy configuration

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{ConfigArgs, ExplainArgs, KeyArgs};

/// SWR CLI - Inspect cache policies, keys and proxy configuration
#[derive(Parser)]
#[command(name = "swr")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explain the policies derived from an origin Cache-Control header
    Explain(ExplainArgs),

    /// Derive the cache key for a URL and request body
    Key(KeyArgs),

    /// Manage proxy configuration
    Config(ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = output::Output::new(cli.verbose, cli.json);

    let result = match cli.command {
        Commands::Explain(args) => commands::explain::run(args, &output),
        Commands::Key(args) => commands::key::run(args, &output),
        Commands::Config(args) => commands::config::run(args, &output),
    };

    if let Err(e) = result {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
