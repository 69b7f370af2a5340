//! Configuration management commands.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use edge_core::ProxyConfig;

use super::{ConfigArgs, ConfigCommand};
use crate::output::Output;

/// Run the config command.
pub fn run(args: ConfigArgs, output: &Output) -> Result<()> {
    match args.command {
        ConfigCommand::Init { path, force } => init_config(&path, force, output),
        ConfigCommand::Check { path } => check_config(&path, output),
    }
}

fn init_config(path: &Path, force: bool, output: &Output) -> Result<()> {
    if path.exists() {
        if !force {
            bail!(
                "Config file already exists: {}. Use --force to overwrite.",
                path.display()
            );
        }
        output.warn(&format!("Overwriting {}", path.display()));
    }

    write_default_config(path)?;
    output.success(&format!("Created {}", path.display()));
    Ok(())
}

/// Write the default proxy configuration as TOML.
pub fn write_default_config(path: &Path) -> Result<()> {
    let content = ProxyConfig::default().to_toml_string()?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

fn check_config(path: &Path, output: &Output) -> Result<()> {
    let config = ProxyConfig::load(path)
        .with_context(|| format!("invalid config {}", path.display()))?;

    if output.is_json() {
        output.json(&config);
        return Ok(());
    }

    output.success(&format!("{} is valid", path.display()));
    output.kv("origin_header", &config.origin_header);
    output.kv("cache_bust_param", &config.cache_bust_param);
    output.kv(
        "origin_cache_control",
        config.origin_cache_control.as_deref().unwrap_or("-"),
    );
    output.kv(
        "retry_stuck_revalidation",
        &config.retry_stuck_revalidation.to_string(),
    );
    output.kv("store", &config.store.name);
    output.kv("log level", config.logging.level.as_str());
    Ok(())
}
