//! TOML configuration file parsing

use super::*;
use crate::config::cli::{BackendType, Cli};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Config {
    if let Some(threads) = cli.threads {
        config.compute.threads = threads;
    }
    if let Some(backend) = cli.backend {
        config.compute.backend = match backend {
            BackendType::Pool => Backend::Pool,
            BackendType::Dedicated => Backend::Dedicated,
        };
    }
    if let Some(ref cores) = cli.cpu_cores {
        config.compute.cpu_cores = Some(cores.clone());
    }

    if let Some(max_input) = cli.max_input {
        config.requester.max_input = max_input;
    }

    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    config
}

/// Build the effective configuration: file (if any), then CLI overrides
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };

    Ok(merge_cli_with_config(cli, base))
}

/// True when `--threads` was given but the chosen backend has no fixed pool
pub fn threads_ignored(cli: &Cli, config: &Config) -> bool {
    cli.threads.is_some() && config.compute.backend == Backend::Dedicated
}
