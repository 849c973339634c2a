//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod toml;
pub mod validator;

use crate::compute::MAX_FACTORIAL_INPUT;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub compute: ComputeConfig,
    #[serde(default)]
    pub requester: RequesterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How worker contexts are provided to requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Fixed set of long-lived worker threads
    #[default]
    Pool,
    /// One fresh worker thread per request, reaped once finished
    Dedicated,
}

/// Compute worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// Worker backend
    #[serde(default)]
    pub backend: Backend,
    /// Number of worker threads (pool backend only)
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// CPU cores to pin worker threads to (e.g. "0-3,8")
    #[serde(default)]
    pub cpu_cores: Option<String>,
}

fn default_threads() -> usize {
    num_cpus::get().max(1)
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            threads: default_threads(),
            cpu_cores: None,
        }
    }
}

/// Requester configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequesterConfig {
    /// Largest accepted input; anything above is rejected as invalid
    #[serde(default = "default_max_input")]
    pub max_input: u32,
}

fn default_max_input() -> u32 {
    MAX_FACTORIAL_INPUT
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            max_input: default_max_input(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Display trait implementations

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Compute: {}", self.compute)?;
        writeln!(f, "  Requester: max_input={}", self.requester.max_input)?;
        writeln!(f, "  Logging: level={}", self.logging.level)?;
        Ok(())
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Pool => write!(f, "pool"),
            Backend::Dedicated => write!(f, "dedicated"),
        }
    }
}

impl fmt::Display for ComputeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.backend {
            Backend::Pool => write!(f, "backend=pool, threads={}", self.threads)?,
            Backend::Dedicated => write!(f, "backend=dedicated")?,
        }
        if let Some(ref cores) = self.cpu_cores {
            write!(f, ", cpu_cores={}", cores)?;
        }
        Ok(())
    }
}
