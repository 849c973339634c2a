//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Worker backend selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendType {
    /// Fixed pool of long-lived worker threads
    Pool,
    /// One fresh worker thread per request
    Dedicated,
}

/// offload - compute factorials on isolated background workers
#[derive(Parser, Debug)]
#[command(name = "offload")]
#[command(version, about, long_about = None)]
#[command(allow_negative_numbers = true)]
pub struct Cli {
    /// Numbers to compute; reads one per line from stdin when omitted
    #[arg(value_name = "INPUT")]
    pub inputs: Vec<String>,

    // === Compute Options ===
    /// Number of worker threads (pool backend)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Worker backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendType>,

    /// CPU cores to pin worker threads to (e.g. "0-3,8")
    #[arg(long)]
    pub cpu_cores: Option<String>,

    // === Requester Options ===
    /// Largest accepted input
    #[arg(long)]
    pub max_input: Option<u32>,

    // === Configuration File ===
    /// TOML configuration file
    #[arg(short = 'c', long, env = "OFFLOAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Dry run - validate configuration without executing
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.threads == Some(0) {
            anyhow::bail!("threads must be at least 1");
        }

        if let Some(ref cores) = self.cpu_cores {
            if cores.trim().is_empty() {
                anyhow::bail!("cpu_cores cannot be empty");
            }
        }

        Ok(())
    }
}
