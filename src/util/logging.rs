//! Logging setup
//!
//! Diagnostics go through `tracing` to stderr. `RUST_LOG` takes precedence
//! over the configured level. Results and user notifications never go
//! through here; they use the surfaces.

use crate::config::LoggingConfig;
use crate::Result;
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` if set and valid, else the configured level
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level: {}", config.level))
}

/// Install the global subscriber
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(build_filter(config)?)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_rejects_bad_level() {
        // Only meaningful when RUST_LOG is not overriding the level
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }

        let bad = LoggingConfig {
            level: "offload=loud".to_string(),
        };
        assert!(build_filter(&bad).is_err());
        assert!(build_filter(&LoggingConfig::default()).is_ok());
    }
}
