//! Configuration validation

use super::*;
use crate::worker::affinity::parse_cpu_list;
use anyhow::{Context, Result};

/// Upper bound on pool size
const MAX_THREADS: usize = 1024;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_compute(&config.compute)?;
    validate_requester(&config.requester)?;
    validate_logging(&config.logging)?;

    Ok(())
}

/// Validate compute configuration
pub fn validate_compute(compute: &ComputeConfig) -> Result<()> {
    if compute.threads == 0 || compute.threads > MAX_THREADS {
        anyhow::bail!(
            "threads must be between 1 and {}, got {}",
            MAX_THREADS,
            compute.threads
        );
    }

    if let Some(ref cores) = compute.cpu_cores {
        parse_cpu_list(cores).context("Invalid cpu_cores")?;
    }

    Ok(())
}

/// Validate requester configuration
pub fn validate_requester(requester: &RequesterConfig) -> Result<()> {
    if requester.max_input > MAX_FACTORIAL_INPUT {
        anyhow::bail!(
            "max_input must be at most {} ({}! is the largest factorial that fits in 128 bits), got {}",
            MAX_FACTORIAL_INPUT,
            MAX_FACTORIAL_INPUT,
            requester.max_input
        );
    }

    Ok(())
}

/// Validate logging configuration
pub fn validate_logging(logging: &LoggingConfig) -> Result<()> {
    tracing_subscriber::EnvFilter::try_new(&logging.level)
        .with_context(|| format!("Invalid log level: {}", logging.level))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_threads() {
        let mut compute = ComputeConfig::default();

        compute.threads = 0;
        assert!(validate_compute(&compute).is_err());

        compute.threads = MAX_THREADS + 1;
        assert!(validate_compute(&compute).is_err());

        compute.threads = 4;
        assert!(validate_compute(&compute).is_ok());
    }

    #[test]
    fn test_validate_cpu_cores() {
        let mut compute = ComputeConfig::default();

        compute.cpu_cores = Some("0-3,8".to_string());
        assert!(validate_compute(&compute).is_ok());

        compute.cpu_cores = Some("3-1".to_string());
        assert!(validate_compute(&compute).is_err());

        compute.cpu_cores = Some("x".to_string());
        assert!(validate_compute(&compute).is_err());
    }

    #[test]
    fn test_validate_max_input() {
        let mut requester = RequesterConfig::default();
        assert!(validate_requester(&requester).is_ok());

        requester.max_input = 0;
        assert!(validate_requester(&requester).is_ok());

        requester.max_input = MAX_FACTORIAL_INPUT + 1;
        assert!(validate_requester(&requester).is_err());
    }

    #[test]
    fn test_validate_log_level() {
        let mut logging = LoggingConfig::default();
        assert!(validate_logging(&logging).is_ok());

        logging.level = "offload=debug,info".to_string();
        assert!(validate_logging(&logging).is_ok());

        logging.level = "offload=notalevel".to_string();
        assert!(validate_logging(&logging).is_err());
    }
}
