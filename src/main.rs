//! offload CLI entry point

use anyhow::{Context, Result};
use offload::config::{cli::Cli, toml::{load_config, threads_ignored}, validator, Config};
use offload::requester::{Pending, RequestError, Requester, Surfaces};
use offload::surface::console::{ConsoleDisplay, ConsoleNotifier, StdinInput};
use offload::util::logging::init_logging;
use offload::{RecursiveFactorial, WorkerPool};
use std::sync::Arc;
use tokio::task::JoinHandle;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;

    let config = load_config(&cli)?;
    init_logging(&config.logging)?;
    validator::validate_config(&config).context("Configuration validation failed")?;

    if threads_ignored(&cli, &config) {
        tracing::warn!(
            threads = config.compute.threads,
            "--threads is ignored by the dedicated backend"
        );
    }

    if cli.dry_run {
        print!("{}", config);
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(run(cli, config))
}

/// Submit every input, then wait for all results before shutting down
async fn run(cli: Cli, config: Config) -> Result<()> {
    let pool = Arc::new(
        WorkerPool::new(&config.compute, Arc::new(RecursiveFactorial))
            .context("Failed to start worker pool")?,
    );

    let stdin = Arc::new(StdinInput);
    let surfaces = Surfaces::new(stdin.clone(), Arc::new(ConsoleDisplay), Arc::new(ConsoleNotifier));
    let requester = Requester::new(pool.clone(), surfaces, &config.requester);

    let mut in_flight = Vec::new();

    if cli.inputs.is_empty() {
        // Reading stdin blocks, keep it off the async scheduler
        while !tokio::task::block_in_place(|| stdin.at_end()) {
            let submitted = tokio::task::block_in_place(|| requester.trigger());
            track(submitted, &mut in_flight)?;
        }
    } else {
        for raw in &cli.inputs {
            track(requester.submit(raw), &mut in_flight)?;
        }
    }

    for handle in in_flight {
        handle.await.context("Result task failed")?;
    }

    let stats = pool.shutdown();
    tracing::info!(
        dispatched = stats.dispatched,
        completed = stats.completed,
        "All requests finished"
    );

    Ok(())
}

/// Detach a successful submission; invalid input was already reported
///
/// Any other error (closed pool, worker that failed to start) ends the run
/// with a non-zero exit status.
fn track(
    submitted: std::result::Result<Pending, RequestError>,
    in_flight: &mut Vec<JoinHandle<Option<offload::Completion>>>,
) -> Result<()> {
    match submitted {
        Ok(pending) => in_flight.push(pending.detach()),
        Err(e) if e.is_invalid_input() => {}
        Err(e) => return Err(e).context("Request could not be dispatched"),
    }
    Ok(())
}
