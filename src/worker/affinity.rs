//! CPU pinning for compute threads
//!
//! Worker threads can optionally be pinned to a set of CPU cores. Cores are
//! handed out round-robin: worker `i` is pinned to `cores[i % cores.len()]`.
//!
//! Pinning is supported on Linux via `sched_setaffinity`; elsewhere it fails
//! and the pool logs a warning and runs unpinned.
//!
//! # Example
//!
//! ```
//! use offload::worker::affinity::{parse_cpu_list, core_for_worker};
//!
//! let cores = parse_cpu_list("0,2-4").unwrap();
//! assert_eq!(cores, vec![0, 2, 3, 4]);
//! assert_eq!(core_for_worker(&cores, 5), Some(2));
//! ```

use crate::Result;
use anyhow::Context;

/// Highest core id accepted (size of `cpu_set_t` in bits)
const MAX_CORE_ID: usize = 1023;

/// Pin the calling thread to a single CPU core
#[cfg(target_os = "linux")]
pub fn pin_current_thread(core: usize) -> Result<()> {
    use libc::{cpu_set_t, sched_setaffinity, CPU_SET, CPU_ZERO};
    use std::mem;

    if core > MAX_CORE_ID {
        anyhow::bail!("CPU core ID {} is too large (max {})", core, MAX_CORE_ID);
    }

    // SAFETY: cpu_set_t is plain data; zeroed is a valid empty set and the
    // pointer passed to sched_setaffinity outlives the call.
    let result = unsafe {
        let mut cpu_set: cpu_set_t = mem::zeroed();
        CPU_ZERO(&mut cpu_set);
        CPU_SET(core, &mut cpu_set);
        sched_setaffinity(0, mem::size_of::<cpu_set_t>(), &cpu_set)
    };

    if result != 0 {
        let err = std::io::Error::last_os_error();
        return Err(err).with_context(|| format!("Failed to pin thread to core {}", core));
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(_core: usize) -> Result<()> {
    anyhow::bail!("CPU pinning is only supported on Linux")
}

/// Core assigned to the given worker index, if any cores are configured
pub fn core_for_worker(cores: &[usize], worker_index: usize) -> Option<usize> {
    if cores.is_empty() {
        None
    } else {
        Some(cores[worker_index % cores.len()])
    }
}

/// Parse a core list such as `"0,2-4,7"` into sorted, deduplicated ids
///
/// # Arguments
///
/// * `spec` - Comma-separated core ids and inclusive `start-end` ranges
///
/// # Errors
///
/// Returns an error for an empty list, a malformed id, a reversed range or
/// an id above the supported maximum.
///
/// # Example
///
/// ```
/// # use offload::worker::affinity::parse_cpu_list;
/// assert_eq!(parse_cpu_list("3,0-1,1").unwrap(), vec![0, 1, 3]);
/// assert!(parse_cpu_list("4-2").is_err());
/// ```
pub fn parse_cpu_list(spec: &str) -> Result<Vec<usize>> {
    let mut cores = Vec::new();

    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_core(start)?;
                let end = parse_core(end)?;
                if start > end {
                    anyhow::bail!("Invalid CPU range: start ({}) > end ({})", start, end);
                }
                cores.extend(start..=end);
            }
            None => cores.push(parse_core(part)?),
        }
    }

    if cores.is_empty() {
        anyhow::bail!("CPU core list cannot be empty");
    }

    cores.sort_unstable();
    cores.dedup();

    Ok(cores)
}

fn parse_core(text: &str) -> Result<usize> {
    let core: usize = text
        .trim()
        .parse()
        .with_context(|| format!("Invalid CPU core number: {}", text))?;

    if core > MAX_CORE_ID {
        anyhow::bail!("CPU core ID {} is too large (max {})", core, MAX_CORE_ID);
    }

    Ok(core)
}
