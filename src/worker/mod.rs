//! Compute worker pool
//!
//! The pool owns every isolated execution context a request can run in. A
//! request is handed to exactly one context as a [`Job`] and its result comes
//! back through a one-shot reply channel created per request, so two requests
//! never share a reply path.
//!
//! # Backends
//!
//! - **Pool**: a fixed set of long-lived threads fed from a crossbeam channel
//! - **Dedicated**: a fresh thread per request, tracked until it is joined
//!
//! Either way every thread the pool creates is joined by [`WorkerPool::shutdown`],
//! which also runs on drop.
//!
//! # Example
//!
//! ```
//! use offload::compute::RecursiveFactorial;
//! use offload::config::ComputeConfig;
//! use offload::worker::WorkerPool;
//! use std::sync::Arc;
//!
//! let config = ComputeConfig { threads: 2, ..Default::default() };
//! let pool = WorkerPool::new(&config, Arc::new(RecursiveFactorial))?;
//!
//! let reply = pool.dispatch(5)?;
//! let response = reply.blocking_recv()?;
//! assert_eq!(response.value, 120);
//!
//! let stats = pool.shutdown();
//! assert_eq!(stats.completed, 1);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod affinity;

use crate::compute::{ComputeUnit, UnitState};
use crate::config::{Backend, ComputeConfig};
use crate::Result;
use anyhow::Context;
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};

/// A single request travelling to a worker context
#[derive(Debug)]
pub struct Job {
    /// Pool-unique request id
    pub id: u64,
    /// Input value
    pub n: u32,
    /// One-shot reply path back to the requester
    reply: oneshot::Sender<Response>,
}

/// Reply produced by a worker context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    /// Id of the job this answers
    pub id: u64,
    /// Echoed input value
    pub n: u32,
    /// Computed result
    pub value: u128,
}

/// Dispatch errors
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("worker pool is shut down")]
    Closed,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
}

/// Point-in-time pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub dispatched: u64,
    pub completed: u64,
    pub in_flight: u64,
    /// Threads created by the pool and not yet joined
    pub live_threads: usize,
}

/// Execution context owned by one worker thread
///
/// Tracks the `Idle -> Computing -> Idle` cycle of the unit it drives.
struct WorkerContext {
    name: String,
    unit: Arc<dyn ComputeUnit>,
    counters: Arc<Counters>,
    state: UnitState,
}

impl WorkerContext {
    fn new(name: String, unit: Arc<dyn ComputeUnit>, counters: Arc<Counters>) -> Self {
        Self {
            name,
            unit,
            counters,
            state: UnitState::Idle,
        }
    }

    fn pin(&self, core: Option<usize>) {
        if let Some(core) = core {
            match affinity::pin_current_thread(core) {
                Ok(()) => debug!(worker = %self.name, core, "Pinned worker thread"),
                Err(e) => warn!(worker = %self.name, core, error = %e, "Running unpinned"),
            }
        }
    }

    fn handle(&mut self, job: Job) {
        self.transition(UnitState::Computing, job.id);
        let value = self.unit.on_receive(job.n);
        self.counters.completed.fetch_add(1, Ordering::Relaxed);

        let response = Response {
            id: job.id,
            n: job.n,
            value,
        };
        if job.reply.send(response).is_err() {
            debug!(worker = %self.name, id = job.id, "Requester dropped before reply");
        }
        self.transition(UnitState::Idle, job.id);
    }

    fn transition(&mut self, next: UnitState, id: u64) {
        trace!(worker = %self.name, id, from = %self.state, to = %next, "Unit state");
        self.state = next;
    }
}

/// Pool of isolated compute contexts
pub struct WorkerPool {
    backend: Backend,
    unit: Arc<dyn ComputeUnit>,
    cores: Vec<usize>,
    /// Job queue feeding pool threads; `None` once shut down or in dedicated mode
    jobs: Mutex<Option<Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    /// Held for the whole of `shutdown` so no caller returns before the join
    joining: Mutex<()>,
    closed: AtomicBool,
    next_id: AtomicU64,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Create a pool for the given unit
    ///
    /// With the pool backend the worker threads are started here; with the
    /// dedicated backend threads are started per dispatch.
    ///
    /// # Arguments
    ///
    /// * `config` - Backend, thread count and optional `cpu_cores` list
    /// * `unit` - Compute unit shared by every worker context
    ///
    /// # Errors
    ///
    /// Returns an error if `cpu_cores` does not parse or a pool thread cannot
    /// be spawned.
    pub fn new(config: &ComputeConfig, unit: Arc<dyn ComputeUnit>) -> Result<Self> {
        let cores = match config.cpu_cores {
            Some(ref spec) => affinity::parse_cpu_list(spec).context("Invalid cpu_cores")?,
            None => Vec::new(),
        };

        let pool = Self {
            backend: config.backend,
            unit,
            cores,
            jobs: Mutex::new(None),
            handles: Mutex::new(Vec::new()),
            joining: Mutex::new(()),
            closed: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            counters: Arc::new(Counters::default()),
        };

        if pool.backend == Backend::Pool {
            pool.start_threads(config.threads)?;
        }

        debug!(
            backend = %pool.backend,
            unit = pool.unit.name(),
            threads = config.threads,
            "Worker pool ready"
        );

        Ok(pool)
    }

    fn start_threads(&self, threads: usize) -> Result<()> {
        let (tx, rx) = channel::unbounded::<Job>();
        let mut handles = self.lock_handles();

        for index in 0..threads {
            let name = format!("compute-worker-{}", index);
            let context = WorkerContext::new(name.clone(), self.unit.clone(), self.counters.clone());
            let core = affinity::core_for_worker(&self.cores, index);
            let rx: Receiver<Job> = rx.clone();

            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_worker(context, rx, core))
                .with_context(|| format!("Failed to spawn {}", name))?;
            handles.push(handle);
        }

        *self.lock_jobs() = Some(tx);
        Ok(())
    }

    /// Backend in use
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Hand `n` to a worker context; the receiver resolves exactly once
    ///
    /// There is no timeout: if the unit never finishes, the receiver never
    /// resolves.
    ///
    /// # Errors
    ///
    /// - `PoolError::Closed` after [`WorkerPool::shutdown`]
    /// - `PoolError::Spawn` if the dedicated backend cannot start a thread
    ///
    /// # Example
    ///
    /// ```
    /// # use offload::compute::RecursiveFactorial;
    /// # use offload::config::{Backend, ComputeConfig};
    /// # use offload::worker::{PoolError, WorkerPool};
    /// # use std::sync::Arc;
    /// let config = ComputeConfig { backend: Backend::Dedicated, ..Default::default() };
    /// let pool = WorkerPool::new(&config, Arc::new(RecursiveFactorial))?;
    ///
    /// assert_eq!(pool.dispatch(4)?.blocking_recv()?.value, 24);
    ///
    /// pool.shutdown();
    /// assert!(matches!(pool.dispatch(4), Err(PoolError::Closed)));
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn dispatch(&self, n: u32) -> std::result::Result<oneshot::Receiver<Response>, PoolError> {
        let (reply, rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let job = Job { id, n, reply };

        match self.backend {
            Backend::Pool => {
                let jobs = self.lock_jobs();
                let sender = jobs.as_ref().ok_or(PoolError::Closed)?;
                sender.send(job).map_err(|_| PoolError::Closed)?;
            }
            Backend::Dedicated => self.spawn_dedicated(job)?,
        }

        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        debug!(id, n, backend = %self.backend, "Dispatched job");
        Ok(rx)
    }

    fn spawn_dedicated(&self, job: Job) -> std::result::Result<(), PoolError> {
        // Checked under the handles lock so shutdown cannot miss a new thread
        let mut handles = self.lock_handles();
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }
        reap_finished(&mut handles);

        let name = format!("compute-{}", job.id);
        let mut context = WorkerContext::new(name.clone(), self.unit.clone(), self.counters.clone());
        let core = affinity::core_for_worker(&self.cores, job.id as usize);

        let handle = thread::Builder::new().name(name).spawn(move || {
            context.pin(core);
            context.handle(job);
        })?;
        handles.push(handle);

        Ok(())
    }

    /// Current counters
    pub fn stats(&self) -> PoolStats {
        let dispatched = self.counters.dispatched.load(Ordering::Relaxed);
        let completed = self.counters.completed.load(Ordering::Relaxed);
        let live_threads = self.lock_handles().len();

        PoolStats {
            dispatched,
            completed,
            in_flight: dispatched.saturating_sub(completed),
            live_threads,
        }
    }

    /// Stop accepting work and join every worker thread
    ///
    /// Jobs already queued are still computed before the pool threads exit.
    /// Blocks until every context has finished, including when another thread
    /// is already shutting the pool down. Calling it again is a no-op.
    pub fn shutdown(&self) -> PoolStats {
        let _joining = self.joining.lock().unwrap_or_else(PoisonError::into_inner);
        let handles = {
            let mut handles = self.lock_handles();
            if self.closed.swap(true, Ordering::AcqRel) && handles.is_empty() {
                drop(handles);
                return self.stats();
            }
            // Dropping the sender ends the worker loops once the queue drains
            self.lock_jobs().take();
            std::mem::take(&mut *handles)
        };

        for handle in handles {
            let name = handle.thread().name().unwrap_or("compute").to_string();
            if handle.join().is_err() {
                error!(worker = %name, "Worker thread panicked");
            }
        }

        let stats = self.stats();
        debug!(
            dispatched = stats.dispatched,
            completed = stats.completed,
            "Worker pool shut down"
        );
        stats
    }

    fn lock_jobs(&self) -> MutexGuard<'_, Option<Sender<Job>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_handles(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Pool thread body: serve jobs until the queue is closed
fn run_worker(mut context: WorkerContext, jobs: Receiver<Job>, core: Option<usize>) {
    context.pin(core);
    for job in jobs.iter() {
        context.handle(job);
    }
    trace!(worker = %context.name, "Worker loop finished");
}

/// Join dedicated threads that have already returned
fn reap_finished(handles: &mut Vec<JoinHandle<()>>) {
    let mut index = 0;
    while index < handles.len() {
        if handles[index].is_finished() {
            let handle = handles.swap_remove(index);
            if handle.join().is_err() {
                error!("Dedicated worker thread panicked");
            }
        } else {
            index += 1;
        }
    }
}
