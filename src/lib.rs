//! offload - compute factorials on isolated background workers
//!
//! A requester validates one raw input, hands the parsed number to an
//! isolated compute context and renders the single reply it gets back.
//!
//! # Architecture
//!
//! - **Requester**: input validation, dispatch, one-shot completion
//! - **Worker pool**: isolated compute contexts with guaranteed release
//! - **Compute units**: the computation itself (recursive factorial)
//! - **Surfaces**: injected input, display and notification boundaries
//! - **Config**: TOML file plus CLI overrides, validated before use

pub mod compute;
pub mod config;
pub mod requester;
pub mod surface;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use compute::{ComputeUnit, RecursiveFactorial};
pub use config::Config;
pub use requester::{Completion, Pending, RequestError, Requester, Surfaces};
pub use worker::WorkerPool;

/// Result type used throughout offload
pub type Result<T> = anyhow::Result<T>;
