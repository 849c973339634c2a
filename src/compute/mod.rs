//! Compute units
//!
//! A compute unit is the pure computation executed inside an isolated worker
//! context. It receives one integer and produces one integer; it has no error
//! channel and keeps no state between requests.
//!
//! # Example
//!
//! ```
//! use offload::compute::{ComputeUnit, RecursiveFactorial};
//!
//! let unit = RecursiveFactorial;
//! assert_eq!(unit.on_receive(5), 120);
//! ```

use std::fmt;

/// Largest `n` whose factorial fits in a `u128`.
///
/// `34!` is roughly 2.95e38 while `u128::MAX` is roughly 3.40e38.
pub const MAX_FACTORIAL_INPUT: u32 = 34;

/// Computation run inside a worker context
///
/// Implementations must be `Send + Sync` because a single unit is shared by
/// every worker thread in the pool. The call must not depend on any previous
/// call: each request is isolated.
pub trait ComputeUnit: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Handle one request and produce its reply
    fn on_receive(&self, n: u32) -> u128;
}

/// Recursive factorial, `f(0) = f(1) = 1`, `f(n) = n * f(n - 1)`
#[derive(Debug, Clone, Copy, Default)]
pub struct RecursiveFactorial;

impl ComputeUnit for RecursiveFactorial {
    fn name(&self) -> &str {
        "recursive-factorial"
    }

    fn on_receive(&self, n: u32) -> u128 {
        factorial(n)
    }
}

/// Compute `n!` recursively
///
/// Callers must keep `n <= MAX_FACTORIAL_INPUT`; larger values overflow.
pub fn factorial(n: u32) -> u128 {
    match n {
        0 | 1 => 1,
        n => n as u128 * factorial(n - 1),
    }
}

/// State of a single worker context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Idle,
    Computing,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitState::Idle => write!(f, "idle"),
            UnitState::Computing => write!(f, "computing"),
        }
    }
}
