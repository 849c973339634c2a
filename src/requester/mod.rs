//! Requester
//!
//! Validates raw user input, hands the parsed value to the worker pool and
//! renders the reply. Each call to [`Requester::submit`] is independent: it
//! gets its own job, its own one-shot reply channel and its own [`Pending`]
//! handle. Nothing is coalesced, queued for retry or cached.
//!
//! # Input rules
//!
//! Input is read the way a lenient integer parser reads it: surrounding
//! whitespace is ignored, an optional sign is accepted and the leading run of
//! digits is used (`"12abc"` is 12, `"3.7"` is 3). A `0x`/`0X` prefix reads
//! the digits that follow as hexadecimal (`"0x10"` is 16). Text without leading
//! digits, negative numbers and numbers above the configured maximum are all
//! rejected as invalid input with exactly one notification.
//!
//! # Example
//!
//! ```
//! use offload::compute::RecursiveFactorial;
//! use offload::config::{ComputeConfig, RequesterConfig};
//! use offload::requester::{Requester, Surfaces};
//! use offload::surface::memory::MemorySurface;
//! use offload::worker::WorkerPool;
//! use std::sync::Arc;
//!
//! # tokio_test_main();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test_main() {
//! let pool = Arc::new(WorkerPool::new(&ComputeConfig::default(), Arc::new(RecursiveFactorial)).unwrap());
//! let surface = MemorySurface::new();
//! let requester = Requester::new(pool, Surfaces::shared(surface.clone()), &RequesterConfig::default());
//!
//! let completion = requester.submit("5").unwrap().complete().await.unwrap();
//! assert_eq!(completion.message, "Factorial of 5 is 120");
//! assert_eq!(surface.writes(), vec!["Factorial of 5 is 120"]);
//! # }
//! ```

use crate::config::RequesterConfig;
use crate::surface::{DisplaySurface, InputSource, Notifier};
use crate::worker::{PoolError, Response, WorkerPool};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Submission errors
///
/// `InvalidInput`, `Negative` and `OutOfRange` are invalid-input errors and
/// have already been reported through the notifier when they are returned.
/// The remaining variants mean the pool could not take the request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Please enter a valid number")]
    InvalidInput { raw: String },

    #[error("Please enter a valid number: {0} is negative")]
    Negative(i64),

    #[error("Please enter a valid number: {raw} exceeds the maximum of {max}")]
    OutOfRange { raw: String, max: u32 },

    #[error("worker pool is shut down")]
    PoolClosed,

    #[error("failed to start a worker: {0}")]
    SpawnFailed(String),
}

impl RequestError {
    /// True for the errors reported to the user as invalid input
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            RequestError::InvalidInput { .. }
                | RequestError::Negative(_)
                | RequestError::OutOfRange { .. }
        )
    }
}

/// The three surfaces a requester talks to
#[derive(Clone)]
pub struct Surfaces {
    pub input: Arc<dyn InputSource>,
    pub display: Arc<dyn DisplaySurface>,
    pub notifier: Arc<dyn Notifier>,
}

impl Surfaces {
    pub fn new(
        input: Arc<dyn InputSource>,
        display: Arc<dyn DisplaySurface>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            input,
            display,
            notifier,
        }
    }

    /// Use one value for input, display and notifications
    pub fn shared<S>(surface: S) -> Self
    where
        S: InputSource + DisplaySurface + Notifier + 'static,
    {
        let surface = Arc::new(surface);
        Self {
            input: surface.clone(),
            display: surface.clone(),
            notifier: surface,
        }
    }
}

/// Validates input and offloads computation to the worker pool
pub struct Requester {
    pool: Arc<WorkerPool>,
    surfaces: Surfaces,
    max_input: u32,
}

impl Requester {
    pub fn new(pool: Arc<WorkerPool>, surfaces: Surfaces, config: &RequesterConfig) -> Self {
        Self {
            pool,
            surfaces,
            max_input: config.max_input,
        }
    }

    /// Read from the input surface and submit what was read
    pub fn trigger(&self) -> Result<Pending, RequestError> {
        let raw = self.surfaces.input.read();
        self.submit(&raw)
    }

    /// Validate `raw` and dispatch it without waiting for the result
    ///
    /// The returned [`Pending`] writes the result to the display when it is
    /// completed. There is no timeout.
    ///
    /// # Arguments
    ///
    /// * `raw` - Text exactly as the user entered it (see the module docs for
    ///   the parsing rules)
    ///
    /// # Errors
    ///
    /// - `InvalidInput`, `Negative`, `OutOfRange`: the input was rejected.
    ///   Exactly one notification has been raised and nothing was dispatched.
    /// - `PoolClosed`: the pool has been shut down.
    /// - `SpawnFailed`: the dedicated backend could not start a thread.
    ///
    /// # Example
    ///
    /// ```
    /// # use offload::compute::RecursiveFactorial;
    /// # use offload::config::{ComputeConfig, RequesterConfig};
    /// # use offload::requester::{RequestError, Requester, Surfaces};
    /// # use offload::surface::memory::MemorySurface;
    /// # use offload::worker::WorkerPool;
    /// # use std::sync::Arc;
    /// let pool = Arc::new(WorkerPool::new(&ComputeConfig::default(), Arc::new(RecursiveFactorial))?);
    /// let surface = MemorySurface::new();
    /// let requester = Requester::new(pool, Surfaces::shared(surface.clone()), &RequesterConfig::default());
    ///
    /// assert!(matches!(requester.submit("abc"), Err(RequestError::InvalidInput { .. })));
    /// assert_eq!(surface.alerts(), vec!["Please enter a valid number"]);
    ///
    /// let pending = requester.submit("7")?;
    /// assert_eq!(pending.n(), 7);
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn submit(&self, raw: &str) -> Result<Pending, RequestError> {
        let n = match validate_input(raw, self.max_input) {
            Ok(n) => n,
            Err(e) => {
                warn!(input = raw, reason = %e, "Rejected input");
                self.surfaces.notifier.alert(&e.to_string());
                return Err(e);
            }
        };

        let reply = self.pool.dispatch(n).map_err(|e| match e {
            PoolError::Closed => RequestError::PoolClosed,
            PoolError::Spawn(io) => {
                error!(error = %io, "Could not start worker");
                RequestError::SpawnFailed(io.to_string())
            }
        })?;

        Ok(Pending {
            n,
            reply,
            display: self.surfaces.display.clone(),
        })
    }
}

/// Result of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Job id assigned by the pool
    pub id: u64,
    pub n: u32,
    pub value: u128,
    /// Text written to the display
    pub message: String,
}

/// A dispatched request waiting for its single reply
#[must_use = "a Pending does nothing unless completed or detached"]
pub struct Pending {
    n: u32,
    reply: oneshot::Receiver<Response>,
    display: Arc<dyn DisplaySurface>,
}

impl Pending {
    /// Input value this request carries
    pub fn n(&self) -> u32 {
        self.n
    }

    /// Wait for the reply and write it to the display
    ///
    /// Resolves to `None` only if the worker went away without replying.
    pub async fn complete(self) -> Option<Completion> {
        let response = match self.reply.await {
            Ok(response) => response,
            Err(_) => {
                warn!(n = self.n, "Worker exited without replying");
                return None;
            }
        };

        let message = render(response.n, response.value);
        self.display.write(&message);
        debug!(id = response.id, n = response.n, "Displayed result");

        Some(Completion {
            id: response.id,
            n: response.n,
            value: response.value,
            message,
        })
    }

    /// Complete in the background on the current tokio runtime
    ///
    /// Must be called from within a tokio runtime.
    pub fn detach(self) -> JoinHandle<Option<Completion>> {
        tokio::spawn(self.complete())
    }
}

/// Text written to the display for a finished request
pub fn render(n: u32, value: u128) -> String {
    format!("Factorial of {} is {}", n, value)
}

/// Leading integer of `raw`, if it has one
///
/// Decimal unless the digits start with `0x`/`0X`, which reads the following
/// hex digits. Values too large for `i64` saturate; they are out of range
/// regardless.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let text = raw.trim();
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    // A 0x/0X prefix switches to hexadecimal
    let (digits, radix) = match rest.get(..2) {
        Some("0x") | Some("0X") => (&rest[2..], 16),
        _ => (rest, 10),
    };

    let end = digits
        .bytes()
        .position(|b| !(b as char).is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude = i64::from_str_radix(&digits[..end], radix).unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse and range-check raw input
pub fn validate_input(raw: &str, max_input: u32) -> Result<u32, RequestError> {
    let value = parse_integer(raw).ok_or_else(|| RequestError::InvalidInput {
        raw: raw.to_string(),
    })?;

    if value < 0 {
        return Err(RequestError::Negative(value));
    }
    if value > i64::from(max_input) {
        return Err(RequestError::OutOfRange {
            raw: raw.trim().to_string(),
            max: max_input,
        });
    }

    // In range of u32 since max_input is a u32
    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{factorial, ComputeUnit, RecursiveFactorial};
    use crate::config::{Backend, ComputeConfig};
    use crate::surface::memory::MemorySurface;
    use std::time::Duration;

    const BOUNDED_WAIT: Duration = Duration::from_millis(200);

    fn setup(backend: Backend) -> (Requester, MemorySurface, Arc<WorkerPool>) {
        setup_with_unit(backend, Arc::new(RecursiveFactorial))
    }

    fn setup_with_unit(
        backend: Backend,
        unit: Arc<dyn ComputeUnit>,
    ) -> (Requester, MemorySurface, Arc<WorkerPool>) {
        let config = ComputeConfig {
            backend,
            threads: 2,
            cpu_cores: None,
        };
        let pool = Arc::new(WorkerPool::new(&config, unit).unwrap());
        let surface = MemorySurface::new();
        let requester = Requester::new(
            pool.clone(),
            Surfaces::shared(surface.clone()),
            &RequesterConfig::default(),
        );
        (requester, surface, pool)
    }

    #[test]
    fn test_parse_integer_lenient() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("  7\n"), Some(7));
        assert_eq!(parse_integer("12abc"), Some(12));
        assert_eq!(parse_integer("3.7"), Some(3));
        assert_eq!(parse_integer("+4"), Some(4));
        assert_eq!(parse_integer("-1"), Some(-1));
        assert_eq!(parse_integer("-0"), Some(0));
        assert_eq!(parse_integer("99999999999999999999999"), Some(i64::MAX));
    }

    #[test]
    fn test_parse_integer_hex_prefix() {
        assert_eq!(parse_integer("0x10"), Some(16));
        assert_eq!(parse_integer("0X1a"), Some(26));
        assert_eq!(parse_integer(" 0x1fz "), Some(31));
        assert_eq!(parse_integer("-0x10"), Some(-16));
        assert_eq!(parse_integer("+0xA"), Some(10));
        assert_eq!(parse_integer("0x"), None);
        assert_eq!(parse_integer("0xg"), None);
        // Only the prefix is special; a leading zero alone stays decimal
        assert_eq!(parse_integer("010"), Some(10));
        assert_eq!(parse_integer("0"), Some(0));
    }

    #[test]
    fn test_out_of_range_reports_typed_text() {
        let err = validate_input(" 99999999999999999999999 ", 34).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please enter a valid number: 99999999999999999999999 exceeds the maximum of 34"
        );
        assert!(!err.to_string().contains(&i64::MAX.to_string()));
    }

    #[test]
    fn test_parse_integer_rejects_non_numeric() {
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("   "), None);
        assert_eq!(parse_integer("abc"), None);
        assert_eq!(parse_integer("-"), None);
        assert_eq!(parse_integer("+x1"), None);
        assert_eq!(parse_integer(".5"), None);
    }

    #[test]
    fn test_validate_input_ranges() {
        assert_eq!(validate_input("0", 34), Ok(0));
        assert_eq!(validate_input("34", 34), Ok(34));
        assert_eq!(validate_input("-3", 34), Err(RequestError::Negative(-3)));
        assert_eq!(
            validate_input("35", 34),
            Err(RequestError::OutOfRange { raw: "35".to_string(), max: 34 })
        );
        assert_eq!(
            validate_input("x", 34),
            Err(RequestError::InvalidInput { raw: "x".to_string() })
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(RequestError::InvalidInput { raw: String::new() }.is_invalid_input());
        assert!(RequestError::Negative(-1).is_invalid_input());
        assert!(RequestError::OutOfRange { raw: "40".to_string(), max: 34 }.is_invalid_input());
        assert!(!RequestError::PoolClosed.is_invalid_input());
        assert!(!RequestError::SpawnFailed("no threads".to_string()).is_invalid_input());
    }

    #[test]
    fn test_render() {
        assert_eq!(render(5, 120), "Factorial of 5 is 120");
    }

    #[tokio::test]
    async fn test_displays_every_small_factorial() {
        let (requester, surface, _pool) = setup(Backend::Pool);

        for n in 0..=20u32 {
            let completion = requester.submit(&n.to_string()).unwrap().complete().await.unwrap();
            assert_eq!(completion.n, n);
            assert_eq!(completion.value, factorial(n));
            assert_eq!(completion.message, format!("Factorial of {} is {}", n, factorial(n)));
        }

        let writes = surface.writes();
        assert_eq!(writes.len(), 21);
        assert_eq!(writes[20], "Factorial of 20 is 2432902008176640000");
        assert!(surface.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_zero_and_one_display_one() {
        let (requester, surface, _pool) = setup(Backend::Pool);

        requester.submit("0").unwrap().complete().await.unwrap();
        requester.submit("1").unwrap().complete().await.unwrap();

        assert_eq!(surface.writes(), vec!["Factorial of 0 is 1", "Factorial of 1 is 1"]);
    }

    #[tokio::test]
    async fn test_non_numeric_alerts_once_and_dispatches_nothing() {
        let (requester, surface, pool) = setup(Backend::Pool);

        let err = requester.submit("abc").err().unwrap();
        assert!(err.is_invalid_input());
        assert_eq!(surface.alerts(), vec!["Please enter a valid number"]);
        assert_eq!(pool.stats().dispatched, 0);
        assert!(surface.writes().is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_alerts_once() {
        let (requester, surface, pool) = setup(Backend::Pool);

        assert!(requester.submit("").is_err());
        assert_eq!(surface.alerts().len(), 1);
        assert_eq!(pool.stats().dispatched, 0);
    }

    #[tokio::test]
    async fn test_negative_input_never_displays() {
        let (requester, surface, pool) = setup(Backend::Pool);

        assert_eq!(requester.submit("-1").err(), Some(RequestError::Negative(-1)));
        assert_eq!(surface.alerts().len(), 1);
        assert_eq!(pool.stats().dispatched, 0);

        let waited = tokio::time::timeout(BOUNDED_WAIT, surface.wait_for_writes(1)).await;
        assert!(waited.is_err(), "negative input must not produce a result");
    }

    #[tokio::test]
    async fn test_out_of_range_rejected() {
        let (requester, surface, _pool) = setup(Backend::Pool);

        assert!(matches!(
            requester.submit("35"),
            Err(RequestError::OutOfRange { max: 34, .. })
        ));
        assert_eq!(surface.alerts().len(), 1);

        let completion = requester.submit("34").unwrap().complete().await.unwrap();
        assert_eq!(completion.value, factorial(34));
    }

    #[tokio::test]
    async fn test_repeated_submissions_are_independent() {
        for backend in [Backend::Pool, Backend::Dedicated] {
            let (requester, surface, pool) = setup(backend);

            let first = requester.submit("5").unwrap();
            let second = requester.submit("5").unwrap();
            let (a, b) = tokio::join!(first.complete(), second.complete());
            let (a, b) = (a.unwrap(), b.unwrap());

            assert_eq!(a.value, 120);
            assert_eq!(b.value, 120);
            assert_ne!(a.id, b.id);
            assert_eq!(surface.writes().len(), 2);
            assert_eq!(pool.stats().dispatched, 2);
        }
    }

    #[tokio::test]
    async fn test_no_cross_talk_between_requests() {
        let (requester, _surface, _pool) = setup(Backend::Dedicated);

        let pendings: Vec<Pending> = (1..=12u32)
            .map(|n| requester.submit(&n.to_string()).unwrap())
            .collect();
        for pending in pendings {
            let n = pending.n();
            let completion = pending.complete().await.unwrap();
            assert_eq!(completion.n, n);
            assert_eq!(completion.value, factorial(n));
        }
    }

    #[tokio::test]
    async fn test_trigger_reads_input_surface() {
        let (requester, surface, _pool) = setup(Backend::Pool);

        surface.set_input(" 6 ");
        let completion = requester.trigger().unwrap().complete().await.unwrap();
        assert_eq!(completion.message, "Factorial of 6 is 720");

        surface.set_input("six");
        assert!(requester.trigger().is_err());
        assert_eq!(surface.alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_detach_returns_immediately() {
        let (requester, surface, _pool) = setup(Backend::Pool);

        let handle = requester.submit("4").unwrap().detach();
        let writes = tokio::time::timeout(Duration::from_secs(5), surface.wait_for_writes(1))
            .await
            .unwrap();
        assert_eq!(writes, vec!["Factorial of 4 is 24"]);
        assert_eq!(handle.await.unwrap().unwrap().value, 24);
    }

    #[tokio::test]
    async fn test_closed_pool_is_not_an_input_error() {
        let (requester, surface, pool) = setup(Backend::Pool);
        pool.shutdown();

        assert_eq!(requester.submit("3").err(), Some(RequestError::PoolClosed));
        assert!(surface.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_hex_input_is_computed() {
        let (requester, surface, _pool) = setup(Backend::Pool);

        let completion = requester.submit("0x10").unwrap().complete().await.unwrap();
        assert_eq!(completion.n, 16);
        assert_eq!(surface.writes(), vec![format!("Factorial of 16 is {}", factorial(16))]);

        assert!(matches!(
            requester.submit("0x"),
            Err(RequestError::InvalidInput { .. })
        ));
        assert_eq!(surface.alerts(), vec!["Please enter a valid number"]);
    }

    struct StallingUnit {
        release: crossbeam::channel::Receiver<()>,
    }

    impl ComputeUnit for StallingUnit {
        fn name(&self) -> &str {
            "stalling"
        }

        fn on_receive(&self, n: u32) -> u128 {
            let _ = self.release.recv();
            factorial(n)
        }
    }

    #[tokio::test]
    async fn test_unresponsive_unit_waits_without_timeout() {
        let (release_tx, release_rx) = crossbeam::channel::unbounded();
        let (requester, surface, _pool) =
            setup_with_unit(Backend::Pool, Arc::new(StallingUnit { release: release_rx }));

        let handle = requester.submit("3").unwrap().detach();
        let waited = tokio::time::timeout(BOUNDED_WAIT, surface.wait_for_writes(1)).await;
        assert!(waited.is_err());
        assert!(surface.alerts().is_empty());

        release_tx.send(()).unwrap();
        assert_eq!(handle.await.unwrap().unwrap().message, "Factorial of 3 is 6");
    }
}
