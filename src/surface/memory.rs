//! In-memory surfaces for testing
//!
//! [`MemorySurface`] implements all three surface traits and records every
//! interaction. Clones share the same record, so a test can hand one clone to
//! the requester and inspect another.
//!
//! # Example
//!
//! ```
//! use offload::surface::{DisplaySurface, InputSource, Notifier};
//! use offload::surface::memory::MemorySurface;
//!
//! let surface = MemorySurface::with_input("7");
//! assert_eq!(surface.read(), "7");
//!
//! surface.write("hello");
//! surface.alert("bad");
//! assert_eq!(surface.writes(), vec!["hello"]);
//! assert_eq!(surface.alerts(), vec!["bad"]);
//! ```

use super::{DisplaySurface, InputSource, Notifier};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Record {
    input: String,
    writes: Vec<String>,
    alerts: Vec<String>,
}

/// Recording surface shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
    record: Arc<Mutex<Record>>,
    written: Arc<Notify>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface whose `read()` returns `input`
    pub fn with_input(input: &str) -> Self {
        let surface = Self::new();
        surface.set_input(input);
        surface
    }

    /// Replace the text returned by `read()`
    pub fn set_input(&self, input: &str) {
        self.lock().input = input.to_string();
    }

    /// Everything written to the display, in order
    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    /// Every notification raised, in order
    pub fn alerts(&self) -> Vec<String> {
        self.lock().alerts.clone()
    }

    /// Wait until at least `count` writes have been recorded
    pub async fn wait_for_writes(&self, count: usize) -> Vec<String> {
        loop {
            let notified = self.written.notified();
            {
                let record = self.lock();
                if record.writes.len() >= count {
                    return record.writes.clone();
                }
            }
            notified.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InputSource for MemorySurface {
    fn read(&self) -> String {
        self.lock().input.clone()
    }
}

impl DisplaySurface for MemorySurface {
    fn write(&self, text: &str) {
        self.lock().writes.push(text.to_string());
        self.written.notify_waiters();
    }
}

impl Notifier for MemorySurface {
    fn alert(&self, message: &str) {
        self.lock().alerts.push(message.to_string());
    }
}
