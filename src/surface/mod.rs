//! User-facing surfaces
//!
//! The requester never touches a terminal or window directly. It is handed
//! three small abstractions at construction:
//!
//! - [`InputSource`]: where raw text comes from
//! - [`DisplaySurface`]: where formatted results go
//! - [`Notifier`]: blocking user notification for invalid input
//!
//! Console implementations live in [`console`]; [`memory`] records every
//! interaction for tests.

pub mod console;
pub mod memory;

/// Source of raw, user-editable text
pub trait InputSource: Send + Sync {
    fn read(&self) -> String;
}

/// Target for rendered results
pub trait DisplaySurface: Send + Sync {
    fn write(&self, text: &str);
}

/// Blocking notification shown to the user
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}
