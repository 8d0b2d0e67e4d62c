//! Time source for the engine, swappable so tests can pin the clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Millisecond clock. `System` reads the OS clock; `Fixed` serves a settable
/// instant.
#[derive(Debug, Clone)]
pub enum Clock {
    System,
    Fixed(Arc<AtomicI64>),
}

impl Clock {
    pub fn system() -> Self {
        Clock::System
    }

    pub fn fixed(now_ms: i64) -> Self {
        Clock::Fixed(Arc::new(AtomicI64::new(now_ms)))
    }

    /// Current time in milliseconds since the Unix epoch, UTC.
    pub fn now_ms(&self) -> i64 {
        match self {
            Clock::System => chrono::Utc::now().timestamp_millis(),
            Clock::Fixed(cell) => cell.load(Ordering::SeqCst),
        }
    }

    /// Move a fixed clock to the given instant. No effect on the system clock.
    pub fn set_ms(&self, now_ms: i64) {
        if let Clock::Fixed(cell) = self {
            cell.store(now_ms, Ordering::SeqCst);
        }
    }

    /// Shift a fixed clock by `delta_ms`. Negative deltas wind it backwards.
    pub fn advance_ms(&self, delta_ms: i64) {
        if let Clock::Fixed(cell) = self {
            cell.fetch_add(delta_ms, Ordering::SeqCst);
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::System
    }
}
