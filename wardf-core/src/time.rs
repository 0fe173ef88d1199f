//! Time management for the DF engine
//!
//! Provides a clock abstraction so the engine, the HAL and the tests agree on
//! one notion of "now":
//! - System clock (wall time, milliseconds since the Unix epoch)
//! - Manual clock (shared, settable; for tests and replays)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Timestamp in milliseconds since epoch (or since an arbitrary start for manual clocks)
pub type Timestamp = u64;

/// Source of time for the system
pub trait Clock: Send + Sync {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;

    /// Check if this source provides wall clock time (vs a test/replay clock)
    fn is_wall_clock(&self) -> bool;
}

/// System time source
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        true
    }
}

/// Settable clock for testing
///
/// Clones share the same underlying counter, so a test can hold one handle
/// and advance the time seen by the engine and its backends.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    timestamp: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at `timestamp`
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp: Arc::new(AtomicU64::new(timestamp)),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, timestamp: Timestamp) {
        self.timestamp.store(timestamp, Ordering::SeqCst);
    }

    /// Move forward by `ms`
    pub fn advance(&self, ms: u64) {
        self.timestamp.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.timestamp.load(Ordering::SeqCst)
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

/// Milliseconds between two timestamps, zero if `later` precedes `earlier`
pub fn delta_ms(earlier: Timestamp, later: Timestamp) -> u64 {
    later.saturating_sub(earlier)
}
