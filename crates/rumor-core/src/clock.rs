//! Time sources.

use crate::types::Timestamp;

/// Source of wall-clock time for touching and expiring records.
///
/// Production code uses [`SystemClock`]; tests drive a manual clock so that
/// TTL boundaries can be hit exactly.
pub trait Clock: Send + Sync + 'static {
    /// Current time.
    fn now(&self) -> Timestamp;
}

/// The operating system's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
