//! Millisecond wall clock used for occurrence timestamps.
//!
//! Polling cadence and timeouts run on tokio time; this clock only stamps
//! occurrences and resolutions, so tests can pin it with [`FakeClock`].

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of "now" in milliseconds since the Unix epoch
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for deterministic tests
///
/// Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    current_ms: Arc<AtomicI64>,
}

impl FakeClock {
    /// Create a clock fixed at `time_ms`
    #[must_use]
    pub fn at(time_ms: i64) -> Self {
        Self {
            current_ms: Arc::new(AtomicI64::new(time_ms)),
        }
    }

    /// Set clock to a fixed time
    pub fn set(&self, time_ms: i64) {
        self.current_ms.store(time_ms, Ordering::SeqCst);
    }

    /// Fast-forward time by milliseconds
    pub fn advance_ms(&self, ms: i64) {
        self.current_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Fast-forward time by duration
    pub fn advance(&self, duration: Duration) {
        self.advance_ms(duration.as_millis() as i64);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;

/// Default clock for new trackers
#[must_use]
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
