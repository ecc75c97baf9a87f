//! Wait coordinator.
//!
//! Polls a tracker until a matching, unresolved occurrence can be claimed or
//! the deadline passes. Each poll is a single atomic claim, so concurrent
//! waiters on the same signal always receive distinct occurrences.

use crate::recorder::Tracker;
use crate::result::{TrackerError, TrackerResult};
use crate::signal::{EventFilter, Occurrence};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (30 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for waiting on a signal
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Which occurrence counts as a match
    pub filter: EventFilter,
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            filter: EventFilter::default(),
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the filter
    #[must_use]
    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Only match occurrences carrying this `data-testid`
    #[must_use]
    pub fn with_test_id(mut self, test_id: impl Into<String>) -> Self {
        self.filter = self.filter.with_test_id(test_id);
        self
    }

    /// Only match occurrences stamped at or after `after_ms`
    #[must_use]
    pub fn with_after(mut self, after_ms: i64) -> Self {
        self.filter = self.filter.with_after(after_ms);
        self
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration (never zero)
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

// =============================================================================
// EVENT TRACKER TRAIT
// =============================================================================

/// Anything that records signals and can hand out occurrences
///
/// Implemented by the in-process [`Tracker`] and, with the `browser`
/// feature, by a tracked browser page.
#[async_trait]
pub trait EventTracker: Send + Sync {
    /// First unresolved occurrence matching `filter`, without claiming it
    async fn check_for_event(
        &self,
        signal: &str,
        filter: &EventFilter,
    ) -> TrackerResult<Option<Occurrence>>;

    /// Atomically find and resolve the first matching occurrence
    async fn claim_event(
        &self,
        signal: &str,
        filter: &EventFilter,
    ) -> TrackerResult<Option<Occurrence>>;

    /// Clear all recorded occurrences and re-track the current page
    async fn reset(&self) -> TrackerResult<()>;

    /// Detach the recorder; later waits fail with [`TrackerError::Destroyed`]
    async fn destroy(&self) -> TrackerResult<()>;

    /// Wait until `signal` can be claimed
    async fn wait_for_event(&self, signal: &str, options: &WaitOptions) -> TrackerResult<Occurrence> {
        wait_for_event(self, signal, options).await
    }
}

#[async_trait]
impl EventTracker for Tracker {
    async fn check_for_event(
        &self,
        signal: &str,
        filter: &EventFilter,
    ) -> TrackerResult<Option<Occurrence>> {
        Ok(Tracker::check_for_event(self, signal, filter))
    }

    async fn claim_event(
        &self,
        signal: &str,
        filter: &EventFilter,
    ) -> TrackerResult<Option<Occurrence>> {
        self.claim(signal, filter)
    }

    async fn reset(&self) -> TrackerResult<()> {
        Tracker::reset(self);
        Ok(())
    }

    async fn destroy(&self) -> TrackerResult<()> {
        Tracker::destroy(self);
        Ok(())
    }
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// Poll `tracker` until an occurrence of `signal` is claimed
///
/// The first check happens immediately, so an occurrence already in the
/// buffer resolves without waiting. A check is made before every deadline
/// test, which means a timeout of zero still looks once.
///
/// # Errors
///
/// - [`TrackerError::Timeout`] when nothing matched within the timeout
/// - [`TrackerError::Destroyed`] as soon as the tracker is found destroyed
/// - any bridge error raised by the tracker
pub async fn wait_for_event<T>(
    tracker: &T,
    signal: &str,
    options: &WaitOptions,
) -> TrackerResult<Occurrence>
where
    T: EventTracker + ?Sized,
{
    let start = Instant::now();
    let timeout = options.timeout();
    let mut ticker = tokio::time::interval(options.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(signal, filter = %options.filter, timeout_ms = options.timeout_ms, "waiting for signal");
    loop {
        ticker.tick().await;
        if let Some(occurrence) = tracker.claim_event(signal, &options.filter).await? {
            debug!(
                signal,
                seq = occurrence.seq,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "wait satisfied"
            );
            return Ok(occurrence);
        }
        if start.elapsed() >= timeout {
            debug!(signal, timeout_ms = options.timeout_ms, "wait timed out");
            return Err(TrackerError::Timeout {
                signal: signal.to_string(),
                filter: options.filter.clone(),
                timeout_ms: options.timeout_ms,
            });
        }
    }
}
