//! Bounded retries around a signal wait

use crate::config::{DEFAULT_BACKOFF_MS, DEFAULT_WAIT_ATTEMPTS};
use serde::{Deserialize, Serialize};
use spiffy::{EventTracker, Occurrence, TrackerError, WaitOptions};
use std::time::Duration;
use tracing::{error, info, warn};

/// How often to wait for one signal, and how long to pause in between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Wait attempts, at least one is always made
    pub attempts: u32,
    /// Pause between attempts
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_WAIT_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    /// Create a policy
    #[must_use]
    pub const fn new(attempts: u32, backoff_ms: u64) -> Self {
        Self {
            attempts,
            backoff_ms,
        }
    }

    /// Attempts actually made
    #[must_use]
    pub const fn effective_attempts(&self) -> u32 {
        if self.attempts == 0 {
            1
        } else {
            self.attempts
        }
    }

    /// Pause between attempts
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Result of a retried wait
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    /// Signal waited for
    pub signal: String,
    /// The claimed occurrence, if any attempt succeeded
    pub received: Option<Occurrence>,
    /// Attempts made
    pub attempts: u32,
    /// Error of the last failed attempt
    pub last_error: Option<String>,
}

impl RetryOutcome {
    /// Whether the signal was received
    #[must_use]
    pub const fn is_received(&self) -> bool {
        self.received.is_some()
    }

    /// Human-readable failure line, `None` when received
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        if self.is_received() {
            return None;
        }
        let mut message = format!(
            "Failed to receive {:?} after {} attempt{}",
            self.signal,
            self.attempts,
            if self.attempts == 1 { "" } else { "s" }
        );
        if let Some(ref last) = self.last_error {
            message.push_str(": ");
            message.push_str(last);
        }
        Some(message)
    }
}

/// Wait for `signal`, retrying failed attempts under `policy`
///
/// Any failed attempt counts, timeouts and bridge errors alike, except a
/// destroyed tracker which ends the loop at once. Retry exhaustion is not
/// an error; it is reported through the outcome.
pub async fn wait_with_retry<T>(
    tracker: &T,
    signal: &str,
    options: &WaitOptions,
    policy: &RetryPolicy,
) -> RetryOutcome
where
    T: EventTracker + ?Sized,
{
    let max = policy.effective_attempts();
    let mut outcome = RetryOutcome {
        signal: signal.to_string(),
        received: None,
        attempts: 0,
        last_error: None,
    };

    for attempt in 1..=max {
        outcome.attempts = attempt;
        info!(
            signal,
            attempt,
            max,
            timeout_ms = options.timeout_ms,
            "waiting for signal"
        );

        match tracker.wait_for_event(signal, options).await {
            Ok(occurrence) => {
                info!(signal, attempt, seq = occurrence.seq, "signal received");
                outcome.received = Some(occurrence);
                outcome.last_error = None;
                return outcome;
            }
            Err(TrackerError::Destroyed) => {
                outcome.last_error = Some(TrackerError::Destroyed.to_string());
                break;
            }
            Err(e) => {
                warn!(signal, attempt, max, error = %e, "signal not received");
                outcome.last_error = Some(e.to_string());
            }
        }

        if attempt < max && policy.backoff_ms > 0 {
            tokio::time::sleep(policy.backoff()).await;
        }
    }

    error!(signal, attempts = outcome.attempts, "giving up on signal");
    outcome
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use spiffy::{Document, EventDetail, FakeClock, SignalName, Tracker};
    use std::sync::Arc;
    use tokio::time::Instant;

    const PAGE: &str = "https://fakestoreapi.com/products/1";
    const APP: &str = "EVENT_APP_INITIALIZED";

    fn setup() -> (Document, Tracker) {
        let doc = Document::new(PAGE);
        let tracker = Tracker::install_with_clock(&doc, Arc::new(FakeClock::at(5_000))).unwrap();
        (doc, tracker)
    }

    mod policy_tests {
        use super::*;

        #[test]
        fn test_default_policy() {
            let policy = RetryPolicy::default();
            assert_eq!(policy.attempts, 3);
            assert_eq!(policy.backoff(), Duration::from_secs(1));
        }

        #[test]
        fn test_zero_attempts_still_tries_once() {
            assert_eq!(RetryPolicy::new(0, 10).effective_attempts(), 1);
            assert_eq!(RetryPolicy::new(4, 10).effective_attempts(), 4);
        }
    }

    mod outcome_tests {
        use super::*;

        #[test]
        fn test_failure_message() {
            let outcome = RetryOutcome {
                signal: APP.to_string(),
                received: None,
                attempts: 3,
                last_error: Some("EVENT_APP_INITIALIZED not fired within 100ms".to_string()),
            };
            assert_eq!(
                outcome.failure_message().unwrap(),
                "Failed to receive \"EVENT_APP_INITIALIZED\" after 3 attempts: \
                 EVENT_APP_INITIALIZED not fired within 100ms"
            );
        }

        #[test]
        fn test_single_attempt_wording() {
            let outcome = RetryOutcome {
                signal: APP.to_string(),
                received: None,
                attempts: 1,
                last_error: None,
            };
            assert_eq!(
                outcome.failure_message().unwrap(),
                "Failed to receive \"EVENT_APP_INITIALIZED\" after 1 attempt"
            );
        }
    }

    mod wait_with_retry_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_first_attempt_succeeds() {
            let (doc, tracker) = setup();
            doc.dispatch(SignalName::AppInitialized, EventDetail::new());

            let outcome = wait_with_retry(
                &tracker,
                APP,
                &WaitOptions::new().with_timeout(100),
                &RetryPolicy::default(),
            )
            .await;
            assert!(outcome.is_received());
            assert_eq!(outcome.attempts, 1);
            assert!(outcome.failure_message().is_none());
        }

        #[tokio::test(start_paused = true)]
        async fn test_all_attempts_time_out() {
            let (_doc, tracker) = setup();
            let start = Instant::now();

            let outcome = wait_with_retry(
                &tracker,
                APP,
                &WaitOptions::new().with_timeout(100),
                &RetryPolicy::new(3, 1_000),
            )
            .await;

            assert!(!outcome.is_received());
            assert_eq!(outcome.attempts, 3);
            assert!(outcome.last_error.as_deref().unwrap().contains("not fired within 100ms"));
            // three waits of ~100ms with two pauses, none after the last attempt
            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_millis(2_300), "{elapsed:?}");
            assert!(elapsed < Duration::from_millis(2_500), "{elapsed:?}");
        }

        #[tokio::test(start_paused = true)]
        async fn test_signal_during_backoff_is_taken_next_attempt() {
            let (doc, tracker) = setup();
            let emitter = doc.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                emitter.dispatch(SignalName::ShadowDomContainerReady, EventDetail::new());
            });

            let outcome = wait_with_retry(
                &tracker,
                SignalName::ShadowDomContainerReady.as_str(),
                &WaitOptions::new().with_timeout(100),
                &RetryPolicy::new(3, 1_000),
            )
            .await;
            assert!(outcome.is_received());
            assert_eq!(outcome.attempts, 2);
            assert!(outcome.last_error.is_none());
        }

        #[tokio::test(start_paused = true)]
        async fn test_destroyed_tracker_stops_retrying() {
            let (_doc, tracker) = setup();
            tracker.destroy();
            let start = Instant::now();

            let outcome = wait_with_retry(
                &tracker,
                APP,
                &WaitOptions::new().with_timeout(100),
                &RetryPolicy::new(5, 1_000),
            )
            .await;
            assert_eq!(outcome.attempts, 1);
            assert!(start.elapsed() < Duration::from_millis(100));
            assert!(outcome
                .failure_message()
                .unwrap()
                .contains("destroyed"));
        }
    }
}
