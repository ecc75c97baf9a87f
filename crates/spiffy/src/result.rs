//! Result and error types for Spiffy.

use crate::signal::EventFilter;
use thiserror::Error;

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Errors that can occur while recording or waiting for signals
#[derive(Debug, Error)]
pub enum TrackerError {
    /// No matching occurrence arrived before the deadline
    #[error("{signal}{filter} not fired within {timeout_ms}ms")]
    Timeout {
        /// Signal name that was waited for
        signal: String,
        /// Correlation filter in effect
        filter: EventFilter,
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// URL could not be parsed for normalization
    #[error("Invalid URL {url:?}: {message}")]
    InvalidUrl {
        /// Offending input
        url: String,
        /// Parser message
        message: String,
    },

    /// Tracker was destroyed and must not be reused
    #[error("Tracker has been destroyed; install a new one for this page")]
    Destroyed,

    /// Page bridge call failed or returned an unexpected reply
    #[error("Bridge call failed: {message}")]
    Bridge {
        /// Error message
        message: String,
    },

    /// The in-page agent global is not present
    #[error("Tracker agent is not installed in the page")]
    AgentMissing,

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Page error
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Screenshot capture error
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrackerError {
    /// Create a bridge error
    #[must_use]
    pub fn bridge(message: impl Into<String>) -> Self {
        Self::Bridge {
            message: message.into(),
        }
    }

    /// Whether the error is a wait timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
