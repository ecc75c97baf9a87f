//! Driver-to-page bridge contract.
//!
//! The driver never touches page objects directly. It evaluates the
//! expression rendered by [`BridgeCall::expression`], which calls the agent's
//! single global handle and returns a JSON string that decodes into a
//! [`BridgeReply`].
//!
//! ```text
//!   driver ── BridgeCall::Drain ──► window.__spiffy_tracker.call(...)
//!          ◄── BridgeReply::Records([PageRecord, ...]) as JSON text
//! ```

use crate::result::{TrackerError, TrackerResult};
use crate::signal::EventDetail;
use serde::{Deserialize, Serialize};

/// Name of the agent's global handle on `window`
pub const AGENT_GLOBAL: &str = "__spiffy_tracker";

/// Request sent to the in-page agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum BridgeCall {
    /// Hand over and clear the agent's record log
    Drain,
    /// Current `location.href`
    Location,
    /// Detach listeners and remove the global handle
    Destroy,
}

impl BridgeCall {
    /// JavaScript expression that performs the call and yields JSON text
    ///
    /// Evaluates to the string `"null"` when the agent is not installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the call cannot be serialized
    pub fn expression(&self) -> TrackerResult<String> {
        let payload = serde_json::to_string(self)?;
        Ok(format!(
            "JSON.stringify(window.{AGENT_GLOBAL} ? window.{AGENT_GLOBAL}.call({payload}) : null)"
        ))
    }
}

/// Reply produced by the in-page agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum BridgeReply {
    /// Drained records, oldest first
    Records(Vec<PageRecord>),
    /// Current `location.href`
    Location(String),
    /// Whether the agent was live before the call
    Destroyed(bool),
}

impl BridgeReply {
    /// Decode the JSON text returned by a [`BridgeCall::expression`]
    ///
    /// # Errors
    ///
    /// - [`TrackerError::AgentMissing`] when the page has no agent
    /// - [`TrackerError::Json`] when the text is not a valid reply
    pub fn parse(raw: &str) -> TrackerResult<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        if value.is_null() {
            return Err(TrackerError::AgentMissing);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Expect a [`BridgeReply::Records`] reply
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Bridge`] for any other reply
    pub fn into_records(self) -> TrackerResult<Vec<PageRecord>> {
        match self {
            Self::Records(records) => Ok(records),
            other => Err(TrackerError::bridge(format!("expected records, got {other:?}"))),
        }
    }

    /// Expect a [`BridgeReply::Location`] reply
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Bridge`] for any other reply
    pub fn into_location(self) -> TrackerResult<String> {
        match self {
            Self::Location(href) => Ok(href),
            other => Err(TrackerError::bridge(format!("expected location, got {other:?}"))),
        }
    }

    /// Expect a [`BridgeReply::Destroyed`] reply
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Bridge`] for any other reply
    pub fn into_destroyed(self) -> TrackerResult<bool> {
        match self {
            Self::Destroyed(was_live) => Ok(was_live),
            other => Err(TrackerError::bridge(format!("expected destroyed, got {other:?}"))),
        }
    }
}

/// One entry of the agent's log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PageRecord {
    /// A catalog signal was dispatched
    Signal {
        /// Log sequence number
        seq: u64,
        /// Signal name
        name: String,
        /// `location.href` at dispatch time
        href: String,
        /// JSON-safe copy of the payload, `time` filled in
        #[serde(default)]
        detail: EventDetail,
    },
    /// `popstate` fired
    Navigation {
        /// Log sequence number
        seq: u64,
        /// `location.href` after the navigation
        href: String,
    },
}

impl PageRecord {
    /// Log sequence number
    #[must_use]
    pub const fn seq(&self) -> u64 {
        match self {
            Self::Signal { seq, .. } | Self::Navigation { seq, .. } => *seq,
        }
    }

    /// Location carried by the record
    #[must_use]
    pub fn href(&self) -> &str {
        match self {
            Self::Signal { href, .. } | Self::Navigation { href, .. } => href,
        }
    }
}
