//! Signal catalog and occurrence data model.
//!
//! Signals are custom DOM events dispatched by the application under test.
//! Each firing the recorder accepts becomes an [`Occurrence`] in its buffer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Detail key carrying the origin URL of a signal
pub const DETAIL_URL: &str = "url";

/// Detail key carrying the millisecond timestamp of a signal
pub const DETAIL_TIME: &str = "time";

/// Detail key carrying the correlation id
pub const DETAIL_TEST_ID: &str = "data-testid";

// =============================================================================
// SIGNAL CATALOG
// =============================================================================

/// Application lifecycle signals observed by the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalName {
    /// Application bootstrap finished
    #[serde(rename = "EVENT_APP_INITIALIZED")]
    AppInitialized,
    /// Host page asked for the merchant app
    #[serde(rename = "EVENT_CALL_MERCHANT_APP")]
    CallMerchantApp,
    /// Merchant app is being mounted
    #[serde(rename = "EVENT_MOUNTING_MERCHANT_APP")]
    MountingMerchantApp,
    /// Chat factory is ready
    #[serde(rename = "EVENT_CHAT_FACTORY_INITIALIZED")]
    ChatFactoryInitialized,
    /// Floating chat started rendering
    #[serde(rename = "EVENT_FLOATING_CHAT_RENDERING")]
    FloatingChatRendering,
    /// Floating chat decided not to render
    #[serde(rename = "EVENT_FLOATING_CHAT_NOT_RENDERING")]
    FloatingChatNotRendering,
    /// Floating chat button started rendering
    #[serde(rename = "EVENT_FLOATING_CHAT_BUTTON_RENDERING")]
    FloatingChatButtonRendering,
    /// Shadow DOM container is attached and ready
    #[serde(rename = "EVENT_SHADOW_DOM_CONTAINER_READY")]
    ShadowDomContainerReady,
}

impl SignalName {
    /// Every signal in the catalog, in declaration order
    pub const ALL: [Self; 8] = [
        Self::AppInitialized,
        Self::CallMerchantApp,
        Self::MountingMerchantApp,
        Self::ChatFactoryInitialized,
        Self::FloatingChatRendering,
        Self::FloatingChatNotRendering,
        Self::FloatingChatButtonRendering,
        Self::ShadowDomContainerReady,
    ];

    /// Event type string dispatched by the page
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AppInitialized => "EVENT_APP_INITIALIZED",
            Self::CallMerchantApp => "EVENT_CALL_MERCHANT_APP",
            Self::MountingMerchantApp => "EVENT_MOUNTING_MERCHANT_APP",
            Self::ChatFactoryInitialized => "EVENT_CHAT_FACTORY_INITIALIZED",
            Self::FloatingChatRendering => "EVENT_FLOATING_CHAT_RENDERING",
            Self::FloatingChatNotRendering => "EVENT_FLOATING_CHAT_NOT_RENDERING",
            Self::FloatingChatButtonRendering => "EVENT_FLOATING_CHAT_BUTTON_RENDERING",
            Self::ShadowDomContainerReady => "EVENT_SHADOW_DOM_CONTAINER_READY",
        }
    }
}

impl AsRef<str> for SignalName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for SignalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a name outside the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSignal(pub String);

impl fmt::Display for UnknownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown signal name: {}", self.0)
    }
}

impl std::error::Error for UnknownSignal {}

impl FromStr for SignalName {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|signal| signal.as_str() == s)
            .ok_or_else(|| UnknownSignal(s.to_string()))
    }
}

// =============================================================================
// EVENT DETAIL
// =============================================================================

/// Free-form payload attached to a dispatched signal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventDetail(Map<String, Value>);

impl EventDetail {
    /// Create an empty detail
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an arbitrary JSON value; anything but an object is empty
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Set a key
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Set the origin URL
    #[must_use]
    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.with(DETAIL_URL, url.into())
    }

    /// Set the timestamp
    #[must_use]
    pub fn with_time(self, time_ms: i64) -> Self {
        self.with(DETAIL_TIME, time_ms)
    }

    /// Set the correlation id
    #[must_use]
    pub fn with_test_id(self, test_id: impl Into<String>) -> Self {
        self.with(DETAIL_TEST_ID, test_id.into())
    }

    /// Origin URL, if a non-empty string was supplied
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.0
            .get(DETAIL_URL)
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
    }

    /// Timestamp in milliseconds, if a non-zero number was supplied
    #[must_use]
    pub fn time(&self) -> Option<i64> {
        let value = self.0.get(DETAIL_TIME)?;
        let time = value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))?;
        (time != 0).then_some(time)
    }

    /// Correlation id
    #[must_use]
    pub fn test_id(&self) -> Option<&str> {
        self.0.get(DETAIL_TEST_ID).and_then(Value::as_str)
    }

    /// Raw access to any key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub(crate) fn set_time(&mut self, time_ms: i64) {
        self.0.insert(DETAIL_TIME.to_string(), Value::from(time_ms));
    }

    /// Consume into the underlying map
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for EventDetail {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// =============================================================================
// EVENT FILTER
// =============================================================================

/// Correlation filter used to pick which buffered occurrence matches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    /// Exact match on `data-testid`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    /// Only occurrences with timestamp >= this many ms since epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<i64>,
}

impl EventFilter {
    /// Filter that matches every occurrence
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a correlation id
    #[must_use]
    pub fn with_test_id(mut self, test_id: impl Into<String>) -> Self {
        self.test_id = Some(test_id.into());
        self
    }

    /// Require timestamp >= `after`
    #[must_use]
    pub const fn with_after(mut self, after: i64) -> Self {
        self.after = Some(after);
        self
    }

    /// Check an occurrence against the filter; resolved occurrences never match
    #[must_use]
    pub fn matches(&self, occurrence: &Occurrence) -> bool {
        if occurrence.resolved {
            return false;
        }
        if let Some(ref test_id) = self.test_id {
            if occurrence.detail.test_id() != Some(test_id.as_str()) {
                return false;
            }
        }
        if let Some(after) = self.after {
            if occurrence.timestamp < after {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref test_id) = self.test_id {
            write!(f, " with data-testid={test_id}")?;
        }
        if let Some(after) = self.after {
            write!(f, " after {after}")?;
        }
        Ok(())
    }
}

// =============================================================================
// OCCURRENCE
// =============================================================================

/// One recorded firing of a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    /// Buffer-wide insertion number
    pub seq: u64,
    /// Signal name as dispatched
    pub signal: String,
    /// Payload, with `time` filled in
    pub detail: EventDetail,
    /// Milliseconds since epoch
    pub timestamp: i64,
    /// Claimed by a wait
    pub resolved: bool,
    /// When it was claimed
    pub resolved_at: Option<i64>,
}

impl Occurrence {
    pub(crate) fn new(seq: u64, signal: impl Into<String>, detail: EventDetail, timestamp: i64) -> Self {
        Self {
            seq,
            signal: signal.into(),
            detail,
            timestamp,
            resolved: false,
            resolved_at: None,
        }
    }

    pub(crate) fn resolve(&mut self, now_ms: i64) {
        self.resolved = true;
        self.resolved_at = Some(now_ms);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    mod catalog_tests {
        use super::*;

        #[test]
        fn test_wire_names() {
            assert_eq!(SignalName::AppInitialized.as_str(), "EVENT_APP_INITIALIZED");
            assert_eq!(
                SignalName::ShadowDomContainerReady.to_string(),
                "EVENT_SHADOW_DOM_CONTAINER_READY"
            );
        }

        #[test]
        fn test_parse_every_signal() {
            for signal in SignalName::ALL {
                assert_eq!(signal.as_str().parse::<SignalName>().unwrap(), signal);
            }
        }

        #[test]
        fn test_parse_unknown() {
            let err = "EVENT_X".parse::<SignalName>().unwrap_err();
            assert_eq!(err, UnknownSignal("EVENT_X".to_string()));
        }

        #[test]
        fn test_serde_uses_wire_name() {
            let json = serde_json::to_string(&SignalName::CallMerchantApp).unwrap();
            assert_eq!(json, "\"EVENT_CALL_MERCHANT_APP\"");
        }
    }

    mod detail_tests {
        use super::*;

        #[test]
        fn test_non_object_is_empty() {
            assert_eq!(EventDetail::from_value(json!(null)), EventDetail::new());
            assert_eq!(EventDetail::from_value(json!("x")), EventDetail::new());
        }

        #[test]
        fn test_accessors() {
            let detail = EventDetail::from_value(json!({
                "url": "https://a.com/x",
                "time": 1234,
                "data-testid": "t1",
                "extra": true
            }));
            assert_eq!(detail.url(), Some("https://a.com/x"));
            assert_eq!(detail.time(), Some(1234));
            assert_eq!(detail.test_id(), Some("t1"));
            assert_eq!(detail.get("extra"), Some(&json!(true)));
        }

        #[test]
        fn test_empty_url_and_zero_time_are_absent() {
            let detail = EventDetail::new().with_url("").with_time(0);
            assert!(detail.url().is_none());
            assert!(detail.time().is_none());
        }

        #[test]
        fn test_float_time() {
            let detail = EventDetail::from_value(json!({ "time": 1700.9 }));
            assert_eq!(detail.time(), Some(1700));
        }
    }

    mod filter_tests {
        use super::*;

        fn occurrence(test_id: Option<&str>, timestamp: i64) -> Occurrence {
            let mut detail = EventDetail::new();
            if let Some(id) = test_id {
                detail = detail.with_test_id(id);
            }
            Occurrence::new(0, "EVENT_APP_INITIALIZED", detail, timestamp)
        }

        #[test]
        fn test_empty_filter_matches_unresolved() {
            assert!(EventFilter::new().matches(&occurrence(None, 10)));
        }

        #[test]
        fn test_resolved_never_matches() {
            let mut occ = occurrence(None, 10);
            occ.resolve(20);
            assert!(!EventFilter::new().matches(&occ));
        }

        #[test]
        fn test_test_id_exact_match() {
            let filter = EventFilter::new().with_test_id("a");
            assert!(filter.matches(&occurrence(Some("a"), 10)));
            assert!(!filter.matches(&occurrence(Some("b"), 10)));
            assert!(!filter.matches(&occurrence(None, 10)));
        }

        #[test]
        fn test_after_is_inclusive() {
            let filter = EventFilter::new().with_after(100);
            assert!(filter.matches(&occurrence(None, 100)));
            assert!(filter.matches(&occurrence(None, 101)));
            assert!(!filter.matches(&occurrence(None, 99)));
        }

        #[test]
        fn test_display() {
            assert_eq!(EventFilter::new().to_string(), "");
            assert_eq!(
                EventFilter::new().with_test_id("x").with_after(5).to_string(),
                " with data-testid=x after 5"
            );
        }
    }
}
