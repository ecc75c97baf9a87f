//! Spiffy: page signal recorder and wait coordinator
//!
//! Host pages announce their lifecycle by dispatching named custom events
//! (`EVENT_APP_INITIALIZED`, `EVENT_SHADOW_DOM_CONTAINER_READY`, ...). Spiffy
//! records those signals per logical page and lets a test driver wait for
//! them, optionally correlated by `data-testid` and a time floor.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  browser page                           driver (Rust)            │
//! │  ┌─────────────┐   drain    ┌────────┐   ┌─────────┐   ┌──────┐  │
//! │  │ agent (JS)  │──────────►│ Mirror │──►│ Tracker │◄──│ wait │  │
//! │  │ raw records │  (bridge)  │Document│   │ buffer  │   │ poll │  │
//! │  └─────────────┘            └────────┘   └─────────┘   └──────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same [`Tracker`] runs directly against an in-process [`Document`],
//! which is how everything is tested without a browser:
//!
//! ```
//! use spiffy::{Document, EventDetail, EventFilter, SignalName, Tracker};
//!
//! let page = Document::new("https://fakestoreapi.com/products/1?ref=home");
//! let tracker = Tracker::install(&page)?;
//! page.dispatch(SignalName::AppInitialized, EventDetail::new().with_test_id("chat"));
//!
//! let filter = EventFilter::new().with_test_id("chat");
//! let claimed = tracker.claim(SignalName::AppInitialized.as_str(), &filter)?;
//! assert!(claimed.is_some_and(|occurrence| occurrence.resolved));
//! # Ok::<(), spiffy::TrackerError>(())
//! ```

#![warn(missing_docs)]

mod agent;
mod bridge;
mod browser;
mod buffer;
mod clock;
mod correlator;
mod document;
mod location;
mod mirror;
mod recorder;
mod result;
mod signal;
mod wait;

pub use agent::script as agent_script;
pub use bridge::{BridgeCall, BridgeReply, PageRecord, AGENT_GLOBAL};
pub use browser::BrowserConfig;
#[cfg(feature = "browser")]
pub use browser::{Browser, TrackedPage};
pub use buffer::OccurrenceBuffer;
pub use clock::{system_clock, Clock, FakeClock, SharedClock, SystemClock};
pub use correlator::{NavigationCorrelator, Transition};
pub use document::{DomEvent, Document, Listener, ListenerId, NAVIGATION_EVENT};
pub use location::{normalize_url, NormalizedUrl};
pub use mirror::Mirror;
pub use recorder::{Recorder, Tracker};
pub use result::{TrackerError, TrackerResult};
pub use signal::{
    EventDetail, EventFilter, Occurrence, SignalName, UnknownSignal, DETAIL_TEST_ID, DETAIL_TIME,
    DETAIL_URL,
};
pub use wait::{
    wait_for_event, EventTracker, WaitOptions, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
};
