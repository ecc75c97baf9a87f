//! Event recorder.
//!
//! A [`Tracker`] is installed once per [`Document`]. It subscribes to every
//! catalog signal plus the history navigation notification, buffers the
//! occurrences that belong to the tracked page, and answers buffer queries.
//!
//! ```text
//!   page dispatch ──► capture ──► URL matches tracked page? ──► buffer
//!                                        │ no
//!                                        └──► dropped
//!   popstate ──────► correlator ──► page changed? ──► reset buffer
//! ```
//!
//! All state sits behind one mutex; every operation takes it exactly once, so
//! capture, check, claim, reset and destroy never interleave mid-mutation.

use crate::buffer::OccurrenceBuffer;
use crate::clock::{system_clock, SharedClock};
use crate::correlator::{NavigationCorrelator, Transition};
use crate::document::{lock, DomEvent, ListenerId, NAVIGATION_EVENT};
use crate::location::NormalizedUrl;
use crate::result::{TrackerError, TrackerResult};
use crate::signal::{EventFilter, Occurrence, SignalName};
use crate::Document;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, warn};

/// Recorder state shared between the tracker handle and its listeners
pub struct Recorder {
    buffer: OccurrenceBuffer,
    correlator: NavigationCorrelator,
    subscriptions: Vec<ListenerId>,
    destroyed: bool,
    clock: SharedClock,
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("tracked_url", self.correlator.tracked())
            .field("buffered", &self.buffer.len())
            .field("subscriptions", &self.subscriptions.len())
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

impl Recorder {
    fn new(correlator: NavigationCorrelator, clock: SharedClock) -> Self {
        Self {
            buffer: OccurrenceBuffer::new(),
            correlator,
            subscriptions: Vec::new(),
            destroyed: false,
            clock,
        }
    }

    fn capture(&mut self, event: &DomEvent) {
        if self.destroyed {
            return;
        }

        let origin = event.detail.url().unwrap_or(&event.location);
        let origin = match NormalizedUrl::parse(origin) {
            Ok(url) => url,
            Err(e) => {
                debug!(signal = %event.event_type, error = %e, "dropping signal with unparsable origin");
                return;
            }
        };
        if !self.correlator.is_tracked(&origin) {
            debug!(
                signal = %event.event_type,
                origin = %origin,
                tracked = %self.correlator.tracked(),
                "dropping signal from another page"
            );
            return;
        }

        let mut detail = event.detail.clone();
        let timestamp = detail.time().unwrap_or_else(|| {
            let now = self.clock.now_ms();
            detail.set_time(now);
            now
        });
        let occurrence = self.buffer.push(&event.event_type, detail, timestamp);
        debug!(signal = %occurrence.signal, seq = occurrence.seq, timestamp, "captured signal");
    }

    fn on_navigation(&mut self, href: &str) {
        if self.destroyed {
            return;
        }
        match self.correlator.observe(href) {
            Ok(Transition::Stable) => {}
            Ok(Transition::Changed { from, to }) => {
                debug!(%from, %to, dropped = self.buffer.len(), "page changed; resetting buffer");
                self.buffer.clear();
            }
            Err(e) => warn!(href, error = %e, "navigation check failed; ignoring"),
        }
    }

    fn reset(&mut self, href: &str) {
        self.buffer.clear();
        if let Err(e) = self.correlator.retrack(href) {
            warn!(href, error = %e, "could not retrack location; keeping previous URL");
        }
    }

    fn claim(&mut self, signal: &str, filter: &EventFilter) -> Option<Occurrence> {
        let now = self.clock.now_ms();
        self.buffer.claim(signal, filter, now)
    }
}

/// Handle to the recorder installed in a document
///
/// Clones refer to the same recorder.
#[derive(Clone)]
pub struct Tracker {
    recorder: Arc<Mutex<Recorder>>,
    document: Document,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("recorder", &*lock(&self.recorder))
            .finish_non_exhaustive()
    }
}

impl Tracker {
    /// Install the recorder into `document`, or return the one already there
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidUrl`] if the document location cannot be
    /// normalized
    pub fn install(document: &Document) -> TrackerResult<Self> {
        Self::install_with_clock(document, system_clock())
    }

    /// Same as [`Tracker::install`] with an explicit clock
    ///
    /// The clock is ignored when a tracker is already installed.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidUrl`] if the document location cannot be
    /// normalized
    pub fn install_with_clock(document: &Document, clock: SharedClock) -> TrackerResult<Self> {
        let recorder = document.installed_recorder_or_insert_with(|| {
            let correlator = NavigationCorrelator::from_href(&document.location())?;
            let recorder = Arc::new(Mutex::new(Recorder::new(correlator, clock)));
            let subscriptions = subscribe(document, &recorder);
            lock(&recorder).subscriptions = subscriptions;
            debug!(location = %document.location(), "installed tracker");
            Ok(recorder)
        })?;

        Ok(Self {
            recorder,
            document: document.clone(),
        })
    }

    /// The document this tracker observes
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// First unresolved occurrence of `signal` matching `filter`
    ///
    /// Pure read. Unknown signal names are simply no match.
    #[must_use]
    pub fn check_for_event(&self, signal: &str, filter: &EventFilter) -> Option<Occurrence> {
        lock(&self.recorder)
            .buffer
            .first_match(signal, filter)
            .cloned()
    }

    /// Atomically find and resolve the first matching occurrence
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Destroyed`] after [`Tracker::destroy`]
    pub fn claim(&self, signal: &str, filter: &EventFilter) -> TrackerResult<Option<Occurrence>> {
        let mut recorder = lock(&self.recorder);
        if recorder.destroyed {
            return Err(TrackerError::Destroyed);
        }
        let claimed = recorder.claim(signal, filter);
        if let Some(ref occurrence) = claimed {
            info!(signal, seq = occurrence.seq, "resolved signal");
        }
        Ok(claimed)
    }

    /// Clear the buffer and re-track the current document location
    pub fn reset(&self) {
        let href = self.document.location();
        lock(&self.recorder).reset(&href);
        debug!(location = %href, "tracker reset");
    }

    /// Reset, detach every listener and release the document slot
    ///
    /// The tracker must not be reused; install a new one instead.
    pub fn destroy(&self) {
        let subscriptions = {
            let mut recorder = lock(&self.recorder);
            if recorder.destroyed {
                return;
            }
            recorder.reset(&self.document.location());
            recorder.destroyed = true;
            std::mem::take(&mut recorder.subscriptions)
        };
        for id in subscriptions {
            self.document.remove_listener(id);
        }
        self.document.clear_installed_recorder(&self.recorder);
        debug!("tracker destroyed");
    }

    /// Whether [`Tracker::destroy`] has run
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        lock(&self.recorder).destroyed
    }

    /// URL of the page currently tracked
    #[must_use]
    pub fn tracked_url(&self) -> NormalizedUrl {
        lock(&self.recorder).correlator.tracked().clone()
    }

    /// Total buffered occurrences
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.recorder).buffer.len()
    }

    /// Whether nothing is buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.recorder).buffer.is_empty()
    }

    /// Buffered occurrences of `signal`, resolved or not
    #[must_use]
    pub fn count(&self, signal: &str) -> usize {
        lock(&self.recorder).buffer.count(signal)
    }

    /// Every buffered occurrence in arrival order
    #[must_use]
    pub fn snapshot(&self) -> Vec<Occurrence> {
        lock(&self.recorder).buffer.snapshot()
    }

    /// Whether two handles refer to the same recorder
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.recorder, &other.recorder)
    }
}

fn subscribe(document: &Document, recorder: &Arc<Mutex<Recorder>>) -> Vec<ListenerId> {
    let mut subscriptions: Vec<ListenerId> = SignalName::ALL
        .iter()
        .map(|signal| {
            let weak: Weak<Mutex<Recorder>> = Arc::downgrade(recorder);
            document.add_listener(signal.as_str(), move |event| {
                if let Some(recorder) = weak.upgrade() {
                    lock(&recorder).capture(event);
                }
            })
        })
        .collect();

    let weak = Arc::downgrade(recorder);
    subscriptions.push(document.add_listener(NAVIGATION_EVENT, move |event| {
        if let Some(recorder) = weak.upgrade() {
            lock(&recorder).on_navigation(&event.location);
        }
    }));
    subscriptions
}
