//! In-process model of the page document the recorder lives in.
//!
//! A [`Document`] owns the current location, an event-listener registry keyed
//! by event type, and the slot that holds the page's single tracker. Handles are
//! cheap to clone and all refer to the same document.
//!
//! The browser path mirrors the real page into a `Document`; unit tests drive
//! one directly.

use crate::recorder::Recorder;
use crate::result::TrackerResult;
use crate::signal::EventDetail;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Event type fired on history navigation
pub const NAVIGATION_EVENT: &str = "popstate";

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Identifier returned by [`Document::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event delivered to listeners
#[derive(Debug, Clone)]
pub struct DomEvent {
    /// Event type (signal name or `popstate`)
    pub event_type: String,
    /// Attached payload
    pub detail: EventDetail,
    /// Document location at dispatch time
    pub location: String,
}

/// Listener callback
pub type Listener = Arc<dyn Fn(&DomEvent) + Send + Sync>;

struct ListenerEntry {
    id: ListenerId,
    event_type: String,
    callback: Listener,
}

struct DocumentInner {
    location: Mutex<String>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_listener: AtomicU64,
    tracker: Mutex<Weak<Mutex<Recorder>>>,
}

/// Handle to a page document
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("location", &self.location())
            .field("listeners", &lock(&self.inner.listeners).len())
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Create a document loaded at `url`
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(DocumentInner {
                location: Mutex::new(url.into()),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
                tracker: Mutex::new(Weak::new()),
            }),
        }
    }

    /// Current `location.href`
    #[must_use]
    pub fn location(&self) -> String {
        lock(&self.inner.location).clone()
    }

    /// Change the location without notifying listeners (`pushState`/`replaceState`)
    pub fn replace_location(&self, url: impl Into<String>) {
        *lock(&self.inner.location) = url.into();
    }

    /// Change the location and fire the navigation notification
    pub fn navigate_history(&self, url: impl Into<String>) {
        self.replace_location(url);
        self.dispatch(NAVIGATION_EVENT, EventDetail::new());
    }

    /// Dispatch an event to every listener registered for its type
    ///
    /// Returns the number of listeners invoked. Callbacks run outside the
    /// registry lock, in registration order.
    pub fn dispatch(&self, event_type: impl AsRef<str>, detail: EventDetail) -> usize {
        let event_type = event_type.as_ref();
        let callbacks: Vec<Listener> = lock(&self.inner.listeners)
            .iter()
            .filter(|entry| entry.event_type == event_type)
            .map(|entry| Arc::clone(&entry.callback))
            .collect();

        let event = DomEvent {
            event_type: event_type.to_string(),
            detail,
            location: self.location(),
        };
        for callback in &callbacks {
            callback(&event);
        }
        callbacks.len()
    }

    /// Register a listener for `event_type`
    pub fn add_listener<F>(&self, event_type: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&DomEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners).push(ListenerEntry {
            id,
            event_type: event_type.into(),
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.inner.listeners);
        let before = listeners.len();
        listeners.retain(|entry| entry.id != id);
        listeners.len() != before
    }

    /// Number of listeners registered for `event_type`
    #[must_use]
    pub fn listener_count(&self, event_type: &str) -> usize {
        lock(&self.inner.listeners)
            .iter()
            .filter(|entry| entry.event_type == event_type)
            .count()
    }

    /// Whether two handles refer to the same document
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Return the installed recorder, or install the one built by `create`
    ///
    /// The slot stays locked while `create` runs so concurrent installs
    /// observe a single recorder.
    pub(crate) fn installed_recorder_or_insert_with<F>(
        &self,
        create: F,
    ) -> TrackerResult<Arc<Mutex<Recorder>>>
    where
        F: FnOnce() -> TrackerResult<Arc<Mutex<Recorder>>>,
    {
        let mut slot = lock(&self.inner.tracker);
        if let Some(existing) = slot.upgrade() {
            return Ok(existing);
        }
        let recorder = create()?;
        *slot = Arc::downgrade(&recorder);
        Ok(recorder)
    }

    pub(crate) fn clear_installed_recorder(&self, recorder: &Arc<Mutex<Recorder>>) {
        let mut slot = lock(&self.inner.tracker);
        if slot.upgrade().is_some_and(|current| Arc::ptr_eq(&current, recorder)) {
            *slot = Weak::new();
        }
    }
}
