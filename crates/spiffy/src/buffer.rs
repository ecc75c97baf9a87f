//! Occurrence buffer: signal name to insertion-ordered occurrences.

use crate::signal::{EventDetail, EventFilter, Occurrence};
use std::collections::HashMap;

/// Per-signal occurrence storage owned by the recorder
#[derive(Debug, Default)]
pub struct OccurrenceBuffer {
    by_signal: HashMap<String, Vec<Occurrence>>,
    next_seq: u64,
}

impl OccurrenceBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an unresolved occurrence and return a copy of it
    pub fn push(&mut self, signal: &str, detail: EventDetail, timestamp: i64) -> Occurrence {
        let occurrence = Occurrence::new(self.next_seq, signal, detail, timestamp);
        self.next_seq += 1;
        self.by_signal
            .entry(signal.to_string())
            .or_default()
            .push(occurrence.clone());
        occurrence
    }

    /// First unresolved occurrence of `signal` matching `filter`, in insertion order
    #[must_use]
    pub fn first_match(&self, signal: &str, filter: &EventFilter) -> Option<&Occurrence> {
        self.by_signal
            .get(signal)?
            .iter()
            .find(|occurrence| filter.matches(occurrence))
    }

    /// Resolve the first match and return it
    pub fn claim(&mut self, signal: &str, filter: &EventFilter, now_ms: i64) -> Option<Occurrence> {
        let occurrence = self
            .by_signal
            .get_mut(signal)?
            .iter_mut()
            .find(|occurrence| filter.matches(occurrence))?;
        occurrence.resolve(now_ms);
        Some(occurrence.clone())
    }

    /// Drop every occurrence of every signal
    pub fn clear(&mut self) {
        self.by_signal.clear();
    }

    /// Total number of buffered occurrences
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_signal.values().map(Vec::len).sum()
    }

    /// Whether nothing is buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_signal.values().all(Vec::is_empty)
    }

    /// Number of occurrences buffered for `signal`, resolved or not
    #[must_use]
    pub fn count(&self, signal: &str) -> usize {
        self.by_signal.get(signal).map_or(0, Vec::len)
    }

    /// All occurrences ordered by insertion
    #[must_use]
    pub fn snapshot(&self) -> Vec<Occurrence> {
        let mut all: Vec<Occurrence> = self.by_signal.values().flatten().cloned().collect();
        all.sort_by_key(|occurrence| occurrence.seq);
        all
    }
}
