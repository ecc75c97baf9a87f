//! Local mirror of a browser page.
//!
//! Replays drained [`PageRecord`]s onto an in-process [`Document`] so the
//! installed [`Tracker`] sees exactly what the page saw, in the same order.

use crate::bridge::PageRecord;
use crate::clock::SharedClock;
use crate::recorder::Tracker;
use crate::result::TrackerResult;
use crate::Document;
use tracing::{debug, trace, warn};

/// Mirror document plus the tracker installed in it
#[derive(Debug, Clone)]
pub struct Mirror {
    document: Document,
    tracker: Tracker,
    last_seq: Option<u64>,
    stale: usize,
}

impl Mirror {
    /// Start mirroring a page loaded at `href`
    ///
    /// # Errors
    ///
    /// Returns an error if `href` cannot be tracked
    pub fn new(href: &str, clock: SharedClock) -> TrackerResult<Self> {
        let document = Document::new(href);
        let tracker = Tracker::install_with_clock(&document, clock)?;
        Ok(Self {
            document,
            tracker,
            last_seq: None,
            stale: 0,
        })
    }

    /// The mirror document
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// The tracker recording into the mirror
    #[must_use]
    pub const fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Records skipped because their sequence number went backwards
    #[must_use]
    pub const fn stale_records(&self) -> usize {
        self.stale
    }

    /// Replay records in sequence order
    ///
    /// Records at or below the last applied sequence number are skipped, so a
    /// batch replayed twice has no further effect. Returns how many were
    /// applied.
    pub fn apply(&mut self, records: Vec<PageRecord>) -> usize {
        let mut records = records;
        records.sort_by_key(PageRecord::seq);

        let mut applied = 0;
        let mut skipped = 0;
        for record in records {
            if self.last_seq.is_some_and(|last| record.seq() <= last) {
                trace!(seq = record.seq(), "skipping replayed record");
                skipped += 1;
                continue;
            }
            self.last_seq = Some(record.seq());
            match record {
                PageRecord::Signal {
                    name, href, detail, ..
                } => {
                    self.document.replace_location(href);
                    self.document.dispatch(&name, detail);
                }
                PageRecord::Navigation { href, .. } => {
                    self.document.navigate_history(href);
                }
            }
            applied += 1;
        }
        if applied > 0 {
            debug!(applied, buffered = self.tracker.len(), "mirrored page records");
        }
        if skipped > 0 {
            self.stale += skipped;
            // A fresh agent numbers from zero again after a full reload.
            warn!(
                skipped,
                last_seq = ?self.last_seq,
                location = %self.document.location(),
                "page records went backwards; the page probably reloaded outside goto"
            );
        }
        applied
    }
}
