//! Navigation correlator.
//!
//! Remembers which logical page is being tracked and reports whether a
//! navigation notification moved to a different one.

use crate::location::NormalizedUrl;
use crate::result::TrackerResult;

/// Outcome of observing a navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Same normalized URL; nothing to do
    Stable,
    /// Different page; the buffer must be reset
    Changed {
        /// Previously tracked URL
        from: NormalizedUrl,
        /// Newly tracked URL
        to: NormalizedUrl,
    },
}

impl Transition {
    /// Whether the page changed
    #[must_use]
    pub const fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }
}

/// Tracks the normalized URL of the observed page
#[derive(Debug, Clone)]
pub struct NavigationCorrelator {
    tracked: NormalizedUrl,
}

impl NavigationCorrelator {
    /// Start tracking `tracked`
    #[must_use]
    pub const fn new(tracked: NormalizedUrl) -> Self {
        Self { tracked }
    }

    /// Start tracking a raw URL
    ///
    /// # Errors
    ///
    /// Returns an error if `href` cannot be normalized
    pub fn from_href(href: &str) -> TrackerResult<Self> {
        Ok(Self::new(NormalizedUrl::parse(href)?))
    }

    /// Currently tracked URL
    #[must_use]
    pub const fn tracked(&self) -> &NormalizedUrl {
        &self.tracked
    }

    /// Whether `url` belongs to the tracked page
    #[must_use]
    pub fn is_tracked(&self, url: &NormalizedUrl) -> bool {
        &self.tracked == url
    }

    /// Observe a navigation to `href`
    ///
    /// On failure the tracked URL is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if `href` cannot be normalized
    pub fn observe(&mut self, href: &str) -> TrackerResult<Transition> {
        let next = NormalizedUrl::parse(href)?;
        if next == self.tracked {
            return Ok(Transition::Stable);
        }
        let from = std::mem::replace(&mut self.tracked, next.clone());
        Ok(Transition::Changed { from, to: next })
    }

    /// Unconditionally track `href`
    ///
    /// # Errors
    ///
    /// Returns an error if `href` cannot be normalized; the tracked URL is kept
    pub fn retrack(&mut self, href: &str) -> TrackerResult<()> {
        self.tracked = NormalizedUrl::parse(href)?;
        Ok(())
    }
}
