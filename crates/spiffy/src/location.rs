//! Page identity by normalized URL.
//!
//! Two locations belong to the same logical page when they agree on origin and
//! path. Query string and fragment are ignored. Parsing canonicalizes the
//! rest: scheme and host are lowercased and a default port is dropped.

use crate::result::{TrackerError, TrackerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// URL with query and fragment stripped
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    /// Normalize a raw URL
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidUrl`] if `raw` is not an absolute URL
    pub fn parse(raw: &str) -> TrackerResult<Self> {
        let mut url = Url::parse(raw.trim()).map_err(|e| TrackerError::InvalidUrl {
            url: raw.to_string(),
            message: e.to_string(),
        })?;
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self(url.into()))
    }

    /// Normalized form as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a URL to its page identity
///
/// # Errors
///
/// Returns [`TrackerError::InvalidUrl`] if `raw` is not an absolute URL
pub fn normalize_url(raw: &str) -> TrackerResult<NormalizedUrl> {
    NormalizedUrl::parse(raw)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strips_query_and_fragment() {
        let a = normalize_url("https://a.com/x?q=1#h").unwrap();
        let b = normalize_url("https://a.com/x").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "https://a.com/x");
    }

    #[test]
    fn test_fragment_before_query_marker() {
        let url = normalize_url("https://a.com/x#frag?notquery").unwrap();
        assert_eq!(url.as_str(), "https://a.com/x");
    }

    #[test]
    fn test_different_paths_differ() {
        let a = normalize_url("https://a.com/products/1").unwrap();
        let b = normalize_url("https://a.com/products/2").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_bare_origin_gets_root_path() {
        let a = normalize_url("https://a.com").unwrap();
        let b = normalize_url("https://a.com/?x=1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_scheme_host_and_default_port_are_canonical() {
        let a = normalize_url("HTTPS://A.COM:443/x?z").unwrap();
        let b = normalize_url("https://a.com/x").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, normalize_url("https://a.com:8443/x").unwrap());
        assert_ne!(a, normalize_url("https://a.com/X").unwrap());
    }

    #[test]
    fn test_about_blank() {
        assert_eq!(normalize_url("about:blank").unwrap().as_str(), "about:blank");
    }

    #[test]
    fn test_relative_url_is_error() {
        let err = normalize_url("/products/1").unwrap_err();
        assert!(matches!(err, TrackerError::InvalidUrl { .. }));
    }

    #[test]
    fn test_display_and_serde() {
        let url = normalize_url("https://www.saucedemo.com/inventory.html?x").unwrap();
        assert_eq!(url.to_string(), "https://www.saucedemo.com/inventory.html");
        assert_eq!(
            serde_json::to_string(&url).unwrap(),
            "\"https://www.saucedemo.com/inventory.html\""
        );
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            host in "[a-z]{1,10}",
            path in "(/[a-z0-9]{0,8}){0,4}",
            query in proptest::option::of("[a-z0-9=&]{0,12}"),
            fragment in proptest::option::of("[a-z0-9]{0,8}"),
        ) {
            let mut raw = format!("https://{host}.com{path}");
            if let Some(q) = query {
                raw.push('?');
                raw.push_str(&q);
            }
            if let Some(f) = fragment {
                raw.push('#');
                raw.push_str(&f);
            }
            let once = normalize_url(&raw).unwrap();
            let twice = normalize_url(once.as_str()).unwrap();
            prop_assert_eq!(&once, &twice);
            prop_assert!(!once.as_str().contains('?'));
            prop_assert!(!once.as_str().contains('#'));
        }
    }
}
