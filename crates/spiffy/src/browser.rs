//! Browser control for live signal verification.
//!
//! With the `browser` feature, pages are driven over the Chrome `DevTools`
//! Protocol through chromiumoxide. Every page gets the agent registered as a
//! new-document script, so it is in place before any page script runs. Each
//! check or claim first drains the agent's log into a local [`Mirror`].
//!
//! [`Mirror`]: crate::mirror::Mirror

/// Browser configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Attach to a running browser instead of launching one
    pub ws_endpoint: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            chromium_path: None,
            sandbox: true,
            ws_endpoint: None,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Connect to an existing browser at `ws_endpoint`
    #[must_use]
    pub fn with_ws_endpoint(mut self, ws_endpoint: impl Into<String>) -> Self {
        self.ws_endpoint = Some(ws_endpoint.into());
        self
    }
}

// ============================================================================
// CDP implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
#[allow(clippy::significant_drop_tightening, clippy::missing_errors_doc)]
mod cdp {
    use super::BrowserConfig;
    use crate::agent;
    use crate::bridge::{BridgeCall, BridgeReply};
    use crate::clock::{system_clock, SharedClock};
    use crate::mirror::Mirror;
    use crate::result::{TrackerError, TrackerResult};
    use crate::signal::{EventFilter, Occurrence};
    use crate::wait::EventTracker;
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use base64::Engine;
    use chromiumoxide::cdp::browser_protocol::page::{
        AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, CaptureScreenshotParams,
    };
    use chromiumoxide::handler::Handler;
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tracing::{debug, info, warn};

    /// Browser instance with real CDP connection
    #[derive(Debug)]
    pub struct Browser {
        config: BrowserConfig,
        inner: Arc<Mutex<CdpBrowser>>,
        handle: tokio::task::JoinHandle<()>,
    }

    impl Browser {
        /// Launch a browser, or connect when `config.ws_endpoint` is set
        ///
        /// # Errors
        ///
        /// Returns error if browser cannot be launched or reached
        pub async fn start(config: BrowserConfig) -> TrackerResult<Self> {
            match config.ws_endpoint.clone() {
                Some(ws) => Self::connect(config, &ws).await,
                None => Self::launch(config).await,
            }
        }

        /// Launch a new browser instance
        ///
        /// # Errors
        ///
        /// Returns error if browser cannot be launched
        pub async fn launch(config: BrowserConfig) -> TrackerResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.viewport_width, config.viewport_height);

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder
                .build()
                .map_err(|message| TrackerError::BrowserLaunch { message })?;

            let (browser, handler) = CdpBrowser::launch(cdp_config).await.map_err(|e| {
                TrackerError::BrowserLaunch {
                    message: e.to_string(),
                }
            })?;
            info!(headless = config.headless, "launched browser");

            Ok(Self::with_handler(config, browser, handler))
        }

        /// Connect to a running browser's `DevTools` websocket
        ///
        /// # Errors
        ///
        /// Returns error if the endpoint cannot be reached
        pub async fn connect(config: BrowserConfig, ws_endpoint: &str) -> TrackerResult<Self> {
            let (browser, handler) = CdpBrowser::connect(ws_endpoint).await.map_err(|e| {
                TrackerError::BrowserLaunch {
                    message: format!("{ws_endpoint}: {e}"),
                }
            })?;
            info!(ws_endpoint, "connected to browser");

            Ok(Self::with_handler(config, browser, handler))
        }

        fn with_handler(config: BrowserConfig, browser: CdpBrowser, mut handler: Handler) -> Self {
            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });
            Self {
                config,
                inner: Arc::new(Mutex::new(browser)),
                handle,
            }
        }

        /// Open a blank page with the agent registered
        ///
        /// # Errors
        ///
        /// Returns error if page cannot be created or prepared
        pub async fn new_page(&self) -> TrackerResult<TrackedPage> {
            let browser = self.inner.lock().await;
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| TrackerError::Page {
                    message: e.to_string(),
                })?;

            page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
                agent::script(),
            ))
            .await
            .map_err(|e| TrackerError::Page {
                message: format!("agent registration failed: {e}"),
            })?;

            Ok(TrackedPage {
                page,
                mirror: Mutex::new(None),
                clock: system_clock(),
            })
        }

        /// Get the browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }

        /// Close the browser
        pub async fn close(self) -> TrackerResult<()> {
            let mut browser = self.inner.lock().await;
            let closed = browser.close().await;
            self.handle.abort();
            closed.map_err(|e| TrackerError::BrowserLaunch {
                message: e.to_string(),
            })?;
            Ok(())
        }
    }

    /// A browser page whose signals are recorded by a tracker
    #[derive(Debug)]
    pub struct TrackedPage {
        page: CdpPage,
        mirror: Mutex<Option<Mirror>>,
        clock: SharedClock,
    }

    impl TrackedPage {
        /// Navigate to `url` and start tracking the loaded page
        ///
        /// Any previous tracker is destroyed; signals from the new page that
        /// fired during load are kept.
        ///
        /// # Errors
        ///
        /// Returns error if navigation fails or the page cannot be tracked
        pub async fn goto(&self, url: &str) -> TrackerResult<()> {
            let mut mirror = self.mirror.lock().await;
            if let Some(old) = mirror.take() {
                old.tracker().destroy();
            }

            self.page
                .goto(url)
                .await
                .map_err(|e| TrackerError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

            // Covers documents that existed before registration.
            self.inject_agent().await?;

            let href = self.call(BridgeCall::Location).await?.into_location()?;
            debug!(url, href = %href, "page loaded; tracking");
            *mirror = Some(Mirror::new(&href, Arc::clone(&self.clock))?);
            Ok(())
        }

        /// Current page URL as reported by the agent
        ///
        /// # Errors
        ///
        /// Returns error if the bridge call fails
        pub async fn location(&self) -> TrackerResult<String> {
            self.call(BridgeCall::Location).await?.into_location()
        }

        /// Capture the viewport as PNG bytes
        ///
        /// # Errors
        ///
        /// Returns error if the capture fails or returns undecodable data
        pub async fn screenshot(&self) -> TrackerResult<Vec<u8>> {
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            let shot = self
                .page
                .execute(params)
                .await
                .map_err(|e| TrackerError::Screenshot {
                    message: e.to_string(),
                })?;
            base64::engine::general_purpose::STANDARD
                .decode(&shot.data)
                .map_err(|e| TrackerError::Screenshot {
                    message: e.to_string(),
                })
        }

        /// Destroy the agent and close the page
        pub async fn close(self) -> TrackerResult<()> {
            EventTracker::destroy(&self).await?;
            self.page.close().await.map_err(|e| TrackerError::Page {
                message: e.to_string(),
            })?;
            Ok(())
        }

        async fn inject_agent(&self) -> TrackerResult<()> {
            self.page
                .evaluate(agent::script())
                .await
                .map_err(|e| TrackerError::bridge(format!("agent injection failed: {e}")))?;
            Ok(())
        }

        async fn call(&self, call: BridgeCall) -> TrackerResult<BridgeReply> {
            let raw: String = self
                .page
                .evaluate(call.expression()?)
                .await
                .map_err(|e| TrackerError::bridge(e.to_string()))?
                .into_value()
                .map_err(|e| TrackerError::bridge(format!("non-string reply: {e}")))?;
            BridgeReply::parse(&raw)
        }

        /// Drain the page log into the mirror and run `f` on it
        async fn with_synced<T>(
            &self,
            f: impl FnOnce(&Mirror) -> TrackerResult<T> + Send,
        ) -> TrackerResult<T> {
            let mut guard = self.mirror.lock().await;
            let mirror = guard.as_mut().ok_or_else(|| TrackerError::Page {
                message: "no page loaded; call goto first".to_string(),
            })?;
            if mirror.tracker().is_destroyed() {
                return Err(TrackerError::Destroyed);
            }
            let records = self.call(BridgeCall::Drain).await?.into_records()?;
            mirror.apply(records);
            f(mirror)
        }
    }

    #[async_trait]
    impl EventTracker for TrackedPage {
        async fn check_for_event(
            &self,
            signal: &str,
            filter: &EventFilter,
        ) -> TrackerResult<Option<Occurrence>> {
            self.with_synced(|mirror| Ok(mirror.tracker().check_for_event(signal, filter)))
                .await
        }

        async fn claim_event(
            &self,
            signal: &str,
            filter: &EventFilter,
        ) -> TrackerResult<Option<Occurrence>> {
            self.with_synced(|mirror| mirror.tracker().claim(signal, filter))
                .await
        }

        async fn reset(&self) -> TrackerResult<()> {
            let href = self.location().await?;
            self.with_synced(|mirror| {
                mirror.document().replace_location(href);
                mirror.tracker().reset();
                Ok(())
            })
            .await
        }

        async fn destroy(&self) -> TrackerResult<()> {
            if let Some(mirror) = self.mirror.lock().await.as_ref() {
                mirror.tracker().destroy();
            }
            match self.call(BridgeCall::Destroy).await {
                Ok(reply) => {
                    reply.into_destroyed()?;
                    Ok(())
                }
                Err(TrackerError::AgentMissing) => Ok(()),
                Err(e) => {
                    warn!(error = %e, "agent teardown failed");
                    Err(e)
                }
            }
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{Browser, TrackedPage};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_config_default() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert!(config.sandbox);
        assert_eq!((config.viewport_width, config.viewport_height), (1280, 720));
        assert!(config.chromium_path.is_none());
        assert!(config.ws_endpoint.is_none());
    }

    #[test]
    fn test_browser_config_builder() {
        let config = BrowserConfig::default()
            .with_headless(false)
            .with_viewport(800, 600)
            .with_no_sandbox()
            .with_chromium_path("/usr/bin/chromium")
            .with_ws_endpoint("ws://127.0.0.1:9222/devtools/browser/abc");
        assert!(!config.headless);
        assert!(!config.sandbox);
        assert_eq!(config.viewport_width, 800);
        assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
        assert_eq!(
            config.ws_endpoint.as_deref(),
            Some("ws://127.0.0.1:9222/devtools/browser/abc")
        );
    }
}
