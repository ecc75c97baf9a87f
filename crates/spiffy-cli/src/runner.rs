//! Merchant verification runner

use crate::config::VerifyConfig;
use crate::error::CliResult;
use crate::merchants::Merchant;
use crate::output::ProgressReporter;
use crate::retry::{wait_with_retry, RetryOutcome, RetryPolicy};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use spiffy::{EventTracker, SignalName, TrackerResult, WaitOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Signals every merchant page must emit, in order
pub const REQUIRED_SIGNALS: [SignalName; 2] = [
    SignalName::AppInitialized,
    SignalName::ShadowDomContainerReady,
];

/// Opens tracked pages for the runner
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// A loaded page with its tracker in place
    type Page: EventTracker + 'static;

    /// Create a blank page, ready to be tracked
    async fn new_page(&self) -> TrackerResult<Self::Page>;

    /// Load `url` in `page` and start tracking it
    async fn navigate(&self, page: &Self::Page, url: &str) -> TrackerResult<()>;

    /// Capture `page` as PNG bytes
    async fn screenshot(&self, page: &Self::Page) -> TrackerResult<Vec<u8>>;

    /// Release a page
    async fn close(&self, page: Self::Page) -> TrackerResult<()>;

    /// Navigate a fresh page to `url`
    ///
    /// The page is closed again when navigation fails.
    async fn open(&self, url: &str) -> TrackerResult<Self::Page> {
        let page = self.new_page().await?;
        match self.navigate(&page, url).await {
            Ok(()) => Ok(page),
            Err(e) => {
                if let Err(close_err) = self.close(page).await {
                    debug!(url, error = %close_err, "page close after failed navigation");
                }
                Err(e)
            }
        }
    }
}

mod browser_driver {
    use super::PageDriver;
    use async_trait::async_trait;
    use spiffy::{Browser, TrackedPage, TrackerResult};

    /// Drives pages in a real browser
    #[derive(Debug)]
    pub struct BrowserDriver {
        browser: Browser,
    }

    impl BrowserDriver {
        /// Wrap a started browser
        #[must_use]
        pub const fn new(browser: Browser) -> Self {
            Self { browser }
        }

        /// Shut the browser down
        pub async fn shutdown(self) -> TrackerResult<()> {
            self.browser.close().await
        }
    }

    #[async_trait]
    impl PageDriver for BrowserDriver {
        type Page = TrackedPage;

        async fn new_page(&self) -> TrackerResult<TrackedPage> {
            self.browser.new_page().await
        }

        async fn navigate(&self, page: &TrackedPage, url: &str) -> TrackerResult<()> {
            page.goto(url).await
        }

        async fn screenshot(&self, page: &TrackedPage) -> TrackerResult<Vec<u8>> {
            page.screenshot().await
        }

        async fn close(&self, page: TrackedPage) -> TrackerResult<()> {
            page.close().await
        }
    }
}

pub use browser_driver::BrowserDriver;

/// One merchant page to verify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyCase {
    /// Position in the run, zero-based
    pub index: usize,
    /// Merchant short name or page host
    pub label: String,
    /// Absolute page URL
    pub url: String,
    /// Signals to wait for, in order
    pub signals: Vec<SignalName>,
}

impl VerifyCase {
    /// Case for a catalog merchant, visiting its first page
    #[must_use]
    pub fn for_merchant(index: usize, merchant: Merchant) -> Self {
        Self {
            index,
            label: merchant.short_name().to_string(),
            url: merchant.first_url().to_string(),
            signals: REQUIRED_SIGNALS.to_vec(),
        }
    }

    /// Case for an arbitrary page
    #[must_use]
    pub fn for_url(index: usize, label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
            url: url.into(),
            signals: REQUIRED_SIGNALS.to_vec(),
        }
    }

    /// Display name used in reports
    #[must_use]
    pub fn name(&self) -> String {
        format!("({}) Verify events on merchant: {}", self.index + 1, self.label)
    }

    /// File name for the failure screenshot of run `run` (zero-based)
    #[must_use]
    pub fn screenshot_file(&self, run: u32) -> String {
        let slug: String = self
            .label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        format!("{:02}-{slug}-run{}.png", self.index + 1, run + 1)
    }
}

/// Build cases for `merchants`, or for the whole catalog when empty
#[must_use]
pub fn merchant_cases(merchants: &[Merchant]) -> Vec<VerifyCase> {
    let selected: Vec<Merchant> = if merchants.is_empty() {
        Merchant::ALL.to_vec()
    } else {
        let mut unique = Vec::with_capacity(merchants.len());
        for merchant in merchants {
            if !unique.contains(merchant) {
                unique.push(*merchant);
            }
        }
        unique
    };
    selected
        .into_iter()
        .enumerate()
        .map(|(index, merchant)| VerifyCase::for_merchant(index, merchant))
        .collect()
}

/// Outcome of one signal within a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalOutcome {
    /// Signal name
    pub signal: String,
    /// Whether it was received
    pub received: bool,
    /// Wait attempts made
    pub attempts: u32,
    /// Last wait error
    pub error: Option<String>,
}

impl From<&RetryOutcome> for SignalOutcome {
    fn from(outcome: &RetryOutcome) -> Self {
        Self {
            signal: outcome.signal.clone(),
            received: outcome.is_received(),
            attempts: outcome.attempts,
            error: outcome.last_error.clone(),
        }
    }
}

/// Test execution result for one merchant case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    /// Position in the run, zero-based
    pub index: usize,
    /// Test name
    pub name: String,
    /// Merchant short name or page host
    pub merchant: String,
    /// Page URL
    pub url: String,
    /// Whether the test passed
    pub passed: bool,
    /// Error message if failed
    pub error: Option<String>,
    /// Duration of the final run
    pub duration_ms: u64,
    /// Runs made, including reruns
    pub runs: u32,
    /// Per-signal outcomes of the final run
    pub signals: Vec<SignalOutcome>,
    /// Screenshot taken when the final run failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
}

impl TestResult {
    fn new(case: &VerifyCase) -> Self {
        Self {
            index: case.index,
            name: case.name(),
            merchant: case.label.clone(),
            url: case.url.clone(),
            passed: false,
            error: None,
            duration_ms: 0,
            runs: 0,
            signals: Vec::new(),
            screenshot: None,
        }
    }
}

/// Aggregated test results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestResults {
    /// Individual test results, in case order
    pub results: Vec<TestResult>,
    /// Total duration
    pub duration_ms: u64,
    /// Cases not run because of fail-fast
    pub skipped: usize,
}

impl TestResults {
    /// Create new empty results
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a test result
    pub fn add(&mut self, result: TestResult) {
        self.results.push(result);
    }

    /// Get number of passed tests
    #[must_use]
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Get number of failed tests
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Get number of tests run
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Check if all tests passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Get failed tests
    #[must_use]
    pub fn failures(&self) -> Vec<&TestResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }
}

/// Runs merchant cases against a page driver
#[derive(Debug)]
pub struct TestRunner<D> {
    config: VerifyConfig,
    reporter: ProgressReporter,
    driver: D,
}

impl<D: PageDriver> TestRunner<D> {
    /// Create a new test runner
    #[must_use]
    pub fn new(config: VerifyConfig, driver: D) -> Self {
        let reporter =
            ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
        Self {
            config,
            reporter,
            driver,
        }
    }

    /// Wait options applied to every signal
    #[must_use]
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::new().with_timeout(self.config.timeout_ms)
    }

    /// Retry policy applied to every signal
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.retries, self.config.backoff_ms)
    }

    /// Run `cases`, up to `jobs` pages at a time
    ///
    /// With fail-fast, no new case starts after a failure; cases already
    /// running finish and release their pages.
    ///
    /// # Errors
    ///
    /// Reserved for setup failures; case failures are reported in the results
    pub async fn run(&mut self, cases: Vec<VerifyCase>) -> CliResult<TestResults> {
        let start = Instant::now();
        let mut results = TestResults::new();
        let total = cases.len();

        if cases.is_empty() {
            self.reporter.warning("No merchants selected");
            return Ok(results);
        }

        let jobs = self.config.effective_jobs().min(total).max(1);
        self.reporter.header("Verifying merchant signals");
        if self.config.verbosity.is_verbose() {
            self.reporter.info(&format!(
                "{jobs} page(s) at a time, {} wait attempt(s) of {}ms per signal",
                self.config.retries, self.config.timeout_ms
            ));
        }
        self.reporter.start_progress(total as u64, "Starting...");
        info!(cases = total, jobs, "starting verification run");

        let settings = CaseSettings {
            options: self.wait_options(),
            policy: self.retry_policy(),
            case_retries: self.config.case_retries,
            artifacts_dir: self.config.artifacts_dir.clone(),
        };
        let fail_fast = self.config.fail_fast;
        let stopped = AtomicBool::new(false);
        let (driver, reporter, settings, stopped) =
            (&self.driver, &self.reporter, &settings, &stopped);

        let mut pending = stream::iter(cases)
            .map(|case| async move {
                if stopped.load(Ordering::SeqCst) {
                    debug!(merchant = %case.label, "skipped after failure");
                    return None;
                }
                Some(run_case(driver, &case, settings, reporter).await)
            })
            .buffer_unordered(jobs);

        while let Some(outcome) = pending.next().await {
            let Some(result) = outcome else {
                continue;
            };
            reporter.increment(1);
            if result.passed {
                reporter.success(&result.name);
            } else {
                reporter.failure(&format!(
                    "{}: {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                ));
                if fail_fast && !stopped.swap(true, Ordering::SeqCst) {
                    info!(merchant = %result.merchant, "fail-fast: no further cases will start");
                }
            }
            results.add(result);
        }
        drop(pending);

        results.results.sort_by_key(|r| r.index);
        results.skipped = total - results.total();
        results.duration_ms = elapsed_ms(start);

        self.reporter.finish();
        self.reporter.summary(
            results.passed(),
            results.failed(),
            results.skipped,
            Duration::from_millis(results.duration_ms),
        );

        Ok(results)
    }

    /// Get the reporter (for testing)
    #[must_use]
    pub const fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    /// Get the driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Give the driver back
    #[must_use]
    pub fn into_driver(self) -> D {
        self.driver
    }
}

/// Per-case settings shared by every run
#[derive(Debug)]
struct CaseSettings {
    options: WaitOptions,
    policy: RetryPolicy,
    case_retries: u32,
    artifacts_dir: PathBuf,
}

async fn run_case<D: PageDriver>(
    driver: &D,
    case: &VerifyCase,
    settings: &CaseSettings,
    reporter: &ProgressReporter,
) -> TestResult {
    let mut result = TestResult::new(case);
    let case_retries = settings.case_retries;
    for run in 0..=case_retries {
        if run > 0 {
            reporter.warning(&format!("Retrying {} (rerun {run}/{case_retries})", case.name()));
        }
        reporter.set_message(&case.label);
        result = run_once(driver, case, settings, run, reporter).await;
        result.runs = run + 1;
        if result.passed {
            break;
        }
    }
    result
}

async fn run_once<D: PageDriver>(
    driver: &D,
    case: &VerifyCase,
    settings: &CaseSettings,
    run: u32,
    reporter: &ProgressReporter,
) -> TestResult {
    let start = Instant::now();
    let mut result = TestResult::new(case);
    info!(merchant = %case.label, url = %case.url, "visiting merchant page");

    let page = match driver.open(&case.url).await {
        Ok(page) => page,
        Err(e) => {
            warn!(merchant = %case.label, error = %e, "could not open merchant page");
            result.error = Some(e.to_string());
            result.duration_ms = elapsed_ms(start);
            return result;
        }
    };

    result.passed = true;
    for signal in &case.signals {
        let outcome =
            wait_with_retry(&page, signal.as_str(), &settings.options, &settings.policy).await;
        result.signals.push(SignalOutcome::from(&outcome));
        if let Some(message) = outcome.failure_message() {
            result.passed = false;
            result.error = Some(message);
            break;
        }
    }

    if result.passed {
        info!(merchant = %case.label, "all required signals received");
    } else {
        let path = settings.artifacts_dir.join(case.screenshot_file(run));
        result.screenshot = save_screenshot(driver, &page, &path).await;
        if let Some(ref path) = result.screenshot {
            reporter.info(&format!("Screenshot saved: {}", path.display()));
        }
    }

    if let Err(e) = driver.close(page).await {
        debug!(merchant = %case.label, error = %e, "page close failed");
    }
    result.duration_ms = elapsed_ms(start);
    result
}

/// Capture `page` into `path`; failures are logged and yield `None`
async fn save_screenshot<D: PageDriver>(driver: &D, page: &D::Page, path: &Path) -> Option<PathBuf> {
    let png = match driver.screenshot(page).await {
        Ok(png) => png,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failure screenshot not captured");
            return None;
        }
    };
    match write_artifact(path, &png).await {
        Ok(()) => {
            info!(path = %path.display(), bytes = png.len(), "saved failure screenshot");
            Some(path.to_path_buf())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failure screenshot not written");
            None
        }
    }
}

async fn write_artifact(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, bytes).await
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
