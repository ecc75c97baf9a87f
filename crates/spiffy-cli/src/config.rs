//! CLI configuration
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! the environment (optionally seeded from a `.env` file), then command-line
//! flags.

use crate::error::{CliError, CliResult};
use crate::report::ReportFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

/// Base URL used to resolve relative page paths
pub const ENV_BASE_URL: &str = "SPIFFY_BASE_URL";
/// Deployment environment name
pub const ENV_ENVIRONMENT: &str = "SPIFFY_ENV";
/// `DevTools` websocket of an already running browser
pub const ENV_BROWSER_WS: &str = "SPIFFY_BROWSER_WS";
/// Set by CI systems
pub const ENV_CI: &str = "CI";

/// Default base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
/// Default wait timeout per signal
pub const DEFAULT_SIGNAL_TIMEOUT_MS: u64 = 15_000;
/// Default wait attempts per signal
pub const DEFAULT_WAIT_ATTEMPTS: u32 = 3;
/// Default pause between wait attempts
pub const DEFAULT_BACKOFF_MS: u64 = 1_000;
/// Case reruns on CI
pub const CI_CASE_RETRIES: u32 = 2;
/// Default directory for failure screenshots
pub const DEFAULT_ARTIFACTS_DIR: &str = "test-results";
/// Default browser viewport, width by height
pub const DEFAULT_VIEWPORT: (u32, u32) = (1280, 720);

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - minimal output
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Map `-q` and the `-v` count to a level
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Default log filter directive when `RUST_LOG` is unset
    #[must_use]
    pub const fn log_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info,spiffy=info,spiffy_verify=info",
            Self::Debug => "debug",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => console::Term::stderr().features().colors_supported(),
        }
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    Development,
    /// Automated test runs
    #[default]
    Test,
    /// Production checks
    Production,
}

impl Environment {
    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "development" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" => Ok(Self::Production),
            other => Err(CliError::config(format!(
                "{ENV_ENVIRONMENT} must be one of development, test, production (got {other:?})"
            ))),
        }
    }
}

/// Load a `.env` file into the process environment
///
/// Without an explicit path, `.env` in the working directory is used; a
/// missing default file is fine. Existing variables are never overwritten.
///
/// # Errors
///
/// Returns a configuration error if an explicit file is missing or any file
/// cannot be parsed
pub fn load_dotenv(path: Option<&Path>) -> CliResult<Option<PathBuf>> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() && path.is_none() => Ok(None),
        Err(e) => Err(CliError::config(format!("failed to load .env: {e}"))),
    }
}

/// Verification run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Base URL for relative page paths, always a valid absolute URL
    pub base_url: String,
    /// Deployment environment
    pub environment: Environment,
    /// Running under CI
    pub ci: bool,
    /// Run the browser headless
    pub headless: bool,
    /// Wait timeout per signal attempt
    pub timeout_ms: u64,
    /// Wait attempts per signal
    pub retries: u32,
    /// Pause between wait attempts
    pub backoff_ms: u64,
    /// Reruns of a failed merchant case
    pub case_retries: u32,
    /// Concurrent pages (0 = auto-detect)
    pub jobs: usize,
    /// Report format
    pub format: ReportFormat,
    /// Report destination (stdout when unset)
    pub output: Option<PathBuf>,
    /// Attach to this browser instead of launching one
    pub ws_endpoint: Option<String>,
    /// Stop after the first failed case
    pub fail_fast: bool,
    /// Where failure screenshots are written
    pub artifacts_dir: PathBuf,
    /// Chromium binary (auto-detected when unset)
    pub chromium_path: Option<String>,
    /// Browser viewport, width by height
    pub viewport: (u32, u32),
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            environment: Environment::Test,
            ci: false,
            headless: true,
            timeout_ms: DEFAULT_SIGNAL_TIMEOUT_MS,
            retries: DEFAULT_WAIT_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
            case_retries: 0,
            jobs: 0,
            format: ReportFormat::List,
            output: None,
            ws_endpoint: None,
            fail_fast: false,
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            chromium_path: None,
            viewport: DEFAULT_VIEWPORT,
            verbosity: Verbosity::Normal,
            color: ColorChoice::Auto,
        }
    }
}

impl VerifyConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with the process environment
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid variables
    pub fn from_env() -> CliResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with variables from `lookup`
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid variables
    pub fn from_lookup<F>(lookup: F) -> CliResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            let url = Url::parse(raw.trim())
                .map_err(|e| CliError::config(format!("{ENV_BASE_URL} {raw:?}: {e}")))?;
            config.base_url = url.into();
        }
        if let Some(raw) = lookup(ENV_ENVIRONMENT).filter(|v| !v.trim().is_empty()) {
            config.environment = raw.parse()?;
        }
        if let Some(ws) = lookup(ENV_BROWSER_WS).filter(|v| !v.trim().is_empty()) {
            config.ws_endpoint = Some(ws.trim().to_string());
        }
        if lookup(ENV_CI).is_some_and(|v| is_truthy(&v)) {
            config = config.with_ci();
        }

        Ok(config)
    }

    /// Apply CI defaults: headless, case reruns, one page at a time
    #[must_use]
    pub fn with_ci(mut self) -> Self {
        self.ci = true;
        self.headless = true;
        self.case_retries = CI_CASE_RETRIES;
        self.jobs = 1;
        self
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set wait timeout per signal attempt
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set wait attempts per signal
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set pause between wait attempts
    #[must_use]
    pub const fn with_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.backoff_ms = backoff_ms;
        self
    }

    /// Set reruns of a failed case
    #[must_use]
    pub const fn with_case_retries(mut self, case_retries: u32) -> Self {
        self.case_retries = case_retries;
        self
    }

    /// Set parallel jobs
    #[must_use]
    pub const fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Set report format
    #[must_use]
    pub const fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    /// Set report destination
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Attach to a running browser
    #[must_use]
    pub fn with_ws_endpoint(mut self, ws_endpoint: impl Into<String>) -> Self {
        self.ws_endpoint = Some(ws_endpoint.into());
        self
    }

    /// Set fail fast
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Set the failure screenshot directory
    #[must_use]
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    /// Use this Chromium binary
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Set the browser viewport
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    /// Resolve a page reference against the base URL
    ///
    /// Absolute URLs are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an invalid-argument error if the reference cannot be joined
    pub fn resolve_url(&self, reference: &str) -> CliResult<Url> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| CliError::config(format!("base URL {:?}: {e}", self.base_url)))?;
        base.join(reference)
            .map_err(|e| CliError::invalid_argument(format!("page {reference:?}: {e}")))
    }

    /// Get effective number of parallel jobs
    #[must_use]
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        } else {
            self.jobs
        }
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "no")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_from_flags() {
            assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
            assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
            assert_eq!(Verbosity::from_flags(false, 3), Verbosity::Debug);
            assert_eq!(Verbosity::from_flags(true, 2), Verbosity::Quiet);
        }

        #[test]
        fn test_predicates() {
            assert!(Verbosity::Quiet.is_quiet());
            assert!(!Verbosity::Normal.is_verbose());
            assert!(Verbosity::Debug.is_verbose());
        }

        #[test]
        fn test_log_directive() {
            assert_eq!(Verbosity::Quiet.log_directive(), "error");
            assert_eq!(Verbosity::Debug.log_directive(), "debug");
        }
    }

    mod color_tests {
        use super::*;

        #[test]
        fn test_explicit_choices() {
            assert!(ColorChoice::Always.should_color());
            assert!(!ColorChoice::Never.should_color());
            assert_eq!(ColorChoice::default(), ColorChoice::Auto);
        }
    }

    mod environment_tests {
        use super::*;

        #[test]
        fn test_parse() {
            assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
            assert_eq!(" test ".parse::<Environment>().unwrap(), Environment::Test);
            assert!("staging".parse::<Environment>().is_err());
        }

        #[test]
        fn test_display() {
            assert_eq!(Environment::Development.to_string(), "development");
        }
    }

    mod verify_config_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = VerifyConfig::from_lookup(lookup(&[])).unwrap();
            assert_eq!(config.base_url, "http://localhost:3000");
            assert_eq!(config.environment, Environment::Test);
            assert_eq!(config.timeout_ms, 15_000);
            assert_eq!(config.retries, 3);
            assert_eq!(config.backoff_ms, 1_000);
            assert_eq!(config.case_retries, 0);
            assert!(!config.ci);
            assert!(config.headless);
            assert_eq!(config.format, ReportFormat::List);
            assert_eq!(config.artifacts_dir, Path::new("test-results"));
            assert_eq!(config.viewport, (1280, 720));
            assert!(config.chromium_path.is_none());
        }

        #[test]
        fn test_environment_overrides() {
            let config = VerifyConfig::from_lookup(lookup(&[
                (ENV_BASE_URL, "https://shop.example.com/app/"),
                (ENV_ENVIRONMENT, "production"),
                (ENV_BROWSER_WS, "ws://127.0.0.1:9222/devtools/browser/x"),
            ]))
            .unwrap();
            assert_eq!(config.base_url, "https://shop.example.com/app/");
            assert_eq!(config.environment, Environment::Production);
            assert_eq!(
                config.ws_endpoint.as_deref(),
                Some("ws://127.0.0.1:9222/devtools/browser/x")
            );
        }

        #[test]
        fn test_invalid_base_url_is_config_error() {
            let err = VerifyConfig::from_lookup(lookup(&[(ENV_BASE_URL, "not a url")])).unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
            assert!(err.to_string().contains(ENV_BASE_URL));
            assert_eq!(err.exit_status(), 2);
        }

        #[test]
        fn test_invalid_environment_is_config_error() {
            let err = VerifyConfig::from_lookup(lookup(&[(ENV_ENVIRONMENT, "qa")])).unwrap_err();
            assert!(err.to_string().contains(ENV_ENVIRONMENT));
        }

        #[test]
        fn test_ci_defaults() {
            let config = VerifyConfig::from_lookup(lookup(&[(ENV_CI, "true")])).unwrap();
            assert!(config.ci);
            assert!(config.headless);
            assert_eq!(config.case_retries, CI_CASE_RETRIES);
            assert_eq!(config.jobs, 1);
            assert_eq!(config.effective_jobs(), 1);
        }

        #[test]
        fn test_ci_false_values_are_ignored() {
            for value in ["", "0", "false", "No"] {
                let config = VerifyConfig::from_lookup(lookup(&[(ENV_CI, value)])).unwrap();
                assert!(!config.ci, "CI={value:?} should not enable CI mode");
            }
        }

        #[test]
        fn test_builder_chain() {
            let config = VerifyConfig::new()
                .with_verbosity(Verbosity::Verbose)
                .with_color(ColorChoice::Never)
                .with_headless(false)
                .with_timeout_ms(500)
                .with_retries(1)
                .with_backoff_ms(0)
                .with_case_retries(1)
                .with_jobs(4)
                .with_format(ReportFormat::Junit)
                .with_output("results.xml")
                .with_ws_endpoint("ws://x")
                .with_fail_fast(true)
                .with_artifacts_dir("out/shots")
                .with_chromium_path("/usr/bin/chromium")
                .with_viewport(800, 600);
            assert!(!config.headless);
            assert_eq!(config.artifacts_dir, Path::new("out/shots"));
            assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
            assert_eq!(config.viewport, (800, 600));
            assert_eq!(config.effective_jobs(), 4);
            assert_eq!(config.output.as_deref(), Some(Path::new("results.xml")));
            assert!(config.fail_fast);
        }

        #[test]
        fn test_effective_jobs_auto() {
            assert!(VerifyConfig::new().effective_jobs() >= 1);
        }

        #[test]
        fn test_resolve_url() {
            let config = VerifyConfig::new();
            assert_eq!(
                config.resolve_url("/products/1").unwrap().as_str(),
                "http://localhost:3000/products/1"
            );
            assert_eq!(
                config.resolve_url("https://www.saucedemo.com/inventory.html").unwrap().as_str(),
                "https://www.saucedemo.com/inventory.html"
            );
        }
    }

    mod dotenv_tests {
        use super::*;
        use std::io::Write;

        #[test]
        fn test_explicit_missing_file_is_error() {
            let dir = tempfile::tempdir().unwrap();
            let err = load_dotenv(Some(&dir.path().join("absent.env"))).unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
        }

        #[test]
        fn test_explicit_file_is_loaded() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("verify.env");
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "SPIFFY_DOTENV_TEST_MARKER=loaded").unwrap();

            let loaded = load_dotenv(Some(&path)).unwrap();
            assert_eq!(loaded.as_deref(), Some(path.as_path()));
            assert_eq!(
                std::env::var("SPIFFY_DOTENV_TEST_MARKER").as_deref(),
                Ok("loaded")
            );
        }
    }
}
