//! spiffy-verify library
//!
//! Driver for the Spiffy tracker: loads demo merchant pages in a browser,
//! waits for each required lifecycle signal under a retry policy, and
//! reports pass/fail per merchant.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
mod merchants;
mod output;
mod report;
mod retry;
mod runner;

pub use commands::{Cli, ColorArg, Commands, RunArgs};
pub use config::{
    load_dotenv, ColorChoice, Environment, Verbosity, VerifyConfig, CI_CASE_RETRIES,
    DEFAULT_ARTIFACTS_DIR, DEFAULT_BACKOFF_MS, DEFAULT_BASE_URL, DEFAULT_SIGNAL_TIMEOUT_MS,
    DEFAULT_VIEWPORT, DEFAULT_WAIT_ATTEMPTS, ENV_BASE_URL, ENV_BROWSER_WS, ENV_CI,
    ENV_ENVIRONMENT,
};
pub use error::{CliError, CliResult};
pub use merchants::{Merchant, MerchantUrl, MERCHANT_URLS};
pub use output::ProgressReporter;
pub use report::{render, render_json, render_junit, render_list, write_report, ReportFormat};
pub use retry::{wait_with_retry, RetryOutcome, RetryPolicy};
pub use runner::{
    merchant_cases, BrowserDriver, PageDriver, SignalOutcome, TestResult, TestResults, TestRunner,
    VerifyCase, REQUIRED_SIGNALS,
};
