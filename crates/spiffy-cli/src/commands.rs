//! CLI command definitions using clap

use crate::config::{VerifyConfig, ENV_BROWSER_WS};
use crate::merchants::Merchant;
use crate::report::ReportFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// spiffy-verify: checks that merchant pages emit their lifecycle signals
#[derive(Parser, Debug)]
#[command(name = "spiffy-verify")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Load environment variables from this file instead of `.env`
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Visit merchant pages and wait for their signals
    Run(RunArgs),

    /// List the merchant catalog
    Merchants,

    /// Print the injectable tracker agent script
    Agent,

    /// List the signal catalog
    Signals,
}

/// Arguments for the run command
///
/// Unset options keep the value from the environment or its defaults.
#[derive(Parser, Debug, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Merchant to verify (repeatable, default: all)
    #[arg(short, long = "merchant", value_name = "NAME")]
    pub merchants: Vec<Merchant>,

    /// Extra page to verify, absolute or relative to the base URL (repeatable)
    #[arg(long = "url", value_name = "URL")]
    pub urls: Vec<String>,

    /// Wait timeout per signal attempt in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Wait attempts per signal
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Pause between wait attempts in milliseconds
    #[arg(long, value_name = "MS")]
    pub backoff_ms: Option<u64>,

    /// Reruns of a failed merchant case
    #[arg(long, value_name = "N")]
    pub case_retries: Option<u32>,

    /// Number of pages verified concurrently (0 = auto)
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Report format
    #[arg(short, long, value_enum)]
    pub format: Option<ReportFormat>,

    /// Report destination (default: stdout)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Attach to a running browser's `DevTools` websocket
    #[arg(long, env = ENV_BROWSER_WS, value_name = "URL")]
    pub ws_endpoint: Option<String>,

    /// Stop after the first failed merchant
    #[arg(long)]
    pub fail_fast: bool,

    /// Directory for failure screenshots (default: test-results)
    #[arg(long, value_name = "DIR")]
    pub artifacts_dir: Option<PathBuf>,

    /// Chromium binary to launch (default: auto-detect)
    #[arg(long, value_name = "PATH")]
    pub chromium_path: Option<String>,

    /// Browser viewport as WIDTHxHEIGHT (default: 1280x720)
    #[arg(long, value_name = "WxH", value_parser = parse_viewport)]
    pub viewport: Option<(u32, u32)>,
}

/// Parse a `WIDTHxHEIGHT` viewport
fn parse_viewport(s: &str) -> Result<(u32, u32), String> {
    let (width, height) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let parse = |part: &str| -> Result<u32, String> {
        match part.trim().parse::<u32>() {
            Ok(0) | Err(_) => Err(format!("invalid viewport dimension {part:?}")),
            Ok(n) => Ok(n),
        }
    };
    Ok((parse(width)?, parse(height)?))
}

impl RunArgs {
    /// Overlay the given flags on `config`
    #[must_use]
    pub fn apply_to(&self, mut config: VerifyConfig) -> VerifyConfig {
        if let Some(timeout_ms) = self.timeout_ms {
            config = config.with_timeout_ms(timeout_ms);
        }
        if let Some(retries) = self.retries {
            config = config.with_retries(retries);
        }
        if let Some(backoff_ms) = self.backoff_ms {
            config = config.with_backoff_ms(backoff_ms);
        }
        if let Some(case_retries) = self.case_retries {
            config = config.with_case_retries(case_retries);
        }
        if let Some(jobs) = self.jobs {
            config = config.with_jobs(jobs);
        }
        if self.headed {
            config = config.with_headless(false);
        }
        if let Some(format) = self.format {
            config = config.with_format(format);
        }
        if let Some(ref output) = self.output {
            config = config.with_output(output.clone());
        }
        if let Some(ref ws) = self.ws_endpoint {
            config = config.with_ws_endpoint(ws.clone());
        }
        if self.fail_fast {
            config = config.with_fail_fast(true);
        }
        if let Some(ref dir) = self.artifacts_dir {
            config = config.with_artifacts_dir(dir.clone());
        }
        if let Some(ref path) = self.chromium_path {
            config = config.with_chromium_path(path.clone());
        }
        if let Some((width, height)) = self.viewport {
            config = config.with_viewport(width, height);
        }
        config
    }
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
