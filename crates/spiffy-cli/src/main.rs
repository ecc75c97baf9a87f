//! spiffy-verify: lifecycle signal verification for merchant pages
//!
//! ## Usage
//!
//! ```bash
//! spiffy-verify run                               # Verify every merchant
//! spiffy-verify run -m sauce-demo --headed        # One merchant, visible browser
//! spiffy-verify run --format junit -o results.xml # JUnit report for CI
//! spiffy-verify merchants                         # List the catalog
//! spiffy-verify agent > agent.js                  # Dump the injected script
//! ```

use clap::Parser;
use spiffy::{Browser, BrowserConfig, SignalName};
use spiffy_verify::{
    load_dotenv, merchant_cases, write_report, BrowserDriver, Cli, CliError, CliResult, Commands,
    Merchant, RunArgs, TestResults, TestRunner, VerifyCase, VerifyConfig, Verbosity,
    MERCHANT_URLS, REQUIRED_SIGNALS,
};
use std::process::ExitCode;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Suite name used in reports
const SUITE: &str = "Event Tracker Tests";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_status())
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    // .env goes first so it can carry RUST_LOG
    let env_file = load_dotenv(cli.env_file.as_deref())?;
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    init_tracing(verbosity, cli.log_json);
    if let Some(path) = env_file {
        debug!(path = %path.display(), "loaded environment file");
    }

    match cli.command {
        Commands::Run(ref args) => {
            let config = build_config(&cli, verbosity)?;
            run_verify(args.apply_to(config), args)
        }
        Commands::Merchants => {
            print_merchants();
            Ok(())
        }
        Commands::Agent => {
            print!("{}", spiffy::agent_script());
            Ok(())
        }
        Commands::Signals => {
            print_signals();
            Ok(())
        }
    }
}

fn init_tracing(verbosity: Verbosity, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()));
    let registry = tracing_subscriber::registry().with(filter);

    let _ = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .try_init()
    };
}

fn build_config(cli: &Cli, verbosity: Verbosity) -> CliResult<VerifyConfig> {
    Ok(VerifyConfig::from_env()?
        .with_verbosity(verbosity)
        .with_color(cli.color.into()))
}

fn build_cases(config: &VerifyConfig, args: &RunArgs) -> CliResult<Vec<VerifyCase>> {
    let mut cases = if args.merchants.is_empty() && !args.urls.is_empty() {
        Vec::new()
    } else {
        merchant_cases(&args.merchants)
    };

    for reference in &args.urls {
        let url = config.resolve_url(reference)?;
        let label = url.host_str().unwrap_or("page").to_string();
        cases.push(VerifyCase::for_url(cases.len(), label, url));
    }
    Ok(cases)
}

fn browser_config(config: &VerifyConfig) -> BrowserConfig {
    let (width, height) = config.viewport;
    let mut browser = BrowserConfig::default()
        .with_headless(config.headless)
        .with_viewport(width, height);
    if let Some(ref path) = config.chromium_path {
        browser = browser.with_chromium_path(path.clone());
    }
    if config.ci {
        browser = browser.with_no_sandbox();
    }
    if let Some(ref ws) = config.ws_endpoint {
        browser = browser.with_ws_endpoint(ws.clone());
    }
    browser
}

fn run_verify(config: VerifyConfig, args: &RunArgs) -> CliResult<()> {
    let cases = build_cases(&config, args)?;
    info!(
        base_url = %config.base_url,
        environment = %config.environment,
        ci = config.ci,
        headless = config.headless,
        artifacts_dir = %config.artifacts_dir.display(),
        cases = cases.len(),
        "verification run configured"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let results = runtime.block_on(verify(&config, cases))?;

    write_report(config.format, SUITE, &results, config.output.as_deref())?;

    if results.all_passed() {
        Ok(())
    } else {
        Err(CliError::test_execution(format!(
            "{} of {} merchant(s) failed",
            results.failed(),
            results.total() + results.skipped
        )))
    }
}

async fn verify(config: &VerifyConfig, cases: Vec<VerifyCase>) -> CliResult<TestResults> {
    let browser = Browser::start(browser_config(config)).await?;
    let mut runner = TestRunner::new(config.clone(), BrowserDriver::new(browser));
    let results = runner.run(cases).await;

    if let Err(e) = runner.into_driver().shutdown().await {
        warn!(error = %e, "browser shutdown failed");
    }
    results
}

fn print_merchants() {
    for merchant in Merchant::ALL {
        println!("{merchant}");
        for entry in MERCHANT_URLS.iter().filter(|entry| entry.merchant == merchant) {
            let marker = if entry.url == merchant.first_url() { "*" } else { " " };
            println!("  {marker} {}", entry.url);
        }
    }
}

fn print_signals() {
    for signal in SignalName::ALL {
        let marker = if REQUIRED_SIGNALS.contains(&signal) {
            "  (required)"
        } else {
            ""
        };
        println!("{signal}{marker}");
    }
}
