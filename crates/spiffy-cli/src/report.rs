//! Result reports: list, JSON and JUnit XML

use crate::error::{CliError, CliResult};
use crate::runner::TestResults;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// One line per case
    #[default]
    List,
    /// Machine-readable JSON
    Json,
    /// JUnit XML for CI integration
    Junit,
}

/// Render results in `format`
#[must_use]
pub fn render(format: ReportFormat, suite: &str, results: &TestResults) -> String {
    match format {
        ReportFormat::List => render_list(results),
        ReportFormat::Json => render_json(suite, results),
        ReportFormat::Junit => render_junit(suite, results),
    }
}

/// Write a report to `output`, or to stdout for machine formats
///
/// The list format without an output path prints nothing extra; the
/// progress reporter has already shown every case.
///
/// # Errors
///
/// Returns error if the file cannot be written
pub fn write_report(
    format: ReportFormat,
    suite: &str,
    results: &TestResults,
    output: Option<&Path>,
) -> CliResult<()> {
    let content = render(format, suite, results);
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content).map_err(|e| {
                CliError::report_generation(format!("{}: {e}", path.display()))
            })?;
        }
        None if format != ReportFormat::List => print!("{content}"),
        None => {}
    }
    Ok(())
}

/// Plain text, one line per case plus failure details
#[must_use]
pub fn render_list(results: &TestResults) -> String {
    let mut out = String::new();
    for result in &results.results {
        let status = if result.passed { "PASS" } else { "FAIL" };
        out.push_str(&format!(
            "{status} {} ({}ms)\n",
            result.name, result.duration_ms
        ));
        if let Some(ref error) = result.error {
            out.push_str(&format!("     {error}\n"));
        }
        if let Some(ref path) = result.screenshot {
            out.push_str(&format!("     screenshot: {}\n", path.display()));
        }
    }
    out.push_str(&format!(
        "{} passed, {} failed, {} skipped in {}ms\n",
        results.passed(),
        results.failed(),
        results.skipped,
        results.duration_ms
    ));
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    suite: &'a str,
    generated_at: String,
    passed: usize,
    failed: usize,
    skipped: usize,
    #[serde(flatten)]
    results: &'a TestResults,
}

/// Pretty JSON document with counts and every case
#[must_use]
pub fn render_json(suite: &str, results: &TestResults) -> String {
    let report = JsonReport {
        suite,
        generated_at: chrono::Utc::now().to_rfc3339(),
        passed: results.passed(),
        failed: results.failed(),
        skipped: results.skipped,
        results,
    };
    let mut json = serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string());
    json.push('\n');
    json
}

/// Render JUnit XML content
#[must_use]
pub fn render_junit(suite: &str, results: &TestResults) -> String {
    let mut xml = String::new();

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(
        r#"<testsuite name="{}" tests="{}" failures="{}" skipped="{}" time="{:.3}" timestamp="{}">"#,
        escape_xml(suite),
        results.total() + results.skipped,
        results.failed(),
        results.skipped,
        ms_to_secs(results.duration_ms),
        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S")
    ));
    xml.push('\n');

    for result in &results.results {
        xml.push_str(&format!(
            r#"  <testcase name="{}" classname="{}" time="{:.3}">"#,
            escape_xml(&result.name),
            escape_xml(&result.merchant),
            ms_to_secs(result.duration_ms)
        ));
        xml.push('\n');

        if let Some(error) = &result.error {
            let mut body = escape_xml(error);
            if let Some(path) = &result.screenshot {
                body.push_str(&format!("\nscreenshot: {}", escape_xml(&path.display().to_string())));
            }
            xml.push_str(&format!(
                r#"    <failure message="{}">{body}</failure>"#,
                escape_xml(error)
            ));
            xml.push('\n');
            if let Some(path) = &result.screenshot {
                xml.push_str(&format!(
                    "    <system-out>[[ATTACHMENT|{}]]</system-out>\n",
                    escape_xml(&path.display().to_string())
                ));
            }
        }

        xml.push_str("  </testcase>\n");
    }

    xml.push_str("</testsuite>\n");
    xml
}

fn ms_to_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::runner::{SignalOutcome, TestResult};

    fn sample() -> TestResults {
        let mut results = TestResults::new();
        results.add(TestResult {
            index: 0,
            name: "(1) Verify events on merchant: fake-store".to_string(),
            merchant: "fake-store".to_string(),
            url: "https://fakestoreapi.com/products/1".to_string(),
            passed: true,
            error: None,
            duration_ms: 1_250,
            runs: 1,
            signals: vec![SignalOutcome {
                signal: "EVENT_APP_INITIALIZED".to_string(),
                received: true,
                attempts: 1,
                error: None,
            }],
            screenshot: None,
        });
        results.add(TestResult {
            index: 1,
            name: "(2) Verify events on merchant: sauce-demo".to_string(),
            merchant: "sauce-demo".to_string(),
            url: "https://www.saucedemo.com/inventory.html".to_string(),
            passed: false,
            error: Some("Failed to receive \"EVENT_APP_INITIALIZED\" after 3 attempts: <timeout>".to_string()),
            duration_ms: 47_000,
            runs: 1,
            signals: Vec::new(),
            screenshot: Some("test-results/02-sauce-demo-run1.png".into()),
        });
        results.duration_ms = 48_250;
        results
    }

    mod list_tests {
        use super::*;

        #[test]
        fn test_render_list() {
            let text = render_list(&sample());
            assert!(text.contains("PASS (1) Verify events on merchant: fake-store (1250ms)"));
            assert!(text.contains("FAIL (2) Verify events on merchant: sauce-demo"));
            assert!(text.contains("after 3 attempts"));
            assert!(text.contains("     screenshot: test-results/02-sauce-demo-run1.png\n"));
            assert!(text.ends_with("1 passed, 1 failed, 0 skipped in 48250ms\n"));
        }
    }

    mod json_tests {
        use super::*;

        #[test]
        fn test_render_json() {
            let json = render_json("spiffy-events", &sample());
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["suite"], "spiffy-events");
            assert_eq!(value["passed"], 1);
            assert_eq!(value["failed"], 1);
            assert_eq!(value["results"].as_array().unwrap().len(), 2);
            assert_eq!(value["results"][0]["signals"][0]["received"], true);
            assert!(value["results"][0].get("screenshot").is_none());
            assert_eq!(value["results"][1]["screenshot"], "test-results/02-sauce-demo-run1.png");
            assert_eq!(value["duration_ms"], 48_250);
        }
    }

    mod junit_tests {
        use super::*;

        #[test]
        fn test_render_junit() {
            let xml = render_junit("spiffy-events", &sample());
            assert!(xml.starts_with("<?xml"));
            assert!(xml.contains(r#"<testsuite name="spiffy-events" tests="2" failures="1" skipped="0" time="48.250""#));
            assert!(xml.contains(r#"classname="fake-store" time="1.250""#));
            assert!(xml.contains("&lt;timeout&gt;"));
            assert!(xml.contains("&quot;EVENT_APP_INITIALIZED&quot;"));
            assert_eq!(xml.matches("<testcase ").count(), 2);
            assert_eq!(xml.matches("<failure ").count(), 1);
            assert!(xml.contains("\nscreenshot: test-results/02-sauce-demo-run1.png</failure>"));
            assert!(xml.contains("<system-out>[[ATTACHMENT|test-results/02-sauce-demo-run1.png]]</system-out>"));
        }

        #[test]
        fn test_escape_xml() {
            assert_eq!(escape_xml("a & b"), "a &amp; b");
            assert_eq!(escape_xml("<tag>"), "&lt;tag&gt;");
            assert_eq!(escape_xml("it's"), "it&apos;s");
            assert_eq!(escape_xml("plain text"), "plain text");
        }
    }

    mod write_tests {
        use super::*;

        #[test]
        fn test_write_report_creates_parent_dirs() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("reports/results.xml");
            write_report(ReportFormat::Junit, "suite", &sample(), Some(&path)).unwrap();
            let xml = std::fs::read_to_string(&path).unwrap();
            assert!(xml.contains("<testsuite"));
        }

        #[test]
        fn test_render_dispatches_on_format() {
            let results = sample();
            assert!(render(ReportFormat::List, "s", &results).contains("PASS"));
            assert!(render(ReportFormat::Json, "s", &results).trim_start().starts_with('{'));
            assert!(render(ReportFormat::Junit, "s", &results).contains("<testsuite"));
        }
    }
}
