//! `scenario-harness regress` command.

use crate::adapters::live::HttpExecutor;
use crate::regression::{RegressionOptions, RegressionReport, RegressionRunner};
use crate::session::Harness;

/// Execute the `regress` command.
///
/// Re-issues every recorded API request of the selected scenarios against
/// the target URL and prints one line per scenario plus a summary.
///
/// # Errors
///
/// Returns an error string if no target URL is configured, the run cannot
/// start, or any scenario fails.
pub fn run(harness: &Harness, ids: &[String], target_url: Option<&str>, save_report: bool) -> Result<(), String> {
    let target = target_url
        .map(str::to_string)
        .or_else(|| harness.config().target_url.clone())
        .ok_or("No target URL: pass --target-url or set HARNESS_TARGET_URL")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;

    let executor = HttpExecutor::new(target);
    let options = RegressionOptions { save_report, ..RegressionOptions::default() };
    let report = runtime
        .block_on(RegressionRunner::new(&executor).run(harness, ids, &options))
        .map_err(|e| e.to_string())?;

    print!("{}", render(&report));
    if report.failed > 0 {
        return Err(format!("{} of {} scenario(s) failed", report.failed, report.total));
    }
    Ok(())
}

fn render(report: &RegressionReport) -> String {
    let mut out = String::new();
    for result in &report.results {
        let verdict = if result.passed { "PASS" } else { "FAIL" };
        out.push_str(&format!("{verdict}  {}  ({} ms)\n", result.scenario_id, result.duration_ms));
        if let Some(error) = &result.error {
            out.push_str(&format!("      error: {error}\n"));
        }
        for mismatch in &result.mismatches {
            out.push_str(&format!("      {mismatch}\n"));
        }
    }
    out.push_str(&format!(
        "\n{} total, {} passed, {} failed ({:.2}% pass rate) in {} ms\n",
        report.total, report.passed, report.failed, report.pass_rate, report.duration_ms
    ));
    if let Some(path) = &report.report_path {
        out.push_str(&format!("Report written to {}\n", path.display()));
    }
    out
}
