//! Regression runner: replays stored scenarios against the system under test.
//!
//! For each scenario the runner opens a replay session (so the system under
//! test can pull recorded database and external responses from the harness),
//! hands every recorded interaction to a [`ScenarioExecutor`], and compares
//! the actual responses with the recorded ones. One scenario failing never
//! aborts the batch.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::ports::executor::ScenarioExecutor;
use crate::scenario::format::{ReplayedResponse, Scenario, ScenarioType};
use crate::scenario::replayer::ReplayOptions;
use crate::session::Harness;

/// Options for a regression run.
#[derive(Debug, Clone, Default)]
pub struct RegressionOptions {
    /// Persist the report under the recordings root.
    pub save_report: bool,
    /// Replay behavior for each scenario's session.
    pub replay: ReplayOptions,
}

/// Outcome for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    /// Scenario identifier.
    pub scenario_id: String,
    /// Scenario name, when it could be loaded.
    pub name: Option<String>,
    /// Whether every executed interaction matched its recording.
    pub passed: bool,
    /// Wall time spent on the scenario.
    pub duration_ms: u64,
    /// Interactions the executor produced a response for.
    pub executed: usize,
    /// Interactions the executor declined to run.
    pub skipped: usize,
    /// Differences between recorded and actual responses.
    pub mismatches: Vec<String>,
    /// Error that stopped the scenario early.
    pub error: Option<String>,
}

/// Aggregate result of a regression run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionReport {
    /// Unique identifier of this run.
    pub run_id: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Scenarios attempted.
    pub total: usize,
    /// Scenarios that passed.
    pub passed: usize,
    /// Scenarios that failed or errored.
    pub failed: usize,
    /// Percentage of scenarios that passed; 0 when none ran.
    pub pass_rate: f64,
    /// Wall time of the whole run.
    pub duration_ms: u64,
    /// Per-scenario outcomes in run order.
    pub results: Vec<ScenarioResult>,
    /// Where the report was written, if it was saved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
}

impl RegressionReport {
    fn from_results(started_at: DateTime<Utc>, duration_ms: u64, results: Vec<ScenarioResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let pass_rate = if total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let rate = passed as f64 / total as f64 * 100.0;
            (rate * 100.0).round() / 100.0
        };
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at,
            total,
            passed,
            failed: total - passed,
            pass_rate,
            duration_ms,
            results,
            report_path: None,
        }
    }
}

/// Drives stored scenarios through replay and an executor.
pub struct RegressionRunner<'a> {
    executor: &'a dyn ScenarioExecutor,
}

impl<'a> RegressionRunner<'a> {
    /// Creates a runner that invokes the system under test through `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn ScenarioExecutor) -> Self {
        Self { executor }
    }

    /// Runs the given scenarios, or every `regression` scenario when `ids`
    /// is empty.
    ///
    /// # Errors
    ///
    /// Returns an error only if the catalog cannot be listed or a requested
    /// report cannot be written. Per-scenario failures are captured in the
    /// report.
    pub async fn run(
        &self,
        harness: &Harness,
        ids: &[String],
        options: &RegressionOptions,
    ) -> Result<RegressionReport> {
        let started_at = harness.now();
        let ids: Vec<String> = if ids.is_empty() {
            harness
                .list_scenarios(Some(ScenarioType::Regression))?
                .into_iter()
                .map(|summary| summary.id)
                .collect()
        } else {
            ids.to_vec()
        };
        info!(scenarios = ids.len(), "regression run started");

        let mut results = Vec::with_capacity(ids.len());
        for id in &ids {
            let result = self.run_one(harness, id, options).await;
            if result.passed {
                info!(scenario_id = %id, duration_ms = result.duration_ms, "scenario passed");
            } else {
                warn!(
                    scenario_id = %id,
                    mismatches = result.mismatches.len(),
                    error = result.error.as_deref().unwrap_or(""),
                    "scenario failed"
                );
            }
            results.push(result);
        }

        let mut report = RegressionReport::from_results(started_at, elapsed_ms(started_at, harness.now()), results);
        info!(
            total = report.total,
            passed = report.passed,
            failed = report.failed,
            pass_rate = report.pass_rate,
            "regression run finished"
        );

        if options.save_report {
            let stamp = started_at.format("%Y%m%dT%H%M%S%3fZ").to_string();
            report.report_path = Some(harness.save_report(&stamp, &report)?);
        }
        Ok(report)
    }

    async fn run_one(&self, harness: &Harness, id: &str, options: &RegressionOptions) -> ScenarioResult {
        let started_at = harness.now();
        let mut result = ScenarioResult {
            scenario_id: id.to_string(),
            name: None,
            passed: false,
            duration_ms: 0,
            executed: 0,
            skipped: 0,
            mismatches: Vec::new(),
            error: None,
        };

        match self.replay_and_execute(harness, id, options, &mut result).await {
            Ok(()) => result.passed = result.mismatches.is_empty(),
            Err(err) => result.error = Some(err.to_string()),
        }
        result.duration_ms = elapsed_ms(started_at, harness.now());
        result
    }

    async fn replay_and_execute(
        &self,
        harness: &Harness,
        id: &str,
        options: &RegressionOptions,
        result: &mut ScenarioResult,
    ) -> Result<()> {
        let scenario = harness.load_scenario(id)?;
        result.name = Some(scenario.name.clone());
        harness.start_replay(id, options.replay)?;

        let outcome = self.execute(&scenario, result).await;
        if let Err(err) = harness.stop_replay() {
            warn!(scenario_id = %id, error = %err, "failed to stop replay");
        }
        outcome
    }

    async fn execute(&self, scenario: &Scenario, result: &mut ScenarioResult) -> Result<()> {
        for interaction in &scenario.interactions {
            match self.executor.execute(interaction).await? {
                Some(actual) => {
                    result.executed += 1;
                    result.mismatches.extend(
                        compare_responses(&interaction.response(), &actual)
                            .into_iter()
                            .map(|m| format!("{}: {m}", interaction.id)),
                    );
                }
                None => result.skipped += 1,
            }
        }
        Ok(())
    }
}

/// Differences between a recorded response and an actual one.
///
/// API responses are compared on status and body; headers are ignored.
#[must_use]
pub fn compare_responses(expected: &ReplayedResponse, actual: &ReplayedResponse) -> Vec<String> {
    let mut mismatches = Vec::new();
    match (expected, actual) {
        (ReplayedResponse::Api(expected), ReplayedResponse::Api(actual)) => {
            if expected.status != actual.status {
                mismatches.push(format!("status {} != {}", expected.status, actual.status));
            }
            if expected.body != actual.body {
                mismatches.push(format!("body {} != {}", expected.body, actual.body));
            }
        }
        _ if expected.kind() != actual.kind() => {
            mismatches.push(format!("kind {} != {}", expected.kind(), actual.kind()));
        }
        _ => {
            if expected.body() != actual.body() {
                mismatches.push(format!("body {} != {}", expected.body(), actual.body()));
            }
        }
    }
    mismatches
}

fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_milliseconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::context::HarnessContext;
    use crate::error::HarnessError;
    use crate::ports::executor::ExecuteFuture;
    use crate::scenario::format::{
        ApiRequest, ApiResponse, Interaction, InteractionMetadata, InteractionPayload,
    };
    use crate::scenario::recorder::RecordingOptions;
    use crate::scenario::signature::RequestSignature;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    fn harness() -> Harness {
        Harness::new(HarnessContext::in_memory(Utc::now()), HarnessConfig::rooted_at("/h")).unwrap()
    }

    fn record(harness: &Harness, name: &str, scenario_type: ScenarioType, body: Value) -> String {
        let options = RecordingOptions { scenario_type, ..RecordingOptions::default() };
        harness.start_recording(name, options).unwrap();
        harness.record_api_interaction(
            &ApiRequest::new("GET", "/widgets"),
            &ApiResponse::new(200, body),
            InteractionMetadata::default(),
        );
        harness.record_database_interaction(
            "select",
            "SELECT count(*) FROM widgets",
            &[],
            &json!([{"count": 0}]),
            InteractionMetadata::default(),
        );
        harness.stop_recording().unwrap().scenario_id
    }

    /// Answers every API request with a fixed body and declines the rest.
    struct FixedExecutor {
        body: Value,
    }

    impl ScenarioExecutor for FixedExecutor {
        fn execute<'a>(&'a self, interaction: &'a Interaction) -> ExecuteFuture<'a> {
            Box::pin(async move {
                Ok(match interaction.payload {
                    InteractionPayload::Api { .. } => {
                        Some(ReplayedResponse::Api(ApiResponse::new(200, self.body.clone())))
                    }
                    _ => None,
                })
            })
        }
    }

    struct FailingExecutor;

    impl ScenarioExecutor for FailingExecutor {
        fn execute<'a>(&'a self, _interaction: &'a Interaction) -> ExecuteFuture<'a> {
            Box::pin(async { Err(HarnessError::Execution("connection refused".into())) })
        }
    }

    #[tokio::test]
    async fn empty_catalog_yields_zero_report() {
        let harness = harness();
        let executor = FixedExecutor { body: json!({}) };
        let report = RegressionRunner::new(&executor)
            .run(&harness, &[], &RegressionOptions::default())
            .await
            .unwrap();
        assert_eq!((report.total, report.passed, report.failed), (0, 0, 0));
        assert!(report.pass_rate.abs() < f64::EPSILON);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn default_selection_is_regression_type_only() {
        let harness = harness();
        record(&harness, "reg", ScenarioType::Regression, json!({"count": 0}));
        record(&harness, "perf", ScenarioType::Performance, json!({"count": 0}));

        let executor = FixedExecutor { body: json!({"count": 0}) };
        let report = RegressionRunner::new(&executor)
            .run(&harness, &[], &RegressionOptions::default())
            .await
            .unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.results[0].name.as_deref(), Some("reg"));
        assert!(report.results[0].passed);
        assert_eq!((report.results[0].executed, report.results[0].skipped), (1, 1));
        assert!((report.pass_rate - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn failures_are_isolated_per_scenario() {
        let harness = harness();
        let good = record(&harness, "good", ScenarioType::Regression, json!({"count": 0}));
        let drifted = record(&harness, "drifted", ScenarioType::Regression, json!({"count": 9}));

        let executor = FixedExecutor { body: json!({"count": 0}) };
        let ids = vec![good, "missing".to_string(), drifted];
        let report = RegressionRunner::new(&executor)
            .run(&harness, &ids, &RegressionOptions::default())
            .await
            .unwrap();

        assert_eq!((report.total, report.passed, report.failed), (3, 1, 2));
        assert!(report.results[1].error.as_deref().unwrap().contains("missing"));
        assert_eq!(report.results[2].mismatches.len(), 1);
        assert!(report.results[2].mismatches[0].contains("body"));
        assert!((report.pass_rate - 33.33).abs() < 1e-9);
        assert_eq!(harness.status().state, crate::session::SessionState::Idle);
    }

    #[tokio::test]
    async fn executor_errors_are_captured_and_replay_is_closed() {
        let harness = harness();
        let id = record(&harness, "down", ScenarioType::Regression, json!({}));

        let report = RegressionRunner::new(&FailingExecutor)
            .run(&harness, &[id], &RegressionOptions::default())
            .await
            .unwrap();
        assert_eq!(report.failed, 1);
        assert!(report.results[0].error.as_deref().unwrap().contains("connection refused"));
        assert_eq!(harness.status().state, crate::session::SessionState::Idle);
    }

    /// Pulls the recorded database result from the harness, the way an
    /// instrumented service would during replay.
    struct ReplayAwareExecutor<'h> {
        harness: &'h Harness,
        seen: Mutex<Vec<Value>>,
    }

    impl ScenarioExecutor for ReplayAwareExecutor<'_> {
        fn execute<'a>(&'a self, interaction: &'a Interaction) -> ExecuteFuture<'a> {
            Box::pin(async move {
                let rows = self
                    .harness
                    .get_replay_response(&RequestSignature::database("select", "select COUNT(*)  from widgets"))?;
                if let Some(rows) = rows {
                    self.seen.lock().unwrap().push(rows.body().clone());
                }
                Ok(Some(interaction.response()))
            })
        }
    }

    #[tokio::test]
    async fn executor_can_consume_replayed_dependencies() {
        let harness = harness();
        let id = record(&harness, "deps", ScenarioType::Regression, json!({"count": 0}));
        let executor = ReplayAwareExecutor { harness: &harness, seen: Mutex::new(Vec::new()) };

        let report = RegressionRunner::new(&executor)
            .run(&harness, &[id], &RegressionOptions::default())
            .await
            .unwrap();
        assert_eq!(report.passed, 1);
        assert_eq!(executor.seen.lock().unwrap()[0], json!([{"count": 0}]));
    }

    #[tokio::test]
    async fn saved_report_lands_under_recordings_root() {
        let harness = harness();
        let executor = FixedExecutor { body: json!({}) };
        let options = RegressionOptions { save_report: true, ..RegressionOptions::default() };
        let report = RegressionRunner::new(&executor).run(&harness, &[], &options).await.unwrap();
        let path = report.report_path.unwrap();
        assert!(path.starts_with("/h/recordings"));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("regression-report-"));
    }

    #[test]
    fn compare_flags_status_and_kind_differences() {
        let expected = ReplayedResponse::Api(ApiResponse::new(200, json!({"a": 1})));
        let actual = ReplayedResponse::Api(ApiResponse::new(500, json!({"a": 1})));
        assert_eq!(compare_responses(&expected, &actual), vec!["status 200 != 500".to_string()]);

        let other = ReplayedResponse::Database(json!({"a": 1}));
        assert_eq!(compare_responses(&expected, &other), vec!["kind api != database".to_string()]);
        assert!(compare_responses(&other, &other.clone()).is_empty());
    }
}
