//! Record-replay round-trip integration tests.
//!
//! Each test records traffic through a live-disk harness rooted in a scratch
//! directory, then replays it through a fresh harness so every assertion
//! goes through the persisted documents.

use std::path::Path;

use serde_json::{json, Value};

use scenario_harness::{
    ApiRequest, ApiResponse, Harness, HarnessConfig, HarnessContext, HarnessError, InteractionMetadata,
    RecordingOptions, RegressionOptions, RegressionRunner, ReplayOptions, RequestSignature, ScenarioType,
    SessionState,
};
use scenario_harness::ports::executor::{ExecuteFuture, ScenarioExecutor};
use scenario_harness::scenario::Interaction;

fn harness_at(root: &Path) -> Harness {
    Harness::new(HarnessContext::live(), HarnessConfig::rooted_at(root)).unwrap()
}

fn record_widgets(harness: &Harness, options: RecordingOptions) -> String {
    harness.start_recording("widgets", options).unwrap();
    harness.record_api_interaction(
        &ApiRequest::new("GET", "/widgets"),
        &ApiResponse::new(200, json!({"count": 0})),
        InteractionMetadata::with_duration(3),
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

#[test]
fn recorded_widgets_replay_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let id = record_widgets(&harness_at(dir.path()), RecordingOptions::default());

    let harness = harness_at(dir.path());
    harness.start_replay(&id, ReplayOptions::default()).unwrap();

    let api = harness.get_replay_response(&RequestSignature::api("GET", "/widgets")).unwrap().unwrap();
    assert_eq!(api.body(), &json!({"count": 0}));

    let rows = harness
        .get_replay_response(&RequestSignature::database("select", "select   COUNT(*)\n  from widgets"))
        .unwrap()
        .unwrap();
    assert_eq!(rows.body(), &json!([{"count": 0}]));

    assert!(harness.get_replay_response(&RequestSignature::api("GET", "/missing")).unwrap().is_none());

    let summary = harness.stop_replay().unwrap();
    assert_eq!((summary.served, summary.unmatched), (2, 1));
    assert_eq!(harness.status().state, SessionState::Idle);
}

#[test]
fn authorization_is_redacted_in_native_and_archive_documents() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness_at(dir.path());
    let options = RecordingOptions { export_har: Some(true), ..RecordingOptions::default() };

    harness.start_recording("secrets", options).unwrap();
    for path in ["/widgets", "/widgets/1"] {
        harness.record_api_interaction(
            &ApiRequest::new("GET", path).with_header("Authorization", "Bearer secret123"),
            &ApiResponse::new(200, json!({"ok": true})),
            InteractionMetadata::default(),
        );
    }
    let summary = harness.stop_recording().unwrap();

    let native = std::fs::read_to_string(&summary.storage_path).unwrap();
    let archive = std::fs::read_to_string(summary.har_path.unwrap()).unwrap();
    for document in [&native, &archive] {
        assert!(!document.contains("secret123"));
        assert!(document.contains("[REDACTED]"));
    }

    let har: Value = serde_json::from_str(&archive).unwrap();
    assert_eq!(har["log"]["entries"].as_array().unwrap().len(), 2);
}

#[test]
fn nested_body_secrets_are_redacted() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness_at(dir.path());
    harness.start_recording("nested", RecordingOptions::default()).unwrap();
    harness.record_external_interaction(
        "identity",
        "/login",
        &json!({"user": "ada", "credentials": {"password": "hunter2"}}),
        &json!({"session": {"token": "abc"}}),
        InteractionMetadata::default(),
    );
    let summary = harness.stop_recording().unwrap();

    let native = std::fs::read_to_string(&summary.storage_path).unwrap();
    assert!(!native.contains("hunter2"));
    assert!(!native.contains("\"abc\""));
    assert!(native.contains("ada"));
}

#[test]
fn reloaded_scenarios_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let id = record_widgets(&harness_at(dir.path()), RecordingOptions::default());

    let first = harness_at(dir.path()).load_scenario(&id).unwrap();
    let second = harness_at(dir.path()).load_scenario(&id).unwrap();
    assert_eq!(first, second);
}

#[test]
fn identical_traffic_yields_identical_interaction_ids() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness_at(dir.path());

    let mut ids = Vec::new();
    for name in ["first", "second"] {
        harness.start_recording(name, RecordingOptions::default()).unwrap();
        ids.push(
            harness
                .record_api_interaction(
                    &ApiRequest::new("POST", "/widgets").with_body(json!({"name": "w"})),
                    &ApiResponse::new(201, json!({"id": 1})),
                    InteractionMetadata::default(),
                )
                .unwrap(),
        );
        harness.stop_recording().unwrap();
    }
    assert_eq!(ids[0], ids[1]);
    assert!(ids[0].starts_with("api-"));
}

#[test]
fn start_calls_are_mutually_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness_at(dir.path());
    let id = record_widgets(&harness, RecordingOptions::default());

    harness.start_replay(&id, ReplayOptions::default()).unwrap();
    assert!(matches!(
        harness.start_replay(&id, ReplayOptions::default()),
        Err(HarnessError::SessionConflict { active: SessionState::Replaying })
    ));
    assert!(matches!(
        harness.start_recording("other", RecordingOptions::default()),
        Err(HarnessError::SessionConflict { active: SessionState::Replaying })
    ));
    harness.stop_replay().unwrap();
}

#[test]
fn deleted_scenarios_are_gone_from_catalog_and_disk() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness_at(dir.path());
    let options = RecordingOptions { export_har: Some(true), ..RecordingOptions::default() };
    let id = record_widgets(&harness, options);
    assert_eq!(harness.list_scenarios(None).unwrap().len(), 1);

    harness.delete_scenario(&id).unwrap();
    assert!(harness.list_scenarios(None).unwrap().is_empty());
    assert!(!dir.path().join("recordings").join(format!("{id}.har")).exists());
    assert!(matches!(harness.load_scenario(&id), Err(HarnessError::ScenarioNotFound(_))));
}

#[test]
fn back_to_back_recordings_never_collide() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness_at(dir.path());
    let mut ids = std::collections::HashSet::new();
    for _ in 0..5 {
        harness.start_recording("burst", RecordingOptions::default()).unwrap();
        ids.insert(harness.stop_recording().unwrap().scenario_id);
    }
    assert_eq!(ids.len(), 5);
    assert_eq!(harness.status().state, SessionState::Idle);
}

#[test]
fn secrets_in_urls_and_database_traffic_stay_off_disk_but_replay() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = harness_at(dir.path());
    let options = RecordingOptions { export_har: Some(true), ..RecordingOptions::default() };
    let query = "SELECT id FROM users WHERE password = 'hunter2'";

    let id = recorder.start_recording("credentials", options).unwrap();
    recorder.record_api_interaction(
        &ApiRequest::new("GET", "/login?token=abc123"),
        &ApiResponse::new(200, json!({"ok": true})),
        InteractionMetadata::default(),
    );
    recorder.record_database_interaction(
        "select",
        query,
        &[json!({"password": "hunter2"})],
        &json!([{"id": 1}]),
        InteractionMetadata::default(),
    );
    let summary = recorder.stop_recording().unwrap();

    let native = std::fs::read_to_string(&summary.storage_path).unwrap();
    let archive = std::fs::read_to_string(summary.har_path.unwrap()).unwrap();
    for document in [&native, &archive] {
        assert!(!document.contains("hunter2"));
        assert!(!document.contains("abc123"));
    }

    let harness = harness_at(dir.path());
    harness.start_replay(&id, ReplayOptions::default()).unwrap();
    let login = harness.get_replay_response(&RequestSignature::api("GET", "/login?token=abc123")).unwrap();
    assert_eq!(login.unwrap().body(), &json!({"ok": true}));
    let rows = harness.get_replay_response(&RequestSignature::database("select", query)).unwrap();
    assert_eq!(rows.unwrap().body(), &json!([{"id": 1}]));
}

#[test]
fn path_like_ids_cannot_reach_outside_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let outside = dir.path().join("outside.json");
    std::fs::write(&outside, "{}").unwrap();
    let harness = harness_at(&dir.path().join("store"));

    let id = "../../../outside";
    assert!(matches!(harness.delete_scenario(id), Err(HarnessError::ScenarioNotFound(_))));
    assert!(matches!(harness.load_scenario(id), Err(HarnessError::ScenarioNotFound(_))));
    assert!(outside.exists());
}

struct EchoExecutor;

impl ScenarioExecutor for EchoExecutor {
    fn execute<'a>(&'a self, interaction: &'a Interaction) -> ExecuteFuture<'a> {
        Box::pin(async move { Ok(Some(interaction.response())) })
    }
}

#[tokio::test]
async fn regression_on_empty_catalog_reports_zeros() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness_at(dir.path());
    let report = RegressionRunner::new(&EchoExecutor)
        .run(&harness, &[], &RegressionOptions::default())
        .await
        .unwrap();
    assert_eq!((report.total, report.passed, report.failed), (0, 0, 0));
    assert!(report.pass_rate.abs() < f64::EPSILON);
}

#[tokio::test]
async fn regression_report_is_saved_next_to_recordings() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness_at(dir.path());
    record_widgets(&harness, RecordingOptions::default());
    let perf = RecordingOptions { scenario_type: ScenarioType::Performance, ..RecordingOptions::default() };
    record_widgets(&harness, perf);

    let options = RegressionOptions { save_report: true, ..RegressionOptions::default() };
    let report = RegressionRunner::new(&EchoExecutor).run(&harness, &[], &options).await.unwrap();
    assert_eq!((report.total, report.passed), (1, 1));

    let saved: Value =
        serde_json::from_str(&std::fs::read_to_string(report.report_path.unwrap()).unwrap()).unwrap();
    assert_eq!(saved["passRate"], json!(100.0));
    assert_eq!(saved["results"][0]["executed"], json!(2));
}
