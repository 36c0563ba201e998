//! HTTP-archive (HAR 1.2) export and import of API interactions.
//!
//! Only `api` interactions have an HTTP shape, so the archive is a subset of
//! the native scenario document.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::format::{ApiRequest, ApiResponse, InteractionMetadata, InteractionPayload, Scenario};
use super::recorder::{RecordingOptions, ScenarioRecorder};

const HAR_VERSION: &str = "1.2";
const HTTP_VERSION: &str = "HTTP/1.1";
const JSON_MIME: &str = "application/json";

/// Top-level archive document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarDocument {
    /// The archive log.
    pub log: HarLog,
}

/// Archive log with creator information and entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarLog {
    /// Format version.
    pub version: String,
    /// Producing tool.
    pub creator: HarCreator,
    /// One entry per API exchange.
    #[serde(default)]
    pub entries: Vec<HarEntry>,
    /// Free-text comment; the export stores the scenario name here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Producing tool name and version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarCreator {
    /// Tool name.
    pub name: String,
    /// Tool version.
    pub version: String,
}

/// A single request/response exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    /// Absolute start time of the exchange.
    pub started_date_time: DateTime<Utc>,
    /// Elapsed time in milliseconds.
    pub time: f64,
    /// The request.
    pub request: HarRequest,
    /// The response.
    pub response: HarResponse,
    /// Cache details (always empty).
    #[serde(default)]
    pub cache: Value,
    /// Phase timings.
    #[serde(default)]
    pub timings: HarTimings,
    /// Identifier of the source interaction.
    #[serde(rename = "_interactionId", default, skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<String>,
}

/// Name/value pair used for headers and query strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarNameValue {
    /// Name.
    pub name: String,
    /// Value.
    pub value: String,
}

/// Archive request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    /// HTTP method.
    pub method: String,
    /// Request URL.
    pub url: String,
    /// HTTP version.
    pub http_version: String,
    /// Request headers.
    #[serde(default)]
    pub headers: Vec<HarNameValue>,
    /// Query parameters.
    #[serde(default)]
    pub query_string: Vec<HarNameValue>,
    /// Request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<HarPostData>,
    /// Header size in bytes, `-1` when unknown.
    pub headers_size: i64,
    /// Body size in bytes, `-1` when unknown.
    pub body_size: i64,
}

/// Archive request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPostData {
    /// Body MIME type.
    pub mime_type: String,
    /// Body text.
    pub text: String,
}

/// Archive response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase.
    #[serde(default)]
    pub status_text: String,
    /// HTTP version.
    pub http_version: String,
    /// Response headers.
    #[serde(default)]
    pub headers: Vec<HarNameValue>,
    /// Response body.
    pub content: HarContent,
    /// Redirect target, empty when none.
    #[serde(default, rename = "redirectURL")]
    pub redirect_url: String,
    /// Header size in bytes, `-1` when unknown.
    pub headers_size: i64,
    /// Body size in bytes, `-1` when unknown.
    pub body_size: i64,
}

/// Archive response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarContent {
    /// Body length in bytes.
    pub size: i64,
    /// Body MIME type.
    pub mime_type: String,
    /// Body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Phase timings in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarTimings {
    /// Time to send the request.
    pub send: f64,
    /// Time waiting for the response.
    pub wait: f64,
    /// Time to read the response.
    pub receive: f64,
}

/// Builds an archive from the scenario's `api` interactions.
///
/// Each entry starts at `created_at` plus the interaction's relative
/// timestamp, so relative timing survives the export.
#[must_use]
pub fn export(scenario: &Scenario) -> HarDocument {
    let entries = scenario
        .interactions
        .iter()
        .filter_map(|interaction| {
            let InteractionPayload::Api { request, response } = &interaction.payload else {
                return None;
            };
            let started = scenario.created_at
                + Duration::milliseconds(i64::try_from(interaction.timestamp).unwrap_or(i64::MAX));
            #[allow(clippy::cast_precision_loss)]
            let time = interaction.metadata.duration_ms.unwrap_or(0) as f64;
            Some(HarEntry {
                started_date_time: started,
                time,
                request: export_request(request),
                response: export_response(response),
                cache: Value::Object(serde_json::Map::new()),
                timings: HarTimings { send: 0.0, wait: time, receive: 0.0 },
                interaction_id: Some(interaction.id.clone()),
            })
        })
        .collect();

    HarDocument {
        log: HarLog {
            version: HAR_VERSION.to_string(),
            creator: HarCreator {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            entries,
            comment: Some(scenario.name.clone()),
        },
    }
}

/// Rebuilds a scenario from an archive.
///
/// Entries are sanitized and re-identified exactly as live recordings are;
/// the earliest `startedDateTime` becomes the scenario's creation time, or
/// `now` when the archive has no entries.
#[must_use]
pub fn import(
    document: &HarDocument,
    name: &str,
    options: RecordingOptions,
    now: DateTime<Utc>,
) -> Scenario {
    let mut entries: Vec<&HarEntry> = document.log.entries.iter().collect();
    entries.sort_by_key(|entry| entry.started_date_time);

    let started_at = entries.first().map_or(now, |entry| entry.started_date_time);
    let mut recorder = ScenarioRecorder::new(name, options, started_at);
    let mut completed_at = started_at;

    for entry in entries {
        let request = import_request(&entry.request);
        let response = import_response(&entry.response);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let duration_ms = entry.time.max(0.0).round() as u64;
        recorder.record_api(
            &request,
            &response,
            InteractionMetadata::with_duration(duration_ms),
            entry.started_date_time,
        );
        let finished = entry.started_date_time
            + Duration::milliseconds(i64::try_from(duration_ms).unwrap_or(0));
        completed_at = completed_at.max(finished);
    }

    recorder.snapshot(completed_at)
}

fn export_request(request: &ApiRequest) -> HarRequest {
    let post_data = request.body.as_ref().map(|body| {
        let (mime_type, text) = body_content(body, &request.headers);
        HarPostData { mime_type, text }
    });
    let body_size = post_data.as_ref().map_or(0, |p| i64::try_from(p.text.len()).unwrap_or(-1));
    HarRequest {
        method: request.method.clone(),
        url: request.url.clone(),
        http_version: HTTP_VERSION.to_string(),
        headers: pairs(&request.headers),
        query_string: pairs(&request.query),
        post_data,
        headers_size: -1,
        body_size,
    }
}

fn export_response(response: &ApiResponse) -> HarResponse {
    let (mime_type, text) = body_content(&response.body, &response.headers);
    let size = i64::try_from(text.len()).unwrap_or(-1);
    HarResponse {
        status: response.status,
        status_text: reqwest::StatusCode::from_u16(response.status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_string(),
        http_version: HTTP_VERSION.to_string(),
        headers: pairs(&response.headers),
        content: HarContent { size, mime_type, text: Some(text) },
        redirect_url: String::new(),
        headers_size: -1,
        body_size: size,
    }
}

fn import_request(request: &HarRequest) -> ApiRequest {
    ApiRequest {
        method: request.method.clone(),
        url: request.url.clone(),
        headers: map(&request.headers),
        query: map(&request.query_string),
        body: request.post_data.as_ref().map(|p| parse_body(&p.mime_type, &p.text)),
    }
}

fn import_response(response: &HarResponse) -> ApiResponse {
    ApiResponse {
        status: response.status,
        headers: map(&response.headers),
        body: response
            .content
            .text
            .as_deref()
            .map_or(Value::Null, |text| parse_body(&response.content.mime_type, text)),
    }
}

fn pairs(map: &BTreeMap<String, String>) -> Vec<HarNameValue> {
    map.iter().map(|(name, value)| HarNameValue { name: name.clone(), value: value.clone() }).collect()
}

fn map(pairs: &[HarNameValue]) -> BTreeMap<String, String> {
    pairs.iter().map(|p| (p.name.clone(), p.value.clone())).collect()
}

fn content_type(headers: &BTreeMap<String, String>) -> String {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .map_or_else(|| JSON_MIME.to_string(), |(_, value)| value.clone())
}

fn is_json(mime_type: &str) -> bool {
    mime_type.to_ascii_lowercase().contains("json")
}

/// Mime type and text for an archived body.
///
/// Strings under a non-JSON content type are written raw; everything else
/// is written as JSON text under a JSON mime type, so `parse_body` restores
/// the same value.
fn body_content(body: &Value, headers: &BTreeMap<String, String>) -> (String, String) {
    let mime_type = content_type(headers);
    match body {
        Value::Null => (mime_type, String::new()),
        Value::String(text) if !is_json(&mime_type) => (mime_type, text.clone()),
        other if is_json(&mime_type) => (mime_type, other.to_string()),
        other => (JSON_MIME.to_string(), other.to_string()),
    }
}

fn parse_body(mime_type: &str, text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    if !is_json(mime_type) {
        return Value::String(text.to_string());
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
