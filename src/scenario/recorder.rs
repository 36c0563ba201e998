//! Buffers sanitized interactions for a scenario being recorded.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::format::{
    ApiRequest, ApiResponse, Interaction, InteractionMetadata, InteractionPayload, Scenario,
    ScenarioType, Statistics,
};
use super::ids;
use super::sanitize;

/// Caller-chosen properties of a scenario being recorded.
#[derive(Debug, Clone, Default)]
pub struct RecordingOptions {
    /// Free-text description.
    pub description: String,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Scenario category.
    pub scenario_type: ScenarioType,
    /// Free-form metadata (environment, version, correlation identifiers).
    pub metadata: BTreeMap<String, Value>,
    /// Overrides the configured HTTP-archive export setting.
    pub export_har: Option<bool>,
}

/// In-memory buffer for one recording session.
///
/// Every payload is sanitized before it is appended. Timestamps are offsets
/// from `started_at` and never decrease.
#[derive(Debug)]
pub struct ScenarioRecorder {
    id: String,
    name: String,
    options: RecordingOptions,
    started_at: DateTime<Utc>,
    interactions: Vec<Interaction>,
    seen_ids: HashMap<String, usize>,
    last_timestamp: u64,
}

impl ScenarioRecorder {
    /// Opens a buffer for a scenario whose recording starts at `started_at`.
    pub fn new(name: impl Into<String>, options: RecordingOptions, started_at: DateTime<Utc>) -> Self {
        let name = name.into();
        let content = json!({
            "description": options.description,
            "type": options.scenario_type,
            "tags": options.tags,
            "metadata": options.metadata,
        });
        let id = ids::scenario_id(&name, started_at, &content);
        Self {
            id,
            name,
            options,
            started_at,
            interactions: Vec::new(),
            seen_ids: HashMap::new(),
            last_timestamp: 0,
        }
    }

    /// Identifier of the scenario being recorded.
    #[must_use]
    pub fn scenario_id(&self) -> &str {
        &self.id
    }

    /// Replaces the scenario id, for when the derived one is already taken.
    pub fn reassign_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// When recording started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Options the recording was started with.
    #[must_use]
    pub const fn options(&self) -> &RecordingOptions {
        &self.options
    }

    /// Number of buffered interactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Returns `true` if nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Records an inbound API exchange and returns its identifier.
    pub fn record_api(
        &mut self,
        request: &ApiRequest,
        response: &ApiResponse,
        metadata: InteractionMetadata,
        now: DateTime<Utc>,
    ) -> String {
        let payload = InteractionPayload::Api {
            request: sanitize::sanitize_request(request),
            response: sanitize::sanitize_response(response),
        };
        self.push(payload, metadata, now)
    }

    /// Records a database operation and returns its identifier.
    ///
    /// When the caller gives no row count and the result is an array, the
    /// array length is stored as the row count.
    pub fn record_database(
        &mut self,
        operation: &str,
        query: &str,
        parameters: &[Value],
        result: &Value,
        mut metadata: InteractionMetadata,
        now: DateTime<Utc>,
    ) -> String {
        if metadata.row_count.is_none() {
            metadata.row_count = result.as_array().map(|rows| rows.len() as u64);
        }
        let payload = InteractionPayload::Database {
            operation: operation.to_string(),
            query: sanitize::sanitize_query_text(query),
            parameters: parameters.iter().map(sanitize::sanitize_body).collect(),
            result: sanitize::sanitize_body(result),
        };
        self.push(payload, metadata, now)
    }

    /// Records an external service call and returns its identifier.
    pub fn record_external(
        &mut self,
        service: &str,
        endpoint: &str,
        request: &Value,
        response: &Value,
        metadata: InteractionMetadata,
        now: DateTime<Utc>,
    ) -> String {
        let payload = InteractionPayload::External {
            service: service.to_string(),
            endpoint: endpoint.to_string(),
            request: sanitize::sanitize_body(request),
            response: sanitize::sanitize_body(response),
        };
        self.push(payload, metadata, now)
    }

    fn push(
        &mut self,
        payload: InteractionPayload,
        metadata: InteractionMetadata,
        now: DateTime<Utc>,
    ) -> String {
        let base = ids::interaction_id(&payload);
        let occurrence = self.seen_ids.entry(base.clone()).or_insert(0);
        *occurrence += 1;
        let id = if *occurrence == 1 { base } else { format!("{base}-{occurrence}") };

        let offset = u64::try_from((now - self.started_at).num_milliseconds()).unwrap_or(0);
        let timestamp = offset.max(self.last_timestamp);
        self.last_timestamp = timestamp;

        self.interactions.push(Interaction { id: id.clone(), payload, timestamp, metadata });
        id
    }

    /// Freezes a copy of the buffer into a completed scenario.
    ///
    /// The buffer itself is left intact so a failed persist can be retried.
    #[must_use]
    pub fn snapshot(&self, completed_at: DateTime<Utc>) -> Scenario {
        let duration = u64::try_from((completed_at - self.started_at).num_milliseconds())
            .unwrap_or(0)
            .max(self.last_timestamp);
        Scenario {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.options.description.clone(),
            created_at: self.started_at,
            completed_at: Some(completed_at),
            duration,
            tags: self.options.tags.clone(),
            scenario_type: self.options.scenario_type,
            metadata: self.options.metadata.clone(),
            interactions: self.interactions.clone(),
            statistics: Statistics::from_interactions(&self.interactions),
        }
    }
}
