//! Scenario document data structures.
//!
//! These types serialize to the native scenario JSON document:
//! `{id, name, description, createdAt, completedAt, duration, tags, type,
//! metadata, interactions, statistics}`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The three interaction kinds a scenario can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    /// Inbound API call handled by the service.
    Api,
    /// Outbound database operation.
    Database,
    /// Outbound call to an external service.
    External,
}

impl InteractionKind {
    /// All kinds, in catalog order.
    pub const ALL: [Self; 3] = [Self::Api, Self::Database, Self::External];

    /// Lower-case name used in documents and directory names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Database => "database",
            Self::External => "external",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown interaction kind: {s}"))
    }
}

/// Scenario category; also the subdirectory the document is stored under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioType {
    /// Replayed by default in regression runs.
    #[default]
    Regression,
    /// Cross-component fixture.
    Integration,
    /// Timing-focused fixture.
    Performance,
}

impl ScenarioType {
    /// All scenario types, in directory order.
    pub const ALL: [Self; 3] = [Self::Regression, Self::Integration, Self::Performance];

    /// Lower-case name used in documents and directory names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regression => "regression",
            Self::Integration => "integration",
            Self::Performance => "performance",
        }
    }
}

impl fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ScenarioType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown scenario type: {s}"))
    }
}

/// An inbound HTTP request as seen by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: String,
    /// Request URL exactly as received (path plus optional query string).
    pub url: String,
    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Parsed query parameters.
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    /// Request body, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Creates a request with no headers, query, or body.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self { method: method.into(), url: url.into(), ..Self::default() }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// The service's response to an [`ApiRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Response body.
    #[serde(default)]
    pub body: Value,
}

impl ApiResponse {
    /// Creates a response with the given status and body and no headers.
    #[must_use]
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, headers: BTreeMap::new(), body }
    }
}

/// Kind-specific content of an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InteractionPayload {
    /// An inbound API exchange.
    Api {
        /// Request received.
        request: ApiRequest,
        /// Response returned.
        response: ApiResponse,
    },
    /// A database operation.
    Database {
        /// Operation name (e.g. `select`, `insert`, `rpc`).
        operation: String,
        /// Query text, already sanitized.
        query: String,
        /// Bound parameters.
        #[serde(default)]
        parameters: Vec<Value>,
        /// Operation result.
        result: Value,
    },
    /// A call to an external service.
    External {
        /// Service name (e.g. `notion`, `xero`).
        service: String,
        /// Endpoint invoked on the service.
        endpoint: String,
        /// Request payload.
        request: Value,
        /// Response payload.
        response: Value,
    },
}

impl InteractionPayload {
    /// The interaction kind of this payload.
    #[must_use]
    pub const fn kind(&self) -> InteractionKind {
        match self {
            Self::Api { .. } => InteractionKind::Api,
            Self::Database { .. } => InteractionKind::Database,
            Self::External { .. } => InteractionKind::External,
        }
    }
}

/// Metadata attached to an interaction by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionMetadata {
    /// Time the exchange took, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Correlation identifier propagated by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Trace identifier propagated by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Rows returned or affected (database interactions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    /// Any other caller-supplied fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl InteractionMetadata {
    /// Metadata carrying only a duration.
    #[must_use]
    pub fn with_duration(duration_ms: u64) -> Self {
        Self { duration_ms: Some(duration_ms), ..Self::default() }
    }
}

/// One recorded exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Content-derived identifier.
    pub id: String,
    /// Kind tag and kind-specific fields.
    #[serde(flatten)]
    pub payload: InteractionPayload,
    /// Offset from the recording start, in milliseconds.
    pub timestamp: u64,
    /// Caller metadata.
    #[serde(default)]
    pub metadata: InteractionMetadata,
}

impl Interaction {
    /// The interaction kind.
    #[must_use]
    pub const fn kind(&self) -> InteractionKind {
        self.payload.kind()
    }

    /// The recorded response or result, in replayable form.
    #[must_use]
    pub fn response(&self) -> ReplayedResponse {
        match &self.payload {
            InteractionPayload::Api { response, .. } => ReplayedResponse::Api(response.clone()),
            InteractionPayload::Database { result, .. } => ReplayedResponse::Database(result.clone()),
            InteractionPayload::External { response, .. } => {
                ReplayedResponse::External(response.clone())
            }
        }
    }
}

/// A recorded response handed back during replay, or produced by an executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "response", rename_all = "lowercase")]
pub enum ReplayedResponse {
    /// Full API response (status, headers, body).
    Api(ApiResponse),
    /// Database result.
    Database(Value),
    /// External service response payload.
    External(Value),
}

impl ReplayedResponse {
    /// The response body (API) or the result value (database, external).
    #[must_use]
    pub const fn body(&self) -> &Value {
        match self {
            Self::Api(response) => &response.body,
            Self::Database(value) | Self::External(value) => value,
        }
    }

    /// The interaction kind this response belongs to.
    #[must_use]
    pub const fn kind(&self) -> InteractionKind {
        match self {
            Self::Api(_) => InteractionKind::Api,
            Self::Database(_) => InteractionKind::Database,
            Self::External(_) => InteractionKind::External,
        }
    }
}

/// Aggregate counts and timings over a scenario's interactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// Number of interactions.
    pub total: usize,
    /// Interaction count keyed by kind name.
    pub by_type: BTreeMap<String, usize>,
    /// Mean of the interactions' `durationMs`, zero when none were recorded.
    pub avg_duration: f64,
    /// Sum of the interactions' `durationMs`.
    pub total_duration: u64,
}

impl Statistics {
    /// Computes statistics over the given interactions.
    #[must_use]
    pub fn from_interactions(interactions: &[Interaction]) -> Self {
        let mut by_type: BTreeMap<String, usize> =
            InteractionKind::ALL.iter().map(|k| (k.as_str().to_string(), 0)).collect();
        let mut total_duration = 0u64;
        for interaction in interactions {
            *by_type.entry(interaction.kind().as_str().to_string()).or_default() += 1;
            total_duration += interaction.metadata.duration_ms.unwrap_or(0);
        }
        let total = interactions.len();
        #[allow(clippy::cast_precision_loss)]
        let avg_duration = if total == 0 { 0.0 } else { total_duration as f64 / total as f64 };
        Self { total, by_type, avg_duration, total_duration }
    }
}

/// A named, persisted collection of recorded interactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    /// Unique identifier derived from name, creation time, and a content hash.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// When recording started.
    pub created_at: DateTime<Utc>,
    /// When recording stopped.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Recording length in milliseconds.
    #[serde(default)]
    pub duration: u64,
    /// Free-form labels.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Scenario category.
    #[serde(rename = "type", default)]
    pub scenario_type: ScenarioType,
    /// Free-form metadata (environment, version, correlation identifiers).
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    /// Interactions in ascending timestamp order.
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    /// Aggregates over `interactions`.
    #[serde(default)]
    pub statistics: Statistics,
}

impl Scenario {
    /// Lightweight projection without interaction bodies.
    #[must_use]
    pub fn summary(&self) -> ScenarioSummary {
        ScenarioSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            scenario_type: self.scenario_type,
            tags: self.tags.clone(),
            created_at: self.created_at,
            duration: self.duration,
            interaction_count: self.interactions.len(),
        }
    }
}

/// Catalog entry for a stored scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSummary {
    /// Scenario identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Scenario category.
    #[serde(rename = "type")]
    pub scenario_type: ScenarioType,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// When recording started.
    pub created_at: DateTime<Utc>,
    /// Recording length in milliseconds.
    pub duration: u64,
    /// Number of recorded interactions.
    pub interaction_count: usize,
}
