//! Live executor that re-issues recorded API requests over HTTP.

use std::collections::BTreeMap;

use reqwest::{Client, Method};
use serde_json::Value;

use crate::error::HarnessError;
use crate::ports::executor::{ExecuteFuture, ScenarioExecutor};
use crate::scenario::format::{ApiRequest, ApiResponse, Interaction, InteractionPayload, ReplayedResponse};
use crate::scenario::sanitize::REDACTED;

/// Headers recomputed by the client rather than replayed.
const SKIPPED_HEADERS: [&str; 4] = ["host", "content-length", "connection", "transfer-encoding"];

/// Sends `api` interactions to a running system under test.
///
/// Database and external interactions are skipped; the system under test
/// is expected to obtain those from an active replay session.
pub struct HttpExecutor {
    client: Client,
    base_url: String,
}

impl HttpExecutor {
    /// Creates an executor targeting `base_url` (e.g. `http://localhost:8080`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    /// Absolute URL for a recorded request URL.
    ///
    /// Recorded absolute URLs are re-rooted onto the base URL, keeping only
    /// their path and query.
    #[must_use]
    pub fn target_url(&self, recorded: &str) -> String {
        let path = match recorded.find("://") {
            Some(scheme_end) => {
                let rest = &recorded[scheme_end + 3..];
                rest.find('/').map_or("/", |slash| &rest[slash..])
            }
            None => recorded,
        };
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, HarnessError> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| HarnessError::Execution(format!("invalid method {}: {e}", request.method)))?;
        let url = self.target_url(&request.url);

        let mut builder = self.client.request(method, &url);
        for (name, value) in &request.headers {
            let skipped = SKIPPED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name));
            if !skipped && value != REDACTED {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HarnessError::Execution(format!("request to {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| HarnessError::Execution(format!("failed to read response from {url}: {e}")))?;
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(ApiResponse { status, headers, body })
    }
}

impl ScenarioExecutor for HttpExecutor {
    fn execute<'a>(&'a self, interaction: &'a Interaction) -> ExecuteFuture<'a> {
        Box::pin(async move {
            match &interaction.payload {
                InteractionPayload::Api { request, .. } => {
                    let response = self.send(request).await?;
                    Ok(Some(ReplayedResponse::Api(response)))
                }
                InteractionPayload::Database { .. } | InteractionPayload::External { .. } => {
                    Ok(None)
                }
            }
        })
    }
}
