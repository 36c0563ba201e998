//! Content-derived identifiers for scenarios and interactions.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::format::InteractionPayload;
use super::signature::normalize_query;

/// First six bytes of the SHA-256 digest, hex encoded.
#[must_use]
pub fn short_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(12);
    for b in &digest[..6] {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Lower-case slug of a scenario name, safe for file names.
#[must_use]
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed: String = out.trim_matches('-').chars().take(40).collect();
    let trimmed = trimmed.trim_end_matches('-');
    if trimmed.is_empty() {
        "scenario".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Identifier for a new scenario: name slug, creation millis, and a hash of
/// the descriptive content.
#[must_use]
pub fn scenario_id(name: &str, created_at: DateTime<Utc>, content: &Value) -> String {
    let millis = created_at.timestamp_millis();
    let material = json!({ "name": name, "createdAt": millis, "content": content });
    let bytes = serde_json::to_vec(&material).unwrap_or_default();
    format!("{}-{millis}-{}", slug(name), &short_hash(&bytes)[..8])
}

/// Identifier for an interaction: its kind plus a hash of the canonical
/// distinguishing fields and request content.
///
/// Identical traffic always yields the same identifier; the recorder adds an
/// ordinal suffix when the same identifier repeats within one scenario.
#[must_use]
pub fn interaction_id(payload: &InteractionPayload) -> String {
    let canonical = match payload {
        InteractionPayload::Api { request, .. } => json!({
            "method": request.method.to_ascii_uppercase(),
            "url": request.url,
            "body": request.body,
        }),
        InteractionPayload::Database { operation, query, parameters, .. } => json!({
            "operation": operation,
            "query": normalize_query(query),
            "parameters": parameters,
        }),
        InteractionPayload::External { service, endpoint, request, .. } => json!({
            "service": service,
            "endpoint": endpoint,
            "request": request,
        }),
    };
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    format!("{}-{}", payload.kind(), short_hash(&bytes))
}
