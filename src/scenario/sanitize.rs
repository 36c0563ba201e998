//! Secret redaction applied to every payload before it is buffered.
//!
//! All functions are pure and idempotent: running a sanitized payload
//! through them again yields the same payload.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::format::{ApiRequest, ApiResponse};

/// Replacement written in place of any redacted value.
pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_HEADERS: [&str; 4] = ["authorization", "cookie", "api-key", "auth-token"];
const SENSITIVE_FIELDS: [&str; 5] = ["password", "token", "secret", "key", "auth"];

fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

fn is_sensitive_field(name: &str) -> bool {
    SENSITIVE_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(name))
}

fn query_literal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(password|token)(\s*=\s*)'[^']*'")
            .expect("query redaction pattern is valid")
    })
}

/// Redacts deny-listed headers; all other headers pass through unchanged.
#[must_use]
pub fn sanitize_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive_header(name) { REDACTED.to_string() } else { value.clone() };
            (name.clone(), value)
        })
        .collect()
}

/// Redacts deny-listed query parameters.
#[must_use]
pub fn sanitize_query_params(params: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    params
        .iter()
        .map(|(name, value)| {
            let value = if is_sensitive_field(name) { REDACTED.to_string() } else { value.clone() };
            (name.clone(), value)
        })
        .collect()
}

/// Redacts deny-listed fields at every depth of a structured body.
///
/// Objects nested inside objects or arrays are recursed into; a deny-listed
/// field is replaced wholesale, whatever its value.
#[must_use]
pub fn sanitize_body(body: &Value) -> Value {
    match body {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let value = if is_sensitive_field(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        sanitize_body(value)
                    };
                    (key.clone(), value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_body).collect()),
        other => other.clone(),
    }
}

/// Replaces `password = '...'` and `token = '...'` literals in query text.
#[must_use]
pub fn sanitize_query_text(query: &str) -> String {
    query_literal_pattern().replace_all(query, format!("${{1}}${{2}}'{REDACTED}'")).into_owned()
}

/// Redacts deny-listed keys in the query string of a URL.
///
/// The path, parameter order, and any fragment are kept as given.
#[must_use]
pub fn sanitize_url(url: &str) -> String {
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };
    let Some((path, query)) = base.split_once('?') else {
        return url.to_string();
    };
    let pairs: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if is_sensitive_field(name) => format!("{name}={REDACTED}"),
            _ => pair.to_string(),
        })
        .collect();
    let mut out = format!("{path}?{}", pairs.join("&"));
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

/// Sanitizes an inbound API request.
#[must_use]
pub fn sanitize_request(request: &ApiRequest) -> ApiRequest {
    ApiRequest {
        method: request.method.clone(),
        url: sanitize_url(&request.url),
        headers: sanitize_headers(&request.headers),
        query: sanitize_query_params(&request.query),
        body: request.body.as_ref().map(sanitize_body),
    }
}

/// Sanitizes an API response.
#[must_use]
pub fn sanitize_response(response: &ApiResponse) -> ApiResponse {
    ApiResponse {
        status: response.status,
        headers: sanitize_headers(&response.headers),
        body: sanitize_body(&response.body),
    }
}
