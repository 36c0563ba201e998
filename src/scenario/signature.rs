//! Request signatures used to match live requests to recorded interactions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::format::{Interaction, InteractionKind, InteractionPayload};
use super::sanitize;

/// The fields of a live request that identify the recorded interaction it
/// corresponds to.
///
/// Compare signatures through [`RequestSignature::canonical`]; the raw
/// fields keep whatever formatting the caller supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RequestSignature {
    /// Method plus exact URL.
    Api {
        /// HTTP method.
        method: String,
        /// Request URL.
        url: String,
    },
    /// Operation plus query text.
    Database {
        /// Operation name.
        operation: String,
        /// Query text.
        query: String,
    },
    /// Service plus endpoint.
    External {
        /// Service name.
        service: String,
        /// Endpoint on the service.
        endpoint: String,
    },
}

impl RequestSignature {
    /// Signature of an API request.
    pub fn api(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self::Api { method: method.into(), url: url.into() }
    }

    /// Signature of a database operation.
    pub fn database(operation: impl Into<String>, query: impl Into<String>) -> Self {
        Self::Database { operation: operation.into(), query: query.into() }
    }

    /// Signature of an external service call.
    pub fn external(service: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::External { service: service.into(), endpoint: endpoint.into() }
    }

    /// Signature under which a recorded interaction can be found.
    #[must_use]
    pub fn of(interaction: &Interaction) -> Self {
        match &interaction.payload {
            InteractionPayload::Api { request, .. } => Self::api(&request.method, &request.url),
            InteractionPayload::Database { operation, query, .. } => {
                Self::database(operation, query)
            }
            InteractionPayload::External { service, endpoint, .. } => {
                Self::external(service, endpoint)
            }
        }
    }

    /// The interaction kind this signature looks up.
    #[must_use]
    pub const fn kind(&self) -> InteractionKind {
        match self {
            Self::Api { .. } => InteractionKind::Api,
            Self::Database { .. } => InteractionKind::Database,
            Self::External { .. } => InteractionKind::External,
        }
    }

    /// Kind-specific canonical form.
    ///
    /// API methods are upper-cased and the URL is compared exactly;
    /// database query text is whitespace-collapsed and lower-cased;
    /// external signatures are compared verbatim. Secrets in URLs and query
    /// text are redacted first, the same way the recorder stores them.
    #[must_use]
    pub fn canonical(&self) -> Self {
        match self {
            Self::Api { method, url } => {
                Self::api(method.trim().to_ascii_uppercase(), sanitize::sanitize_url(url))
            }
            Self::Database { operation, query } => Self::database(
                operation.trim(),
                normalize_query(&sanitize::sanitize_query_text(query)),
            ),
            Self::External { .. } => self.clone(),
        }
    }
}

impl fmt::Display for RequestSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api { method, url } => write!(f, "api {method} {url}"),
            Self::Database { operation, query } => write!(f, "database {operation} {query}"),
            Self::External { service, endpoint } => write!(f, "external {service} {endpoint}"),
        }
    }
}

/// Collapses whitespace runs to single spaces and lower-cases the text.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
