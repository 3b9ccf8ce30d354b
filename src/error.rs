//! Error types for the Grafana provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors that can occur while handling a resource or data source operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested remote object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A provider configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A composite resource ID could not be parsed.
    #[error("Invalid resource ID: {0}")]
    InvalidId(String),

    /// The vendor API returned a non-success status.
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code returned by the API.
        status: u16,
        /// Response body or status text, preserved verbatim.
        message: String,
    },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An HTTP transport error occurred.
    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The operation is not supported by this resource.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// Whether this error means the remote object does not exist.
    ///
    /// Reads treat this as "drop the resource from state" and deletes treat
    /// it as already-deleted.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Api { status: 404, .. })
    }

    /// Convert this error into a single error diagnostic.
    pub fn into_diagnostic(self) -> Diagnostic {
        Diagnostic::error(self.to_string())
    }
}
