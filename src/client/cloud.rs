//! Client for the Grafana Cloud API.
//!
//! Access-policy token operations are region-scoped: every call carries a
//! `region` query parameter, and mutating calls attach an `X-Request-Id`
//! header so retried requests can be correlated server-side.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::error::ProviderError;

/// Request payload for creating an access-policy token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// ID of the access policy the token belongs to.
    pub access_policy_id: String,
    /// Token name.
    pub name: String,
    /// Token display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Expiration timestamp; the token does not expire when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request payload for updating an access-policy token.
///
/// Only the display name is mutable; everything else forces replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUpdateRequest {
    /// New display name.
    pub display_name: String,
}

/// An access-policy token as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenPayload {
    /// Token ID.
    pub id: String,
    /// ID of the access policy the token belongs to.
    pub access_policy_id: String,
    /// Token name.
    pub name: String,
    /// Token display name.
    pub display_name: String,
    /// The secret token value; only returned on creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Creation timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Expiration timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Client for the Grafana Cloud API.
#[derive(Debug, Clone)]
pub struct CloudClient {
    api: ApiClient,
}

impl CloudClient {
    /// Wrap an [`ApiClient`] pointed at the Grafana Cloud API.
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Create an access-policy token in the given region.
    pub async fn create_token(
        &self,
        region: &str,
        request: &TokenRequest,
    ) -> Result<TokenPayload, ProviderError> {
        self.api
            .post_json(
                "/api/v1/tokens",
                &[("region", region.to_string())],
                &[("X-Request-Id", request_id())],
                serde_json::to_value(request)?,
            )
            .await
    }

    /// Fetch an access-policy token by ID.
    pub async fn token(&self, region: &str, id: &str) -> Result<TokenPayload, ProviderError> {
        self.api
            .get_json(
                &format!("/api/v1/tokens/{}", id),
                &[("region", region.to_string())],
            )
            .await
    }

    /// Update the display name of an access-policy token.
    pub async fn update_token(
        &self,
        region: &str,
        id: &str,
        request: &TokenUpdateRequest,
    ) -> Result<TokenPayload, ProviderError> {
        self.api
            .post_json(
                &format!("/api/v1/tokens/{}", id),
                &[("region", region.to_string())],
                &[("X-Request-Id", request_id())],
                serde_json::to_value(request)?,
            )
            .await
    }

    /// Delete an access-policy token.
    pub async fn delete_token(&self, region: &str, id: &str) -> Result<(), ProviderError> {
        self.api
            .delete(
                &format!("/api/v1/tokens/{}", id),
                &[("region", region.to_string())],
                &[("X-Request-Id", request_id())],
            )
            .await
    }
}

/// A process-unique request ID for mutating cloud API calls.
fn request_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!(
        "tf-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_request_serialization() {
        let request = TokenRequest {
            access_policy_id: "policy-1".to_string(),
            name: "ci-token".to_string(),
            display_name: Some("CI Token".to_string()),
            expires_at: None,
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(
            encoded,
            json!({
                "accessPolicyId": "policy-1",
                "name": "ci-token",
                "displayName": "CI Token",
            })
        );
    }

    #[test]
    fn test_token_payload_timestamps() {
        let payload: TokenPayload = serde_json::from_value(json!({
            "id": "token-1",
            "accessPolicyId": "policy-1",
            "name": "ci-token",
            "displayName": "CI Token",
            "createdAt": "2024-03-01T10:00:00Z",
        }))
        .unwrap();
        assert_eq!(payload.id, "token-1");
        assert!(payload.created_at.is_some());
        assert!(payload.updated_at.is_none());
        assert!(payload.expires_at.is_none());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = request_id();
        let b = request_id();
        assert_ne!(a, b);
    }
}
