//! The Grafana Cloud access policy token resource.
//!
//! Token identity is the `{region}:{tokenId}` pair; older state written with
//! the `/` separator is still accepted on import. Everything but the display
//! name forces replacement, and the display name falls back to the token
//! name when blank.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{TokenPayload, TokenRequest, TokenUpdateRequest};
use crate::context::ProviderContext;
use crate::error::ProviderError;
use crate::ids::ResourceId;
use crate::provider::ResourceHandler;
use crate::schema::{Attribute, Schema, ValueValidator};

/// Composite ID of the access policy token resource.
pub const ACCESS_POLICY_TOKEN_ID: ResourceId =
    ResourceId::new("grafana_cloud_access_policy_token", &["region", "token_id"])
        .with_legacy_separator('/');

/// State model of an access policy token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AccessPolicyTokenModel {
    /// Composite `{region}:{tokenId}` ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// ID of the access policy the token belongs to.
    pub access_policy_id: String,
    /// Region of the access policy.
    pub region: String,
    /// Token name.
    pub name: String,
    /// Token display name; falls back to the name when blank.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// RFC 3339 expiration time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    /// The secret token value; only known after creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// RFC 3339 creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// RFC 3339 last-update time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Resolve the effective display name: the explicit one, or the name.
pub fn effective_display_name(model: &AccessPolicyTokenModel) -> String {
    match model.display_name.as_deref() {
        Some(display_name) if !display_name.is_empty() => display_name.to_string(),
        _ => model.name.clone(),
    }
}

/// Convert the state model to the create request payload.
pub fn to_client_model(model: &AccessPolicyTokenModel) -> Result<TokenRequest, ProviderError> {
    let expires_at = model
        .expires_at
        .as_deref()
        .map(|v| {
            DateTime::parse_from_rfc3339(v)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| {
                    ProviderError::Validation(format!("invalid expires_at \"{}\": {}", v, e))
                })
        })
        .transpose()?;

    Ok(TokenRequest {
        access_policy_id: model.access_policy_id.clone(),
        name: model.name.clone(),
        display_name: Some(effective_display_name(model)),
        expires_at,
    })
}

/// Convert an API payload to the state model.
///
/// The secret token value is never returned by reads, so the caller passes
/// whatever is already known (the create response, or prior state).
pub fn to_state_model(
    region: &str,
    payload: &TokenPayload,
    token: Option<String>,
) -> AccessPolicyTokenModel {
    AccessPolicyTokenModel {
        id: Some(ACCESS_POLICY_TOKEN_ID.make(&[region, &payload.id])),
        access_policy_id: payload.access_policy_id.clone(),
        region: region.to_string(),
        name: payload.name.clone(),
        display_name: if payload.display_name.is_empty() {
            Some(payload.name.clone())
        } else {
            Some(payload.display_name.clone())
        },
        expires_at: payload.expires_at.map(format_time),
        token,
        created_at: payload.created_at.map(format_time),
        updated_at: payload.updated_at.map(format_time),
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The access policy token resource.
pub struct AccessPolicyTokenResource;

#[async_trait::async_trait]
impl ResourceHandler for AccessPolicyTokenResource {
    fn type_name(&self) -> &'static str {
        "grafana_cloud_access_policy_token"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "access_policy_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("ID of the access policy for which to create a token."),
            )
            .with_attribute(
                "region",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(ValueValidator::NonEmpty)
                    .with_description("Region of the access policy. Should be set to the same region as the access policy."),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Name of the access policy token."),
            )
            .with_attribute(
                "display_name",
                Attribute::optional_string()
                    .with_description("Display name of the access policy token. Defaults to the name."),
            )
            .with_attribute(
                "expires_at",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("Expiration date of the access policy token. Does not expire by default.")
                    .with_validator(ValueValidator::Rfc3339Timestamp),
            )
            .with_attribute("token", Attribute::computed_string().sensitive())
            .with_attribute(
                "created_at",
                Attribute::computed_string()
                    .with_description("Creation date of the access policy token."),
            )
            .with_attribute(
                "updated_at",
                Attribute::computed_string()
                    .with_description("Last update date of the access policy token."),
            )
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let model: AccessPolicyTokenModel = serde_json::from_value(planned)?;
        let payload = ctx
            .cloud()?
            .create_token(&model.region, &to_client_model(&model)?)
            .await?;
        let token = payload.token.clone();
        Ok(serde_json::to_value(to_state_model(
            &model.region,
            &payload,
            token,
        ))?)
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let model: AccessPolicyTokenModel = serde_json::from_value(state)?;
        let id = model
            .id
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidId("token has no ID in state".to_string()))?;
        let parts = ACCESS_POLICY_TOKEN_ID.split(id)?;
        let (region, token_id) = (&parts[0], &parts[1]);

        let payload = ctx.cloud()?.token(region, token_id).await?;
        // The secret is never re-read; keep what state already has
        Ok(Some(serde_json::to_value(to_state_model(
            region,
            &payload,
            model.token.clone(),
        ))?))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior_model: AccessPolicyTokenModel = serde_json::from_value(prior)?;
        let id = prior_model
            .id
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidId("token has no ID in state".to_string()))?;
        let parts = ACCESS_POLICY_TOKEN_ID.split(id)?;
        let (region, token_id) = (&parts[0], &parts[1]);

        let planned_model: AccessPolicyTokenModel = serde_json::from_value(planned)?;
        let client = ctx.cloud()?;
        client
            .update_token(
                region,
                token_id,
                &TokenUpdateRequest {
                    display_name: effective_display_name(&planned_model),
                },
            )
            .await?;

        let payload = client.token(region, token_id).await?;
        Ok(serde_json::to_value(to_state_model(
            region,
            &payload,
            prior_model.token.clone(),
        ))?)
    }

    async fn delete(&self, ctx: &ProviderContext, state: Value) -> Result<(), ProviderError> {
        let model: AccessPolicyTokenModel = serde_json::from_value(state)?;
        let id = model
            .id
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidId("token has no ID in state".to_string()))?;
        let parts = ACCESS_POLICY_TOKEN_ID.split(id)?;
        ctx.cloud()?.delete_token(&parts[0], &parts[1]).await
    }

    async fn import(&self, ctx: &ProviderContext, id: &str) -> Result<Value, ProviderError> {
        let parts = ACCESS_POLICY_TOKEN_ID.split(id)?;
        let (region, token_id) = (&parts[0], &parts[1]);
        let payload = ctx.cloud()?.token(region, token_id).await?;
        Ok(serde_json::to_value(to_state_model(region, &payload, None))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> TokenPayload {
        TokenPayload {
            id: "token-1".to_string(),
            access_policy_id: "policy-1".to_string(),
            name: "ci".to_string(),
            display_name: "CI".to_string(),
            token: None,
            created_at: Some("2024-03-01T10:00:00Z".parse().unwrap()),
            updated_at: None,
            expires_at: Some("2025-03-01T10:00:00Z".parse().unwrap()),
        }
    }

    #[test]
    fn test_state_round_trip() {
        let state = to_state_model("eu", &sample_payload(), Some("secret".to_string()));
        assert_eq!(state.id.as_deref(), Some("eu:token-1"));
        assert_eq!(state.region, "eu");
        assert_eq!(state.expires_at.as_deref(), Some("2025-03-01T10:00:00Z"));

        // state -> client request keeps every config-driven field
        let request = to_client_model(&state).unwrap();
        assert_eq!(request.access_policy_id, "policy-1");
        assert_eq!(request.name, "ci");
        assert_eq!(request.display_name.as_deref(), Some("CI"));
        assert_eq!(
            request.expires_at,
            sample_payload().expires_at,
        );
    }

    #[test]
    fn test_display_name_falls_back_to_name() {
        let model = AccessPolicyTokenModel {
            name: "ci".to_string(),
            display_name: None,
            ..Default::default()
        };
        assert_eq!(effective_display_name(&model), "ci");

        let model = AccessPolicyTokenModel {
            name: "ci".to_string(),
            display_name: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(effective_display_name(&model), "ci");

        let mut payload = sample_payload();
        payload.display_name = String::new();
        let state = to_state_model("eu", &payload, None);
        assert_eq!(state.display_name.as_deref(), Some("ci"));
    }

    #[test]
    fn test_invalid_expires_at_rejected() {
        let model = AccessPolicyTokenModel {
            expires_at: Some("next week".to_string()),
            ..Default::default()
        };
        let err = to_client_model(&model).unwrap_err();
        assert!(err.to_string().contains("expires_at"));
    }

    #[test]
    fn test_import_id_formats() {
        assert_eq!(
            ACCESS_POLICY_TOKEN_ID.split("eu:token-1").unwrap(),
            vec!["eu", "token-1"]
        );
        // Legacy separator still accepted
        assert_eq!(
            ACCESS_POLICY_TOKEN_ID.split("eu/token-1").unwrap(),
            vec!["eu", "token-1"]
        );
        assert!(ACCESS_POLICY_TOKEN_ID.split("missing-separator").is_err());
    }
}
