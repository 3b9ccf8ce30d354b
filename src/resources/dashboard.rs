//! The dashboard resource.
//!
//! The dashboard model is managed as a JSON string. Server-assigned fields
//! (`id`, `version`) are stripped before comparison and storage so state
//! stays stable across refreshes. When the provider is configured with
//! `store_dashboard_sha256`, only the digest of the normalized model is kept
//! in state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::context::ProviderContext;
use crate::error::ProviderError;
use crate::provider::ResourceHandler;
use crate::schema::{Attribute, Diagnostic, Schema};

/// State model of a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DashboardModel {
    /// The dashboard UID (doubles as the resource ID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The dashboard UID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// The numerical dashboard ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_id: Option<i64>,
    /// UID of the folder holding the dashboard; General when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// The dashboard model JSON, or its sha256 digest when the provider
    /// stores digests.
    pub config_json: String,
    /// URL path of the dashboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Version of the dashboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

/// Parse dashboard JSON and strip server-assigned fields.
pub fn normalize_dashboard_json(config_json: &str) -> Result<Value, ProviderError> {
    let mut model: Value = serde_json::from_str(config_json)
        .map_err(|e| ProviderError::Validation(format!("config_json is not valid JSON: {}", e)))?;
    let obj = model.as_object_mut().ok_or_else(|| {
        ProviderError::Validation("config_json must be a JSON object".to_string())
    })?;
    obj.remove("id");
    obj.remove("version");
    Ok(model)
}

/// Render the state representation of a dashboard model.
pub fn stored_config_json(model: &Value, store_sha256: bool) -> String {
    let rendered = model.to_string();
    if store_sha256 {
        hex::encode(Sha256::digest(rendered.as_bytes()))
    } else {
        rendered
    }
}

/// The dashboard resource.
pub struct DashboardResource;

impl DashboardResource {
    async fn read_by_uid(
        &self,
        ctx: &ProviderContext,
        uid: &str,
        folder_override: Option<String>,
    ) -> Result<Value, ProviderError> {
        let response = ctx.grafana()?.dashboard_by_uid(uid).await?;
        let normalized = {
            let mut model = response.dashboard.clone();
            if let Some(obj) = model.as_object_mut() {
                obj.remove("id");
                obj.remove("version");
            }
            model
        };

        let version = response
            .dashboard
            .get("version")
            .and_then(Value::as_i64);
        let dashboard_id = response.dashboard.get("id").and_then(Value::as_i64);
        let folder = folder_override.or_else(|| {
            if response.meta.folder_uid.is_empty() {
                None
            } else {
                Some(response.meta.folder_uid.clone())
            }
        });

        let model = DashboardModel {
            id: Some(uid.to_string()),
            uid: Some(uid.to_string()),
            dashboard_id,
            folder,
            config_json: stored_config_json(
                &normalized,
                ctx.config().store_dashboard_sha256,
            ),
            url: Some(response.meta.url),
            version,
        };
        Ok(serde_json::to_value(model)?)
    }
}

#[async_trait::async_trait]
impl ResourceHandler for DashboardResource {
    fn type_name(&self) -> &'static str {
        "grafana_dashboard"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "uid",
                Attribute::computed_string().with_description("The unique identifier of the dashboard."),
            )
            .with_attribute(
                "dashboard_id",
                Attribute::computed_int64().with_description("The numerical ID of the dashboard."),
            )
            .with_attribute(
                "config_json",
                Attribute::required_string()
                    .with_description("The complete dashboard model JSON."),
            )
            .with_attribute(
                "folder",
                Attribute::optional_string()
                    .with_description("The UID of the folder to save the dashboard in."),
            )
            .with_attribute(
                "url",
                Attribute::computed_string()
                    .with_description("The full URL of the dashboard."),
            )
            .with_attribute(
                "version",
                Attribute::computed_int64()
                    .with_description("Whenever you save a version of your dashboard, a copy of that version is saved so that previous versions of your dashboard are not lost."),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let Some(config_json) = config.get("config_json").and_then(Value::as_str) else {
            return Vec::new();
        };
        match normalize_dashboard_json(config_json) {
            Ok(_) => Vec::new(),
            Err(e) => vec![Diagnostic::error(e.to_string()).with_attribute("config_json")],
        }
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let model: DashboardModel = serde_json::from_value(planned)?;
        let dashboard = normalize_dashboard_json(&model.config_json)?;
        let response = ctx
            .grafana()?
            .save_dashboard(dashboard, model.folder.as_deref(), true)
            .await?;
        self.read_by_uid(ctx, &response.uid, model.folder).await
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let model: DashboardModel = serde_json::from_value(state)?;
        let uid = model
            .id
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidId("dashboard has no UID in state".to_string()))?;
        Ok(Some(self.read_by_uid(ctx, uid, model.folder).await?))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        self.create(ctx, planned).await
    }

    async fn delete(&self, ctx: &ProviderContext, state: Value) -> Result<(), ProviderError> {
        let model: DashboardModel = serde_json::from_value(state)?;
        let uid = model
            .id
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidId("dashboard has no UID in state".to_string()))?;
        ctx.grafana()?.delete_dashboard(uid).await
    }

    async fn import(&self, ctx: &ProviderContext, id: &str) -> Result<Value, ProviderError> {
        self.read_by_uid(ctx, id, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_strips_server_fields() {
        let normalized = normalize_dashboard_json(
            r#"{"title": "Node Exporter", "uid": "node", "id": 42, "version": 7}"#,
        )
        .unwrap();
        assert_eq!(normalized, json!({"title": "Node Exporter", "uid": "node"}));

        // Normalizing already-normalized JSON changes nothing
        let again = normalize_dashboard_json(&normalized.to_string()).unwrap();
        assert_eq!(again, normalized);
    }

    #[test]
    fn test_normalize_rejects_invalid_json() {
        assert!(normalize_dashboard_json("{not json").is_err());
        assert!(normalize_dashboard_json("[1, 2]").is_err());
    }

    #[test]
    fn test_stored_config_json_digest() {
        let model = json!({"title": "t"});
        let plain = stored_config_json(&model, false);
        assert_eq!(plain, model.to_string());

        let digest = stored_config_json(&model, true);
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        // Stable across calls
        assert_eq!(digest, stored_config_json(&model, true));
    }

    #[test]
    fn test_validate_flags_malformed_config_json() {
        let diagnostics =
            DashboardResource.validate(&json!({"config_json": "{broken"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("config_json"));

        let diagnostics =
            DashboardResource.validate(&json!({"config_json": "{\"title\": \"ok\"}"}));
        assert!(diagnostics.is_empty());
    }
}
