//! The single-dashboard data source.
//!
//! The dashboard is looked up by UID, or by numerical ID via the search
//! endpoint. Exactly one of the two must be given; zero and the empty string
//! count as unset, and both failure modes are raised before any network
//! call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ProviderContext;
use crate::error::ProviderError;
use crate::provider::DataSourceHandler;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};

/// Config and output model of the dashboard data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DashboardQueryModel {
    /// The dashboard UID (doubles as the data source ID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The numerical ID of the dashboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_id: Option<i64>,
    /// The UID of the dashboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// The dashboard version; 0 or unset means the latest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// The dashboard title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The numerical ID of the containing folder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<i64>,
    /// Whether the dashboard is starred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_starred: Option<bool>,
    /// The full dashboard model JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_json: Option<String>,
}

/// The dashboard data source.
pub struct DashboardDataSource;

#[async_trait::async_trait]
impl DataSourceHandler for DashboardDataSource {
    fn type_name(&self) -> &'static str {
        "grafana_dashboard"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "dashboard_id",
                Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed())
                    .with_description("The numerical ID of the Grafana dashboard."),
            )
            .with_attribute(
                "uid",
                Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                    .with_description("The uid of the Grafana dashboard."),
            )
            .with_attribute(
                "version",
                Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed())
                    .with_description("The numerical version of the Grafana dashboard. Set to 0 or omit to get the latest version."),
            )
            .with_attribute(
                "title",
                Attribute::computed_string()
                    .with_description("The title of the Grafana dashboard."),
            )
            .with_attribute(
                "folder_id",
                Attribute::computed_int64()
                    .with_description("The numerical ID of the folder where the Grafana dashboard is found."),
            )
            .with_attribute(
                "is_starred",
                Attribute::computed_bool()
                    .with_description("Whether or not the Grafana dashboard is starred. Starred Dashboards will show up on your own Home Dashboard by default, and are a convenient way to mark Dashboards that you're interested in."),
            )
            .with_attribute(
                "model_json",
                Attribute::computed_string()
                    .with_description("The complete dashboard model JSON."),
            )
            .exactly_one_of(&["dashboard_id", "uid"])
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        match config.get("version").and_then(Value::as_i64) {
            Some(version) if version < 0 => {
                vec![
                    Diagnostic::error(format!("must specify version >= 0, not {}", version))
                        .with_attribute("version"),
                ]
            }
            Some(version) if version > 0 => {
                // Fetching historical versions is not wired up; reject
                // instead of silently returning the latest
                vec![Diagnostic::error(
                    "dashboard versions other than the latest are not supported",
                )
                .with_attribute("version")]
            }
            _ => Vec::new(),
        }
    }

    async fn read(&self, ctx: &ProviderContext, config: Value) -> Result<Value, ProviderError> {
        let query: DashboardQueryModel = serde_json::from_value(config)?;
        let client = ctx.grafana()?;

        let uid = match (&query.uid, query.dashboard_id) {
            (Some(uid), _) if !uid.is_empty() => uid.clone(),
            (_, Some(id)) if id > 0 => {
                let hits = client
                    .search_dashboards(&[id], &[], &[], super::dashboards::SEARCH_LIMIT)
                    .await?;
                hits.iter()
                    .find(|hit| hit.id == id)
                    .map(|hit| hit.uid.clone())
                    .ok_or_else(|| {
                        ProviderError::NotFound(format!("no dashboard with id {}", id))
                    })?
            }
            _ => {
                return Err(ProviderError::Validation(
                    "must specify either dashboard id or uid".to_string(),
                ))
            }
        };

        let response = client.dashboard_by_uid(&uid).await?;
        let model = DashboardQueryModel {
            id: Some(uid.clone()),
            uid: Some(uid),
            dashboard_id: response.dashboard.get("id").and_then(Value::as_i64),
            version: response.dashboard.get("version").and_then(Value::as_i64),
            title: response
                .dashboard
                .get("title")
                .and_then(Value::as_str)
                .map(|s| s.to_string()),
            folder_id: Some(response.meta.folder_id),
            is_starred: Some(response.meta.is_starred),
            model_json: Some(response.dashboard.to_string()),
        };
        Ok(serde_json::to_value(model)?)
    }
}
