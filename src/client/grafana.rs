//! Client for the Grafana HTTP API.
//!
//! Covers the endpoints the provider manages: dashboards and dashboard
//! search, annotations, the alerting notification policy tree, and the
//! enterprise team-LBAC rules.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiClient;
use crate::error::ProviderError;

/// A single result from the folder/dashboard search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchHit {
    /// Numerical dashboard ID.
    pub id: i64,
    /// Dashboard UID.
    pub uid: String,
    /// Dashboard title.
    pub title: String,
    /// Numerical ID of the containing folder (0 = General).
    pub folder_id: i64,
    /// UID of the containing folder.
    pub folder_uid: String,
    /// Title of the containing folder.
    pub folder_title: String,
    /// Dashboard tags.
    pub tags: Vec<String>,
}

/// Dashboard metadata returned alongside the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardMeta {
    /// Whether the dashboard is starred by the current user.
    pub is_starred: bool,
    /// Numerical ID of the containing folder.
    pub folder_id: i64,
    /// UID of the containing folder.
    pub folder_uid: String,
    /// URL path of the dashboard.
    pub url: String,
}

/// A dashboard model plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardWithMeta {
    /// The dashboard model JSON.
    pub dashboard: Value,
    /// Metadata about the dashboard.
    #[serde(default)]
    pub meta: DashboardMeta,
}

/// Response from saving a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SaveDashboardResponse {
    /// Numerical dashboard ID.
    pub id: i64,
    /// Dashboard UID.
    pub uid: String,
    /// URL path of the dashboard.
    pub url: String,
    /// Saved version number.
    pub version: i64,
    /// Save status string.
    pub status: String,
}

/// An annotation on a dashboard panel or time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Annotation {
    /// Numerical annotation ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// UID of the dashboard the annotation is attached to.
    #[serde(rename = "dashboardUID", skip_serializing_if = "Option::is_none")]
    pub dashboard_uid: Option<String>,
    /// ID of the panel the annotation is attached to.
    #[serde(rename = "panelId", skip_serializing_if = "Option::is_none")]
    pub panel_id: Option<i64>,
    /// Start time in epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    /// End time in epoch milliseconds.
    #[serde(rename = "timeEnd", skip_serializing_if = "Option::is_none")]
    pub time_end: Option<i64>,
    /// Annotation tags.
    pub tags: Vec<String>,
    /// Annotation text.
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct CreateAnnotationResponse {
    id: i64,
}

/// A label matcher on a notification policy route, serialized as the
/// `[label, op, value]` triple the API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct PolicyMatcher {
    /// The label name to match against.
    pub label: String,
    /// The match operator: `=`, `!=`, `=~`, or `!~`.
    pub op: String,
    /// The label value to match against.
    pub value: String,
}

impl From<(String, String, String)> for PolicyMatcher {
    fn from((label, op, value): (String, String, String)) -> Self {
        Self { label, op, value }
    }
}

impl From<PolicyMatcher> for (String, String, String) {
    fn from(m: PolicyMatcher) -> Self {
        (m.label, m.op, m.value)
    }
}

/// A routing rule nested inside the notification policy tree.
///
/// Routes are recursive: each route may carry further child routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PolicyRoute {
    /// The contact point receiving notifications matched by this route.
    pub receiver: String,
    /// Labels to group alerts by.
    pub group_by: Vec<String>,
    /// Label matchers selecting alerts for this route.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub object_matchers: Vec<PolicyMatcher>,
    /// Mute timing names applied to matching alerts.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mute_time_intervals: Vec<String>,
    /// Whether to keep matching sibling routes after this one matches.
    #[serde(rename = "continue")]
    pub continue_matching: bool,
    /// Minimum interval between two notifications for the same group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_interval: Option<String>,
    /// Minimum interval before re-sending a notification for a firing alert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_interval: Option<String>,
    /// Child routes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<PolicyRoute>,
}

/// The root of the notification policy tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotificationPolicyTree {
    /// The default contact point for unmatched notifications.
    pub receiver: String,
    /// Labels to group alerts by.
    pub group_by: Vec<String>,
    /// Time to buffer alerts of the same group before notifying.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_wait: Option<String>,
    /// Minimum interval between two notifications for the same group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_interval: Option<String>,
    /// Minimum interval before re-sending a notification for a firing alert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_interval: Option<String>,
    /// Routing rules for specific label sets.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<PolicyRoute>,
}

/// Label-based access control rules for one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamLbacRule {
    /// The team the rules apply to.
    #[serde(rename = "teamId")]
    pub team_id: String,
    /// The rule strings.
    pub rules: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TeamLbacRules {
    rules: Vec<TeamLbacRule>,
}

/// Client for the Grafana HTTP API.
#[derive(Debug, Clone)]
pub struct GrafanaClient {
    api: ApiClient,
}

impl GrafanaClient {
    /// Wrap an [`ApiClient`] pointed at a Grafana server.
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Fetch a dashboard and its metadata by UID.
    pub async fn dashboard_by_uid(&self, uid: &str) -> Result<DashboardWithMeta, ProviderError> {
        self.api
            .get_json(&format!("/api/dashboards/uid/{}", uid), &[])
            .await
    }

    /// Create or update a dashboard from its model JSON.
    pub async fn save_dashboard(
        &self,
        dashboard: Value,
        folder_uid: Option<&str>,
        overwrite: bool,
    ) -> Result<SaveDashboardResponse, ProviderError> {
        let mut body = serde_json::json!({
            "dashboard": dashboard,
            "overwrite": overwrite,
        });
        if let Some(folder_uid) = folder_uid {
            body["folderUid"] = Value::String(folder_uid.to_string());
        }
        self.api
            .post_json("/api/dashboards/db", &[], &[], body)
            .await
    }

    /// Delete a dashboard by UID.
    pub async fn delete_dashboard(&self, uid: &str) -> Result<(), ProviderError> {
        self.api
            .delete(&format!("/api/dashboards/uid/{}", uid), &[], &[])
            .await
    }

    /// Search dashboards, optionally filtered by dashboard IDs, folder IDs,
    /// and tags. `limit` caps the page size.
    pub async fn search_dashboards(
        &self,
        dashboard_ids: &[i64],
        folder_ids: &[i64],
        tags: &[String],
        limit: u32,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        let query = search_query(dashboard_ids, folder_ids, tags, limit);
        self.api.get_json("/api/search", &query).await
    }

    /// Create an annotation, returning its ID.
    pub async fn create_annotation(&self, annotation: &Annotation) -> Result<i64, ProviderError> {
        let response: CreateAnnotationResponse = self
            .api
            .post_json("/api/annotations", &[], &[], serde_json::to_value(annotation)?)
            .await?;
        Ok(response.id)
    }

    /// Fetch an annotation by ID.
    pub async fn annotation(&self, id: i64) -> Result<Annotation, ProviderError> {
        self.api
            .get_json(&format!("/api/annotations/{}", id), &[])
            .await
    }

    /// Replace an annotation by ID.
    pub async fn update_annotation(
        &self,
        id: i64,
        annotation: &Annotation,
    ) -> Result<(), ProviderError> {
        let _: Value = self
            .api
            .put_json(
                &format!("/api/annotations/{}", id),
                &[],
                serde_json::to_value(annotation)?,
            )
            .await?;
        Ok(())
    }

    /// Delete an annotation by ID.
    pub async fn delete_annotation(&self, id: i64) -> Result<(), ProviderError> {
        self.api
            .delete(&format!("/api/annotations/{}", id), &[], &[])
            .await
    }

    /// Fetch the alerting notification policy tree.
    pub async fn notification_policy_tree(
        &self,
    ) -> Result<NotificationPolicyTree, ProviderError> {
        self.api
            .get_json("/api/v1/provisioning/policies", &[])
            .await
    }

    /// Replace the alerting notification policy tree.
    pub async fn set_notification_policy_tree(
        &self,
        tree: &NotificationPolicyTree,
    ) -> Result<(), ProviderError> {
        let _: Value = self
            .api
            .put_json(
                "/api/v1/provisioning/policies",
                &[],
                serde_json::to_value(tree)?,
            )
            .await?;
        Ok(())
    }

    /// Reset the notification policy tree to the server default.
    pub async fn reset_notification_policy_tree(&self) -> Result<(), ProviderError> {
        self.api
            .delete("/api/v1/provisioning/policies", &[], &[])
            .await
    }

    /// Fetch the team-LBAC rules of a data source.
    pub async fn team_lbac_rules(
        &self,
        datasource_uid: &str,
    ) -> Result<Vec<TeamLbacRule>, ProviderError> {
        let response: TeamLbacRules = self
            .api
            .get_json(
                &format!("/api/datasources/uid/{}/lbac/teams", datasource_uid),
                &[],
            )
            .await?;
        Ok(response.rules)
    }

    /// Replace the team-LBAC rules of a data source.
    pub async fn update_team_lbac_rules(
        &self,
        datasource_uid: &str,
        rules: Vec<TeamLbacRule>,
    ) -> Result<(), ProviderError> {
        let _: Value = self
            .api
            .put_json(
                &format!("/api/datasources/uid/{}/lbac/teams", datasource_uid),
                &[],
                serde_json::to_value(TeamLbacRules { rules })?,
            )
            .await?;
        Ok(())
    }
}

/// Build the query parameters for a dashboard search.
fn search_query(
    dashboard_ids: &[i64],
    folder_ids: &[i64],
    tags: &[String],
    limit: u32,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("type", "dash-db".to_string()),
        ("limit", limit.to_string()),
    ];
    for id in dashboard_ids {
        query.push(("dashboardIds", id.to_string()));
    }
    for id in folder_ids {
        query.push(("folderIds", id.to_string()));
    }
    for tag in tags {
        query.push(("tag", tag.clone()));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_hit_deserialization() {
        let hit: SearchHit = serde_json::from_value(json!({
            "id": 42,
            "uid": "abc123",
            "title": "Node Exporter",
            "folderId": 7,
            "folderUid": "fold-1",
            "folderTitle": "Infrastructure",
            "tags": ["prod"],
        }))
        .unwrap();
        assert_eq!(hit.id, 42);
        assert_eq!(hit.folder_title, "Infrastructure");

        // General-folder hits omit the folder fields entirely
        let hit: SearchHit =
            serde_json::from_value(json!({"id": 1, "uid": "u", "title": "t"})).unwrap();
        assert_eq!(hit.folder_id, 0);
        assert_eq!(hit.folder_title, "");
    }

    #[test]
    fn test_policy_matcher_serializes_as_triple() {
        let matcher = PolicyMatcher {
            label: "severity".to_string(),
            op: "=".to_string(),
            value: "critical".to_string(),
        };
        let encoded = serde_json::to_value(&matcher).unwrap();
        assert_eq!(encoded, json!(["severity", "=", "critical"]));

        let decoded: PolicyMatcher =
            serde_json::from_value(json!(["team", "=~", "platform-.*"])).unwrap();
        assert_eq!(decoded.label, "team");
        assert_eq!(decoded.op, "=~");
    }

    #[test]
    fn test_policy_tree_continue_rename() {
        let tree: NotificationPolicyTree = serde_json::from_value(json!({
            "receiver": "default",
            "group_by": ["alertname"],
            "routes": [{
                "receiver": "pager",
                "group_by": [],
                "continue": true,
            }],
        }))
        .unwrap();
        assert!(tree.routes[0].continue_matching);

        let encoded = serde_json::to_value(&tree).unwrap();
        assert_eq!(encoded["routes"][0]["continue"], json!(true));
    }

    #[test]
    fn test_search_query_building() {
        let query = search_query(&[], &[0, 7], &["prod".to_string()], 5000);
        assert!(query.contains(&("type", "dash-db".to_string())));
        assert!(query.contains(&("limit", "5000".to_string())));
        assert!(query.contains(&("folderIds", "0".to_string())));
        assert!(query.contains(&("folderIds", "7".to_string())));
        assert!(query.contains(&("tag", "prod".to_string())));
        assert!(!query.iter().any(|(k, _)| *k == "dashboardIds"));
    }

    #[test]
    fn test_annotation_serialization_skips_unset() {
        let annotation = Annotation {
            text: "deploy".to_string(),
            tags: vec!["release".to_string()],
            ..Default::default()
        };
        let encoded = serde_json::to_value(&annotation).unwrap();
        assert_eq!(encoded, json!({"text": "deploy", "tags": ["release"]}));
    }
}
