//! The dashboard-listing data source.
//!
//! Queries the paginated search endpoint with a generous page-size ceiling
//! and reshapes the flat result list into either a plain list or a grouping
//! map keyed by folder, depending on `group_by`. The grouping partitions the
//! flat set: every dashboard lands in exactly one group.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::SearchHit;
use crate::context::ProviderContext;
use crate::error::ProviderError;
use crate::provider::DataSourceHandler;
use crate::schema::{
    Attribute, AttributeFlags, AttributeType, Schema, ValueValidator,
};

/// Page-size ceiling for the search endpoint.
pub const SEARCH_LIMIT: u32 = 5000;

/// One dashboard in the result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// Dashboard title.
    pub title: String,
    /// Dashboard UID.
    pub uid: String,
    /// Numerical ID of the containing folder.
    pub folder_id: i64,
    /// Title of the containing folder.
    pub folder_title: String,
}

/// Config model of the dashboards data source.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct DashboardsQueryModel {
    /// Folder IDs to search in.
    pub folder_ids: Option<Vec<i64>>,
    /// Tags to search for.
    pub tags: Option<Vec<String>>,
    /// Group results by `folder_id` or `folder_uid` instead of a flat list.
    pub group_by: Option<String>,
}

/// Output model of the dashboards data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardsOutputModel {
    /// Synthetic data source ID.
    pub id: String,
    /// Folder IDs: the user-supplied filter, or the observed set when the
    /// search was unconstrained.
    pub folder_ids: Vec<i64>,
    /// The tag filter, echoed unchanged.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// The grouping key, echoed unchanged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    /// The flat result list.
    pub dashboards: Vec<DashboardSummary>,
    /// Results grouped by folder, when `group_by` was set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboards_by_folder: Option<BTreeMap<String, Vec<DashboardSummary>>>,
}

fn summarize(hit: &SearchHit) -> DashboardSummary {
    DashboardSummary {
        title: hit.title.clone(),
        uid: hit.uid.clone(),
        folder_id: hit.folder_id,
        folder_title: hit.folder_title.clone(),
    }
}

/// Group search hits by folder ID or folder UID.
///
/// The groups partition the input: no dashboard is omitted or duplicated.
pub fn group_dashboards(
    hits: &[SearchHit],
    group_by: &str,
) -> BTreeMap<String, Vec<DashboardSummary>> {
    let mut groups: BTreeMap<String, Vec<DashboardSummary>> = BTreeMap::new();
    for hit in hits {
        let key = match group_by {
            "folder_uid" => hit.folder_uid.clone(),
            _ => hit.folder_id.to_string(),
        };
        groups.entry(key).or_default().push(summarize(hit));
    }
    groups
}

/// The observed folder IDs, sorted and deduplicated.
pub fn observed_folder_ids(hits: &[SearchHit]) -> Vec<i64> {
    let mut ids: Vec<i64> = hits.iter().map(|hit| hit.folder_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// The dashboards data source.
pub struct DashboardsDataSource;

#[async_trait::async_trait]
impl DataSourceHandler for DashboardsDataSource {
    fn type_name(&self) -> &'static str {
        "grafana_dashboards"
    }

    fn schema(&self) -> Schema {
        let summary_type = AttributeType::object(
            [
                ("title".to_string(), AttributeType::String),
                ("uid".to_string(), AttributeType::String),
                ("folder_id".to_string(), AttributeType::Int64),
                ("folder_title".to_string(), AttributeType::String),
            ]
            .into_iter()
            .collect(),
        );

        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "folder_ids",
                Attribute::new(
                    AttributeType::list(AttributeType::Int64),
                    AttributeFlags::optional_computed(),
                )
                .with_description("Numerical IDs of Grafana folders containing dashboards. Specify to filter for dashboards by folder (eg. `[0]` for General folder), or leave blank to get all dashboards in all folders."),
            )
            .with_attribute(
                "tags",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::optional(),
                )
                .with_description("List of string Grafana dashboard tags to search for, eg. `[\"prod\"]`. Used only as search input, i.e., attribute value will remain unchanged."),
            )
            .with_attribute(
                "group_by",
                Attribute::optional_string()
                    .with_description("Group the results by folder instead of returning a flat list. One of `folder_id` or `folder_uid`.")
                    .with_validator(ValueValidator::OneOf(vec![
                        "folder_id".to_string(),
                        "folder_uid".to_string(),
                    ])),
            )
            .with_attribute(
                "dashboards",
                Attribute::new(
                    AttributeType::list(summary_type.clone()),
                    AttributeFlags::computed(),
                ),
            )
            .with_attribute(
                "dashboards_by_folder",
                Attribute::new(
                    AttributeType::map(AttributeType::list(summary_type)),
                    AttributeFlags::computed(),
                ),
            )
    }

    async fn read(&self, ctx: &ProviderContext, config: Value) -> Result<Value, ProviderError> {
        let query: DashboardsQueryModel = serde_json::from_value(config)?;

        let folder_filter = query.folder_ids.clone().unwrap_or_default();
        let tag_filter = query.tags.clone().unwrap_or_default();

        let hits = ctx
            .grafana()?
            .search_dashboards(&[], &folder_filter, &tag_filter, SEARCH_LIMIT)
            .await?;

        let mut id = "dashboards".to_string();
        if query.folder_ids.is_some() {
            id.push_str("-folder_ids");
        }
        if query.tags.is_some() {
            id.push_str("-tags");
        }

        // Write the observed folder set back only when the user did not
        // constrain it, so a constrained config never drifts
        let folder_ids = match query.folder_ids {
            Some(filter) => filter,
            None => observed_folder_ids(&hits),
        };

        let output = DashboardsOutputModel {
            id,
            folder_ids,
            tags: tag_filter,
            group_by: query.group_by.clone(),
            dashboards: hits.iter().map(summarize).collect(),
            dashboards_by_folder: query
                .group_by
                .as_deref()
                .map(|key| group_dashboards(&hits, key)),
        };
        Ok(serde_json::to_value(output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: i64, uid: &str, folder_id: i64, folder_uid: &str) -> SearchHit {
        SearchHit {
            id,
            uid: uid.to_string(),
            title: format!("dashboard-{}", uid),
            folder_id,
            folder_uid: folder_uid.to_string(),
            folder_title: format!("folder-{}", folder_id),
            tags: vec![],
        }
    }

    fn sample_hits() -> Vec<SearchHit> {
        vec![
            hit(1, "a", 0, ""),
            hit(2, "b", 7, "infra"),
            hit(3, "c", 7, "infra"),
            hit(4, "d", 9, "apps"),
        ]
    }

    #[test]
    fn test_grouping_partitions_the_result_set() {
        let hits = sample_hits();
        for key in ["folder_id", "folder_uid"] {
            let groups = group_dashboards(&hits, key);
            let total: usize = groups.values().map(Vec::len).sum();
            assert_eq!(total, hits.len(), "group_by {} lost or duplicated hits", key);

            let mut uids: Vec<&str> = groups
                .values()
                .flatten()
                .map(|d| d.uid.as_str())
                .collect();
            uids.sort_unstable();
            assert_eq!(uids, vec!["a", "b", "c", "d"]);
        }
    }

    #[test]
    fn test_grouping_keys() {
        let hits = sample_hits();

        let by_id = group_dashboards(&hits, "folder_id");
        assert_eq!(by_id.keys().collect::<Vec<_>>(), vec!["0", "7", "9"]);
        assert_eq!(by_id["7"].len(), 2);

        let by_uid = group_dashboards(&hits, "folder_uid");
        assert_eq!(by_uid.keys().collect::<Vec<_>>(), vec!["", "apps", "infra"]);
        assert_eq!(by_uid["infra"].len(), 2);
    }

    #[test]
    fn test_observed_folder_ids_sorted_unique() {
        assert_eq!(observed_folder_ids(&sample_hits()), vec![0, 7, 9]);
        assert!(observed_folder_ids(&[]).is_empty());
    }

    #[test]
    fn test_group_by_validator() {
        use crate::validation::validate;
        let schema = DashboardsDataSource.schema();

        assert!(validate(&schema, &serde_json::json!({"group_by": "folder_uid"})).is_empty());
        let diagnostics = validate(&schema, &serde_json::json!({"group_by": "team"}));
        assert_eq!(diagnostics.len(), 1);
    }
}
