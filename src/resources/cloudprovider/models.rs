//! State models for the AWS CloudWatch scrape job, and the conversions
//! between them and the API payloads.
//!
//! Conversion is pure shape translation, element-wise over every collection;
//! the round trip state -> client -> state is lossless.

use serde::{Deserialize, Serialize};

use crate::client::{
    AwsCloudWatchCustomNamespace, AwsCloudWatchMetric, AwsCloudWatchScrapeJob,
    AwsCloudWatchService, AwsCloudWatchTagFilter,
};

use super::SCRAPE_JOB_ID;

fn default_true() -> bool {
    true
}

fn default_scrape_interval() -> i64 {
    300
}

/// State model of a scrape job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeJobModel {
    /// Composite `{stack_id}:{job_name}` ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The Stack ID of the Grafana Cloud instance.
    pub stack_id: String,
    /// The scrape job name.
    pub name: String,
    /// Whether the scrape job is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// ID of the associated AWS account resource.
    pub aws_account_resource_id: String,
    /// AWS regions the job applies to.
    #[serde(default)]
    pub regions: Vec<String>,
    /// Whether AWS resource tags are exported as metric labels.
    #[serde(default = "default_true")]
    pub export_tags: bool,
    /// Why the job was disabled by the system, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<String>,
    /// AWS service configurations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<ServiceModel>,
    /// Custom namespace configurations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_namespace: Vec<CustomNamespaceModel>,
}

/// State model of an AWS service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceModel {
    /// Service metrics namespace (e.g. `AWS/EC2`).
    pub name: String,
    /// Metrics to scrape.
    #[serde(default)]
    pub metric: Vec<MetricModel>,
    /// Scrape interval in seconds.
    #[serde(default = "default_scrape_interval")]
    pub scrape_interval_seconds: i64,
    /// Tag filters applied to resource discovery.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_discovery_tag_filter: Vec<TagFilterModel>,
    /// Tags added to all exported metrics.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags_to_add_to_metrics: Vec<String>,
}

/// State model of a custom namespace configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomNamespaceModel {
    /// Custom namespace name.
    pub name: String,
    /// Metrics to scrape.
    #[serde(default)]
    pub metric: Vec<MetricModel>,
    /// Scrape interval in seconds.
    #[serde(default = "default_scrape_interval")]
    pub scrape_interval_seconds: i64,
}

/// State model of a metric block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricModel {
    /// Metric name.
    pub name: String,
    /// Statistics to scrape.
    #[serde(default)]
    pub statistics: Vec<String>,
}

/// State model of a resource discovery tag filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilterModel {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

/// Convert the state model to the API payload.
pub fn to_client_model(model: &ScrapeJobModel) -> AwsCloudWatchScrapeJob {
    AwsCloudWatchScrapeJob {
        name: model.name.clone(),
        enabled: model.enabled,
        aws_account_resource_id: model.aws_account_resource_id.clone(),
        regions: model.regions.clone(),
        export_tags: model.export_tags,
        disabled_reason: model.disabled_reason.clone().unwrap_or_default(),
        services: model
            .service
            .iter()
            .map(|service| AwsCloudWatchService {
                name: service.name.clone(),
                metrics: service.metric.iter().map(metric_to_client).collect(),
                scrape_interval_seconds: service.scrape_interval_seconds,
                resource_discovery_tag_filters: service
                    .resource_discovery_tag_filter
                    .iter()
                    .map(|filter| AwsCloudWatchTagFilter {
                        key: filter.key.clone(),
                        value: filter.value.clone(),
                    })
                    .collect(),
                tags_to_add_to_metrics: service.tags_to_add_to_metrics.clone(),
            })
            .collect(),
        custom_namespaces: model
            .custom_namespace
            .iter()
            .map(|namespace| AwsCloudWatchCustomNamespace {
                name: namespace.name.clone(),
                metrics: namespace.metric.iter().map(metric_to_client).collect(),
                scrape_interval_seconds: namespace.scrape_interval_seconds,
            })
            .collect(),
    }
}

fn metric_to_client(metric: &MetricModel) -> AwsCloudWatchMetric {
    AwsCloudWatchMetric {
        name: metric.name.clone(),
        statistics: metric.statistics.clone(),
    }
}

/// Convert an API payload to the state model.
pub fn to_state_model(stack_id: &str, job: &AwsCloudWatchScrapeJob) -> ScrapeJobModel {
    ScrapeJobModel {
        id: Some(SCRAPE_JOB_ID.make(&[stack_id, &job.name])),
        stack_id: stack_id.to_string(),
        name: job.name.clone(),
        enabled: job.enabled,
        aws_account_resource_id: job.aws_account_resource_id.clone(),
        regions: job.regions.clone(),
        export_tags: job.export_tags,
        disabled_reason: if job.disabled_reason.is_empty() {
            None
        } else {
            Some(job.disabled_reason.clone())
        },
        service: job
            .services
            .iter()
            .map(|service| ServiceModel {
                name: service.name.clone(),
                metric: service.metrics.iter().map(metric_to_state).collect(),
                scrape_interval_seconds: service.scrape_interval_seconds,
                resource_discovery_tag_filter: service
                    .resource_discovery_tag_filters
                    .iter()
                    .map(|filter| TagFilterModel {
                        key: filter.key.clone(),
                        value: filter.value.clone(),
                    })
                    .collect(),
                tags_to_add_to_metrics: service.tags_to_add_to_metrics.clone(),
            })
            .collect(),
        custom_namespace: job
            .custom_namespaces
            .iter()
            .map(|namespace| CustomNamespaceModel {
                name: namespace.name.clone(),
                metric: namespace.metrics.iter().map(metric_to_state).collect(),
                scrape_interval_seconds: namespace.scrape_interval_seconds,
            })
            .collect(),
    }
}

fn metric_to_state(metric: &AwsCloudWatchMetric) -> MetricModel {
    MetricModel {
        name: metric.name.clone(),
        statistics: metric.statistics.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> ScrapeJobModel {
        ScrapeJobModel {
            id: None,
            stack_id: "123456".to_string(),
            name: "prod-scrape".to_string(),
            enabled: true,
            aws_account_resource_id: "1".to_string(),
            regions: vec!["us-east-1".to_string(), "us-west-1".to_string()],
            export_tags: true,
            disabled_reason: None,
            service: vec![ServiceModel {
                name: "AWS/EC2".to_string(),
                metric: vec![
                    MetricModel {
                        name: "CPUUtilization".to_string(),
                        statistics: vec!["Average".to_string()],
                    },
                    MetricModel {
                        name: "StatusCheckFailed".to_string(),
                        statistics: vec!["Maximum".to_string()],
                    },
                ],
                scrape_interval_seconds: 300,
                resource_discovery_tag_filter: vec![TagFilterModel {
                    key: "k8s.io/cluster-autoscaler/enabled".to_string(),
                    value: "true".to_string(),
                }],
                tags_to_add_to_metrics: vec!["eks:cluster-name".to_string()],
            }],
            custom_namespace: vec![CustomNamespaceModel {
                name: "CoolApp".to_string(),
                metric: vec![MetricModel {
                    name: "CoolMetric".to_string(),
                    statistics: vec!["Maximum".to_string(), "Sum".to_string()],
                }],
                scrape_interval_seconds: 300,
            }],
        }
    }

    #[test]
    fn test_conversion_round_trip() {
        let model = sample_model();
        let job = to_client_model(&model);
        let mut restored = to_state_model("123456", &job);
        assert_eq!(restored.id.as_deref(), Some("123456:prod-scrape"));
        restored.id = None;
        assert_eq!(restored, model);
    }

    #[test]
    fn test_client_model_shape() {
        let job = to_client_model(&sample_model());
        assert_eq!(job.services.len(), 1);
        assert_eq!(job.services[0].metrics.len(), 2);
        assert_eq!(job.services[0].resource_discovery_tag_filters[0].key,
            "k8s.io/cluster-autoscaler/enabled");
        assert_eq!(job.custom_namespaces[0].metrics[0].statistics.len(), 2);
        assert_eq!(job.disabled_reason, "");
    }

    #[test]
    fn test_defaults_applied_on_deserialize() {
        let model: ScrapeJobModel = serde_json::from_value(serde_json::json!({
            "stack_id": "1",
            "name": "job",
            "aws_account_resource_id": "2",
            "regions": ["us-east-1"],
            "service": [{"name": "AWS/EC2"}],
        }))
        .unwrap();
        assert!(model.enabled);
        assert!(model.export_tags);
        assert_eq!(model.service[0].scrape_interval_seconds, 300);
    }
}
