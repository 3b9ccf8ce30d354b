//! Client for the Grafana Cloud Provider API.
//!
//! Manages AWS CloudWatch scrape jobs scoped to a Grafana Cloud stack.

use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::error::ProviderError;

/// A metric scraped from a CloudWatch service or custom namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AwsCloudWatchMetric {
    /// Metric name.
    pub name: String,
    /// Statistics to scrape for this metric.
    pub statistics: Vec<String>,
}

/// A tag filter applied to resource discovery in the AWS account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AwsCloudWatchTagFilter {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

/// An AWS service configuration within a scrape job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AwsCloudWatchService {
    /// Service metrics namespace (e.g. `AWS/EC2`).
    pub name: String,
    /// Metrics and statistics to scrape.
    pub metrics: Vec<AwsCloudWatchMetric>,
    /// Scrape interval in seconds.
    pub scrape_interval_seconds: i64,
    /// Tag filters applied to resource discovery.
    pub resource_discovery_tag_filters: Vec<AwsCloudWatchTagFilter>,
    /// Tags added to all exported metrics.
    pub tags_to_add_to_metrics: Vec<String>,
}

/// A custom metrics namespace configuration within a scrape job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AwsCloudWatchCustomNamespace {
    /// Custom namespace name.
    pub name: String,
    /// Metrics and statistics to scrape.
    pub metrics: Vec<AwsCloudWatchMetric>,
    /// Scrape interval in seconds.
    pub scrape_interval_seconds: i64,
}

/// An AWS CloudWatch scrape job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AwsCloudWatchScrapeJob {
    /// Job name, unique within the stack.
    pub name: String,
    /// Whether the job is enabled.
    pub enabled: bool,
    /// ID of the associated AWS account resource.
    pub aws_account_resource_id: String,
    /// AWS regions the job scrapes.
    pub regions: Vec<String>,
    /// Whether AWS resource tags are exported as metric labels.
    pub export_tags: bool,
    /// Why the job was disabled by the system, if it was.
    pub disabled_reason: String,
    /// AWS service configurations.
    pub services: Vec<AwsCloudWatchService>,
    /// Custom namespace configurations.
    pub custom_namespaces: Vec<AwsCloudWatchCustomNamespace>,
}

/// Client for the Grafana Cloud Provider API.
#[derive(Debug, Clone)]
pub struct CloudProviderClient {
    api: ApiClient,
}

impl CloudProviderClient {
    /// Wrap an [`ApiClient`] pointed at the Cloud Provider API.
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Create a scrape job in the given stack.
    pub async fn create_aws_cloudwatch_scrape_job(
        &self,
        stack_id: &str,
        job: &AwsCloudWatchScrapeJob,
    ) -> Result<AwsCloudWatchScrapeJob, ProviderError> {
        self.api
            .post_json(
                &format!("/api/v2/stacks/{}/aws/cloudwatch/jobs", stack_id),
                &[],
                &[],
                serde_json::to_value(job)?,
            )
            .await
    }

    /// Fetch a scrape job by stack and job name.
    pub async fn aws_cloudwatch_scrape_job(
        &self,
        stack_id: &str,
        name: &str,
    ) -> Result<AwsCloudWatchScrapeJob, ProviderError> {
        self.api
            .get_json(
                &format!("/api/v2/stacks/{}/aws/cloudwatch/jobs/{}", stack_id, name),
                &[],
            )
            .await
    }

    /// Replace a scrape job.
    pub async fn update_aws_cloudwatch_scrape_job(
        &self,
        stack_id: &str,
        job: &AwsCloudWatchScrapeJob,
    ) -> Result<AwsCloudWatchScrapeJob, ProviderError> {
        self.api
            .put_json(
                &format!(
                    "/api/v2/stacks/{}/aws/cloudwatch/jobs/{}",
                    stack_id, job.name
                ),
                &[],
                serde_json::to_value(job)?,
            )
            .await
    }

    /// Delete a scrape job.
    pub async fn delete_aws_cloudwatch_scrape_job(
        &self,
        stack_id: &str,
        name: &str,
    ) -> Result<(), ProviderError> {
        self.api
            .delete(
                &format!("/api/v2/stacks/{}/aws/cloudwatch/jobs/{}", stack_id, name),
                &[],
                &[],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scrape_job_serialization_is_camel_case() {
        let job = AwsCloudWatchScrapeJob {
            name: "prod".to_string(),
            enabled: true,
            aws_account_resource_id: "1".to_string(),
            regions: vec!["us-east-1".to_string()],
            export_tags: true,
            ..Default::default()
        };
        let encoded = serde_json::to_value(&job).unwrap();
        assert_eq!(encoded["awsAccountResourceId"], json!("1"));
        assert_eq!(encoded["exportTags"], json!(true));
        assert_eq!(encoded["disabledReason"], json!(""));
    }

    #[test]
    fn test_scrape_job_round_trip() {
        let job = AwsCloudWatchScrapeJob {
            name: "prod".to_string(),
            enabled: true,
            aws_account_resource_id: "1".to_string(),
            regions: vec!["us-east-1".to_string(), "us-west-1".to_string()],
            export_tags: false,
            disabled_reason: String::new(),
            services: vec![AwsCloudWatchService {
                name: "AWS/EC2".to_string(),
                metrics: vec![AwsCloudWatchMetric {
                    name: "CPUUtilization".to_string(),
                    statistics: vec!["Average".to_string()],
                }],
                scrape_interval_seconds: 300,
                resource_discovery_tag_filters: vec![AwsCloudWatchTagFilter {
                    key: "env".to_string(),
                    value: "prod".to_string(),
                }],
                tags_to_add_to_metrics: vec!["eks:cluster-name".to_string()],
            }],
            custom_namespaces: vec![AwsCloudWatchCustomNamespace {
                name: "CoolApp".to_string(),
                metrics: vec![AwsCloudWatchMetric {
                    name: "CoolMetric".to_string(),
                    statistics: vec!["Maximum".to_string(), "Sum".to_string()],
                }],
                scrape_interval_seconds: 300,
            }],
        };

        let encoded = serde_json::to_value(&job).unwrap();
        let decoded: AwsCloudWatchScrapeJob = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, job);
    }
}
