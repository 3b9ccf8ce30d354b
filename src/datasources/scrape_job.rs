//! The AWS CloudWatch scrape job data source.
//!
//! A read-only view of one scrape job, keyed by stack ID and job name;
//! everything else is computed from the API response.

use serde::Deserialize;
use serde_json::Value;

use crate::context::ProviderContext;
use crate::error::ProviderError;
use crate::provider::DataSourceHandler;
use crate::resources::cloudprovider::to_state_model;
use crate::schema::{
    Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema,
};

#[derive(Debug, Deserialize)]
struct ScrapeJobQuery {
    stack_id: String,
    name: String,
}

fn metric_block() -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute("name", Attribute::computed_string())
            .with_attribute(
                "statistics",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    AttributeFlags::computed(),
                ),
            ),
    )
}

/// The scrape job data source.
pub struct AwsCloudWatchScrapeJobDataSource;

#[async_trait::async_trait]
impl DataSourceHandler for AwsCloudWatchScrapeJobDataSource {
    fn type_name(&self) -> &'static str {
        "grafana_cloud_provider_aws_cloudwatch_scrape_job"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "id",
                Attribute::computed_string().with_description(
                    "The data source ID. This has the format \"{{ stack_id }}:{{ job_name }}\".",
                ),
            )
            .with_attribute(
                "stack_id",
                Attribute::required_string()
                    .with_description("The Stack ID of the Grafana Cloud instance."),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("The name of the CloudWatch Scrape Job."),
            )
            .with_attribute(
                "enabled",
                Attribute::computed_bool()
                    .with_description("Whether the CloudWatch Scrape Job is enabled or not."),
            )
            .with_attribute(
                "aws_account_resource_id",
                Attribute::computed_string().with_description(
                    "The ID assigned by the Grafana Cloud Provider API to the associated AWS Account resource.",
                ),
            )
            .with_attribute(
                "regions",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    AttributeFlags::computed(),
                )
                .with_description("A set of AWS region names that this CloudWatch Scrape Job applies to."),
            )
            .with_attribute("export_tags", Attribute::computed_bool())
            .with_attribute("disabled_reason", Attribute::computed_string())
            .with_block(
                "service",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("name", Attribute::computed_string())
                        .with_attribute(
                            "scrape_interval_seconds",
                            Attribute::computed_int64(),
                        )
                        .with_attribute(
                            "tags_to_add_to_metrics",
                            Attribute::new(
                                AttributeType::set(AttributeType::String),
                                AttributeFlags::computed(),
                            ),
                        )
                        .with_block("metric", metric_block())
                        .with_block(
                            "resource_discovery_tag_filter",
                            NestedBlock::list(
                                Block::new()
                                    .with_attribute("key", Attribute::computed_string())
                                    .with_attribute("value", Attribute::computed_string()),
                            ),
                        ),
                ),
            )
            .with_block(
                "custom_namespace",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("name", Attribute::computed_string())
                        .with_attribute(
                            "scrape_interval_seconds",
                            Attribute::computed_int64(),
                        )
                        .with_block("metric", metric_block()),
                ),
            )
    }

    async fn read(&self, ctx: &ProviderContext, config: Value) -> Result<Value, ProviderError> {
        let query: ScrapeJobQuery = serde_json::from_value(config)?;
        let job = ctx
            .cloudprovider()?
            .aws_cloudwatch_scrape_job(&query.stack_id, &query.name)
            .await?;
        Ok(serde_json::to_value(to_state_model(&query.stack_id, &job))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use serde_json::json;

    #[test]
    fn test_requires_stack_and_name() {
        let schema = AwsCloudWatchScrapeJobDataSource.schema();

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 2);

        let diagnostics = validate(
            &schema,
            &json!({"stack_id": "123456", "name": "prod-scrape"}),
        );
        assert!(diagnostics.is_empty());
    }
}
