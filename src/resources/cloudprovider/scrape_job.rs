//! The AWS CloudWatch scrape job resource.

use serde_json::Value;

use crate::context::ProviderContext;
use crate::error::ProviderError;
use crate::ids::ResourceId;
use crate::provider::ResourceHandler;
use crate::schema::{
    Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema,
    ValueValidator,
};

use super::models::{to_client_model, to_state_model, ScrapeJobModel};

/// Composite ID of the scrape job resource.
pub const SCRAPE_JOB_ID: ResourceId = ResourceId::new(
    "grafana_cloud_provider_aws_cloudwatch_scrape_job",
    &["stack_id", "job_name"],
);

fn metric_block() -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute(
                "name",
                Attribute::required_string().with_description("The name of the metric to scrape."),
            )
            .with_attribute(
                "statistics",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    AttributeFlags::required(),
                )
                .with_description("A set of statistics to scrape."),
            ),
    )
    .with_min_items(1)
    .unique_by("name")
}

/// The scrape job resource.
pub struct AwsCloudWatchScrapeJobResource;

#[async_trait::async_trait]
impl ResourceHandler for AwsCloudWatchScrapeJobResource {
    fn type_name(&self) -> &'static str {
        "grafana_cloud_provider_aws_cloudwatch_scrape_job"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "id",
                Attribute::computed_string().with_description(
                    "The resource ID. This has the format \"{{ stack_id }}:{{ job_name }}\".",
                ),
            )
            .with_attribute(
                "stack_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(ValueValidator::NonEmpty)
                    .with_description("The Stack ID of the Grafana Cloud instance. Part of the resource ID."),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(ValueValidator::NonEmpty)
                    .with_description("The name of the CloudWatch Scrape Job. Part of the resource ID."),
            )
            .with_attribute(
                "enabled",
                Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
                    .with_default(serde_json::json!(true))
                    .with_description("Whether the CloudWatch Scrape Job is enabled or not."),
            )
            .with_attribute(
                "aws_account_resource_id",
                Attribute::required_string().with_description(
                    "The ID assigned by the Grafana Cloud Provider API to an AWS Account resource that should be associated with this CloudWatch Scrape Job.",
                ),
            )
            .with_attribute(
                "regions",
                Attribute::new(
                    AttributeType::set(AttributeType::String),
                    AttributeFlags::required(),
                )
                .with_description("A set of AWS region names that this CloudWatch Scrape Job applies to."),
            )
            .with_attribute(
                "export_tags",
                Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
                    .with_default(serde_json::json!(true))
                    .with_description("When enabled, AWS resource tags are exported as Prometheus labels to metrics formatted as `aws_<service_name>_info`."),
            )
            .with_attribute(
                "disabled_reason",
                Attribute::computed_string().with_description(
                    "When the CloudWatch Scrape Job is disabled by the system, this is the reason why.",
                ),
            )
            .with_block(
                "service",
                NestedBlock::list(
                    Block::new()
                        .with_description("One or more configuration blocks to dictate what this CloudWatch Scrape Job should scrape. Each block must have a distinct `name` attribute.")
                        .with_attribute(
                            "name",
                            Attribute::required_string()
                                .with_description("The name of the service to scrape."),
                        )
                        .with_attribute(
                            "scrape_interval_seconds",
                            Attribute::new(
                                AttributeType::Int64,
                                AttributeFlags::optional_computed(),
                            )
                            .with_default(serde_json::json!(300))
                            .with_description("The interval in seconds to scrape the service."),
                        )
                        .with_attribute(
                            "tags_to_add_to_metrics",
                            Attribute::new(
                                AttributeType::set(AttributeType::String),
                                AttributeFlags::optional(),
                            )
                            .with_description("A set of tags to add to all metrics exported by this scrape job, for use in PromQL queries."),
                        )
                        .with_block("metric", metric_block())
                        .with_block(
                            "resource_discovery_tag_filter",
                            NestedBlock::list(
                                Block::new()
                                    .with_attribute(
                                        "key",
                                        Attribute::required_string()
                                            .with_description("The key of the tag filter."),
                                    )
                                    .with_attribute(
                                        "value",
                                        Attribute::required_string()
                                            .with_description("The value of the tag filter."),
                                    ),
                            )
                            .with_description("One or more configuration blocks to configure tag filters applied to discovery of resource entities in the associated AWS account."),
                        ),
                )
                .unique_by("name"),
            )
            .with_block(
                "custom_namespace",
                NestedBlock::list(
                    Block::new()
                        .with_description("Zero or more configuration blocks to configure custom namespaces for the CloudWatch Scrape Job to scrape. Each block must have a distinct `name` attribute.")
                        .with_attribute(
                            "name",
                            Attribute::required_string()
                                .with_description("The name of the custom namespace to scrape."),
                        )
                        .with_attribute(
                            "scrape_interval_seconds",
                            Attribute::new(
                                AttributeType::Int64,
                                AttributeFlags::optional_computed(),
                            )
                            .with_default(serde_json::json!(300))
                            .with_description("The interval in seconds to scrape the custom namespace."),
                        )
                        .with_block("metric", metric_block()),
                )
                .unique_by("name"),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        let regions = config.get("regions").and_then(Value::as_array);
        if regions.map(|r| r.is_empty()).unwrap_or(false) {
            diagnostics.push(
                Diagnostic::error("regions must contain at least one AWS region")
                    .with_attribute("regions"),
            );
        }

        let services = config
            .get("service")
            .and_then(Value::as_array)
            .map(|s| s.len())
            .unwrap_or(0);
        let namespaces = config
            .get("custom_namespace")
            .and_then(Value::as_array)
            .map(|s| s.len())
            .unwrap_or(0);
        if services + namespaces == 0 {
            diagnostics.push(Diagnostic::error(
                "at least one service or custom_namespace block is required",
            ));
        }

        diagnostics
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let model: ScrapeJobModel = serde_json::from_value(planned)?;
        let created = ctx
            .cloudprovider()?
            .create_aws_cloudwatch_scrape_job(&model.stack_id, &to_client_model(&model))
            .await?;
        Ok(serde_json::to_value(to_state_model(&model.stack_id, &created))?)
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let model: ScrapeJobModel = serde_json::from_value(state)?;
        let job = ctx
            .cloudprovider()?
            .aws_cloudwatch_scrape_job(&model.stack_id, &model.name)
            .await?;
        Ok(Some(serde_json::to_value(to_state_model(
            &model.stack_id,
            &job,
        ))?))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior_model: ScrapeJobModel = serde_json::from_value(prior)?;
        let planned_model: ScrapeJobModel = serde_json::from_value(planned)?;
        let updated = ctx
            .cloudprovider()?
            .update_aws_cloudwatch_scrape_job(
                &prior_model.stack_id,
                &to_client_model(&planned_model),
            )
            .await?;
        Ok(serde_json::to_value(to_state_model(
            &prior_model.stack_id,
            &updated,
        ))?)
    }

    async fn delete(&self, ctx: &ProviderContext, state: Value) -> Result<(), ProviderError> {
        let model: ScrapeJobModel = serde_json::from_value(state)?;
        ctx.cloudprovider()?
            .delete_aws_cloudwatch_scrape_job(&model.stack_id, &model.name)
            .await
    }

    async fn import(&self, ctx: &ProviderContext, id: &str) -> Result<Value, ProviderError> {
        let parts = SCRAPE_JOB_ID.split(id)?;
        let (stack_id, job_name) = (&parts[0], &parts[1]);
        let job = ctx
            .cloudprovider()?
            .aws_cloudwatch_scrape_job(stack_id, job_name)
            .await?;
        Ok(serde_json::to_value(to_state_model(stack_id, &job))?)
    }
}
