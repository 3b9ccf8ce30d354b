//! Cloud Provider resources: AWS CloudWatch scrape jobs.

mod models;
mod scrape_job;

pub use models::{
    to_client_model, to_state_model, CustomNamespaceModel, MetricModel, ScrapeJobModel,
    ServiceModel, TagFilterModel,
};
pub use scrape_job::{AwsCloudWatchScrapeJobResource, SCRAPE_JOB_ID};
