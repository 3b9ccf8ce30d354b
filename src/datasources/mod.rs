//! Read-only data source types.

pub mod dashboard;
pub mod dashboards;
pub mod scrape_job;

use crate::provider::DataSourceHandler;

/// Every data source handler the provider serves.
pub fn all() -> Vec<Box<dyn DataSourceHandler>> {
    vec![
        Box::new(dashboard::DashboardDataSource),
        Box::new(dashboards::DashboardsDataSource),
        Box::new(scrape_job::AwsCloudWatchScrapeJobDataSource),
    ]
}
