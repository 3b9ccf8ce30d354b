//! Managed resource types.

pub mod alerting;
pub mod annotation;
pub mod cloud;
pub mod cloudprovider;
pub mod dashboard;
pub mod lbac;

use crate::provider::ResourceHandler;

/// Every resource handler the provider serves.
pub fn all() -> Vec<Box<dyn ResourceHandler>> {
    vec![
        Box::new(alerting::NotificationPolicyResource),
        Box::new(annotation::AnnotationResource),
        Box::new(dashboard::DashboardResource),
        Box::new(cloud::AccessPolicyTokenResource),
        Box::new(cloudprovider::AwsCloudWatchScrapeJobResource),
        Box::new(lbac::LbacRulesResource),
    ]
}
