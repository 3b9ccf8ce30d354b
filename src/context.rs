//! Shared provider context.
//!
//! Clients are built once from the resolved [`ProviderConfig`] and shared,
//! read-only, with every handler invocation. A subsystem client exists only
//! when its credentials were configured; accessors name the missing setting
//! otherwise.

use crate::client::{ApiClient, AuthMode, CloudClient, CloudProviderClient, GrafanaClient};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

/// Clients and settings shared by all resource handlers.
#[derive(Debug)]
pub struct ProviderContext {
    config: ProviderConfig,
    grafana: Option<GrafanaClient>,
    cloud: Option<CloudClient>,
    cloudprovider: Option<CloudProviderClient>,
    sm: Option<ApiClient>,
    oncall: Option<ApiClient>,
}

impl ProviderContext {
    /// Build clients for every configured subsystem.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let grafana = match (&config.url, &config.auth) {
            (Some(url), Some(auth)) => Some(GrafanaClient::new(ApiClient::build(
                url,
                AuthMode::parse(auth),
                &config,
            )?)),
            _ => None,
        };

        let (cloud, cloudprovider) = match &config.cloud_access_policy_token {
            Some(token) => {
                let api = ApiClient::build(
                    &config.cloud_api_url,
                    AuthMode::Bearer(token.clone()),
                    &config,
                )?;
                (
                    Some(CloudClient::new(api.clone())),
                    Some(CloudProviderClient::new(api)),
                )
            }
            None => (None, None),
        };

        let sm = match &config.sm_access_token {
            Some(token) => Some(ApiClient::build(
                &config.sm_url,
                AuthMode::Bearer(token.clone()),
                &config,
            )?),
            None => None,
        };

        let oncall = match &config.oncall_access_token {
            Some(token) => Some(ApiClient::build(
                &config.oncall_url,
                AuthMode::Bearer(token.clone()),
                &config,
            )?),
            None => None,
        };

        Ok(Self {
            config,
            grafana,
            cloud,
            cloudprovider,
            sm,
            oncall,
        })
    }

    /// The resolved provider configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The Grafana API client.
    pub fn grafana(&self) -> Result<&GrafanaClient, ProviderError> {
        self.grafana.as_ref().ok_or_else(|| {
            ProviderError::Configuration(
                "the Grafana API client is required for this resource; set the provider `url` and `auth` attributes".to_string(),
            )
        })
    }

    /// The Grafana Cloud API client.
    pub fn cloud(&self) -> Result<&CloudClient, ProviderError> {
        self.cloud.as_ref().ok_or_else(|| {
            ProviderError::Configuration(
                "the Grafana Cloud API client is required for this resource; set the provider `cloud_access_policy_token` attribute".to_string(),
            )
        })
    }

    /// The Cloud Provider API client.
    pub fn cloudprovider(&self) -> Result<&CloudProviderClient, ProviderError> {
        self.cloudprovider.as_ref().ok_or_else(|| {
            ProviderError::Configuration(
                "the Cloud Provider API client is required for this resource; set the provider `cloud_access_policy_token` attribute".to_string(),
            )
        })
    }

    /// The Synthetic Monitoring API client.
    pub fn sm(&self) -> Result<&ApiClient, ProviderError> {
        self.sm.as_ref().ok_or_else(|| {
            ProviderError::Configuration(
                "the Synthetic Monitoring API client is required for this resource; set the provider `sm_access_token` attribute".to_string(),
            )
        })
    }

    /// The OnCall API client.
    pub fn oncall(&self) -> Result<&ApiClient, ProviderError> {
        self.oncall.as_ref().ok_or_else(|| {
            ProviderError::Configuration(
                "the OnCall API client is required for this resource; set the provider `oncall_access_token` attribute".to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_subsystems_are_absent() {
        let context = ProviderContext::new(ProviderConfig::default()).unwrap();
        assert!(context.grafana().is_err());
        assert!(context.cloud().is_err());
        assert!(context.cloudprovider().is_err());
        assert!(context.sm().is_err());
        assert!(context.oncall().is_err());
    }

    #[test]
    fn test_grafana_client_requires_url_and_auth() {
        let config = ProviderConfig {
            url: Some("https://grafana.example.com".to_string()),
            ..Default::default()
        };
        let context = ProviderContext::new(config).unwrap();
        let err = context.grafana().unwrap_err();
        assert!(err.to_string().contains("auth"));
    }

    #[test]
    fn test_configured_subsystems_are_present() {
        let config = ProviderConfig {
            url: Some("https://grafana.example.com".to_string()),
            auth: Some("glsa_token".to_string()),
            cloud_access_policy_token: Some("cloud-token".to_string()),
            sm_access_token: Some("sm-token".to_string()),
            oncall_access_token: Some("oncall-token".to_string()),
            ..Default::default()
        };
        let context = ProviderContext::new(config).unwrap();
        assert!(context.grafana().is_ok());
        assert!(context.cloud().is_ok());
        assert!(context.cloudprovider().is_ok());
        assert!(context.sm().is_ok());
        assert!(context.oncall().is_ok());
    }
}
