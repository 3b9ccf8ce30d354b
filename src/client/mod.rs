//! Authenticated HTTP clients for the vendor APIs.
//!
//! A single [`ApiClient`] per subsystem is built once during provider
//! configuration and treated as immutable afterwards. Handlers never retry on
//! their own; the retry policy configured here is the only retry layer.

mod cloud;
mod cloudprovider;
mod grafana;

pub use cloud::{CloudClient, TokenPayload, TokenRequest, TokenUpdateRequest};
pub use cloudprovider::{
    AwsCloudWatchCustomNamespace, AwsCloudWatchMetric, AwsCloudWatchScrapeJob,
    AwsCloudWatchService, AwsCloudWatchTagFilter, CloudProviderClient,
};
pub use grafana::{
    Annotation, DashboardMeta, DashboardWithMeta, GrafanaClient, NotificationPolicyTree,
    PolicyMatcher, PolicyRoute, SaveDashboardResponse, SearchHit, TeamLbacRule,
};

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::ProviderError;

/// How the client authenticates against an API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// No authentication.
    Anonymous,
    /// Bearer token authentication.
    Bearer(String),
    /// HTTP basic authentication.
    Basic {
        /// Username part.
        username: String,
        /// Password part.
        password: String,
    },
}

impl AuthMode {
    /// Parse the provider `auth` string: `anonymous`, `username:password`,
    /// or a bare API token.
    pub fn parse(auth: &str) -> Self {
        if auth == "anonymous" {
            return Self::Anonymous;
        }
        match auth.split_once(':') {
            Some((username, password)) => Self::Basic {
                username: username.to_string(),
                password: password.to_string(),
            },
            None => Self::Bearer(auth.to_string()),
        }
    }
}

/// Retry policy applied by [`ApiClient`] to every request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of retry attempts after the initial request.
    pub retries: u32,
    /// Wait between attempts.
    pub wait: Duration,
    /// Status code patterns to retry on; `x` is a digit wildcard.
    pub status_codes: Vec<String>,
}

impl RetryPolicy {
    fn from_config(config: &ProviderConfig) -> Self {
        Self {
            retries: config.retries,
            wait: Duration::from_secs(config.retry_wait),
            status_codes: config.retry_status_codes.clone(),
        }
    }

    fn should_retry(&self, status: StatusCode) -> bool {
        self.status_codes
            .iter()
            .any(|pattern| status_matches(pattern, status.as_u16()))
    }
}

/// Whether a status code matches a pattern like `429` or `5xx`.
///
/// `x` (case-insensitive) matches any single digit.
pub fn status_matches(pattern: &str, status: u16) -> bool {
    let status = status.to_string();
    if pattern.len() != status.len() {
        return false;
    }
    pattern
        .chars()
        .zip(status.chars())
        .all(|(p, s)| p.eq_ignore_ascii_case(&'x') || p == s)
}

/// A shared JSON-over-HTTP client for one API base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: AuthMode,
    retry: RetryPolicy,
}

impl ApiClient {
    /// Build a client for the given base URL and auth mode, applying the
    /// provider-level header, TLS, and retry settings.
    pub fn build(
        base_url: &str,
        auth: AuthMode,
        config: &ProviderConfig,
    ) -> Result<Self, ProviderError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(header_map(&config.http_headers)?);

        if config.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ca_cert) = &config.ca_cert {
            let cert = reqwest::Certificate::from_pem(&pem_material(ca_cert)?)
                .map_err(|e| ProviderError::Configuration(format!("invalid ca_cert: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }
        if let (Some(cert), Some(key)) = (&config.tls_cert, &config.tls_key) {
            let mut pem = pem_material(cert)?;
            pem.extend_from_slice(&pem_material(key)?);
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                ProviderError::Configuration(format!("invalid tls_cert/tls_key pair: {}", e))
            })?;
            builder = builder.identity(identity);
        }

        let http = builder
            .build()
            .map_err(|e| ProviderError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            retry: RetryPolicy::from_config(config),
        })
    }

    /// The base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a GET and decode the JSON response.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let response = self.send(Method::GET, path, query, &[], None).await?;
        Ok(response.json().await?)
    }

    /// Issue a POST with a JSON body and decode the JSON response.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        headers: &[(&'static str, String)],
        body: Value,
    ) -> Result<T, ProviderError> {
        let response = self
            .send(Method::POST, path, query, headers, Some(body))
            .await?;
        Ok(response.json().await?)
    }

    /// Issue a PUT with a JSON body and decode the JSON response.
    pub async fn put_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Value,
    ) -> Result<T, ProviderError> {
        let response = self
            .send(Method::PUT, path, query, &[], Some(body))
            .await?;
        Ok(response.json().await?)
    }

    /// Issue a DELETE, discarding any response body.
    pub async fn delete(
        &self,
        path: &str,
        query: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> Result<(), ProviderError> {
        self.send(Method::DELETE, path, query, headers, None).await?;
        Ok(())
    }

    /// Send one request, retrying per the configured policy, and map
    /// non-success statuses to errors.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        headers: &[(&'static str, String)],
        body: Option<Value>,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;

        loop {
            let mut request = self.http.request(method.clone(), url.as_str());
            if !query.is_empty() {
                request = request.query(query);
            }
            request = match &self.auth {
                AuthMode::Anonymous => request,
                AuthMode::Bearer(token) => request.bearer_auth(token),
                AuthMode::Basic { username, password } => {
                    request.basic_auth(username, Some(password))
                }
            };
            for (name, value) in headers {
                request = request.header(*name, value);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            debug!(%method, %url, attempt, "sending API request");
            let response = request.send().await?;
            let status = response.status();

            if self.retry.should_retry(status) && attempt < self.retry.retries {
                attempt += 1;
                warn!(%url, status = status.as_u16(), attempt, "retrying API request");
                tokio::time::sleep(self.retry.wait).await;
                continue;
            }

            if status.is_success() {
                return Ok(response);
            }
            if status == StatusCode::NOT_FOUND {
                return Err(ProviderError::NotFound(format!("{} {}", method, path)));
            }
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }
    }
}

fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, ProviderError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ProviderError::Configuration(format!("invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ProviderError::Configuration(format!("invalid header value: {}", e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Read PEM material from a file path, or treat the value as literal PEM.
fn pem_material(value: &str) -> Result<Vec<u8>, ProviderError> {
    if Path::new(value).exists() {
        std::fs::read(value)
            .map_err(|e| ProviderError::Configuration(format!("failed to read {}: {}", value, e)))
    } else {
        Ok(value.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_mode_parse() {
        assert_eq!(AuthMode::parse("anonymous"), AuthMode::Anonymous);
        assert_eq!(
            AuthMode::parse("glsa_token123"),
            AuthMode::Bearer("glsa_token123".to_string())
        );
        assert_eq!(
            AuthMode::parse("admin:secret"),
            AuthMode::Basic {
                username: "admin".to_string(),
                password: "secret".to_string()
            }
        );
        // Everything after the first colon is the password
        assert_eq!(
            AuthMode::parse("admin:se:cret"),
            AuthMode::Basic {
                username: "admin".to_string(),
                password: "se:cret".to_string()
            }
        );
    }

    #[test]
    fn test_status_matches() {
        assert!(status_matches("429", 429));
        assert!(!status_matches("429", 430));
        assert!(status_matches("5xx", 500));
        assert!(status_matches("5xx", 503));
        assert!(status_matches("5xx", 599));
        assert!(!status_matches("5xx", 429));
        assert!(status_matches("5X0", 510));
        assert!(!status_matches("5xx", 50));
        assert!(!status_matches("", 500));
    }

    #[test]
    fn test_retry_policy_should_retry() {
        let policy = RetryPolicy {
            retries: 3,
            wait: Duration::from_secs(0),
            status_codes: vec!["429".to_string(), "5xx".to_string()],
        };
        assert!(policy.should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(policy.should_retry(StatusCode::BAD_GATEWAY));
        assert!(!policy.should_retry(StatusCode::NOT_FOUND));
        assert!(!policy.should_retry(StatusCode::OK));
    }

    #[test]
    fn test_client_build_trims_trailing_slash() {
        let config = ProviderConfig::default();
        let client =
            ApiClient::build("https://grafana.example.com/", AuthMode::Anonymous, &config).unwrap();
        assert_eq!(client.base_url(), "https://grafana.example.com");
    }

    #[test]
    fn test_pem_material_literal_passthrough() {
        let literal = "-----BEGIN CERTIFICATE-----\nnot-a-path\n-----END CERTIFICATE-----";
        assert_eq!(pem_material(literal).unwrap(), literal.as_bytes());
    }
}
