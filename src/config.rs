//! Provider configuration.
//!
//! Every provider-level setting can come from the configuration value or be
//! overridden by a matching `GRAFANA_*` environment variable. Parsing is
//! fully typed: each field is extracted with a validated accessor instead of
//! casting through untyped maps.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema, ValueValidator};

/// Default Grafana Cloud API URL.
pub const DEFAULT_CLOUD_API_URL: &str = "https://grafana.com";
/// Default Synthetic Monitoring API URL.
pub const DEFAULT_SM_URL: &str = "https://synthetic-monitoring-api.grafana.net";
/// Default OnCall API URL.
pub const DEFAULT_ONCALL_URL: &str = "https://oncall-prod-us-central-0.grafana.net/oncall";
/// Default retry attempt count for API calls.
pub const DEFAULT_RETRIES: u32 = 3;

/// Provider-level configuration, after env overrides and defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// The root URL of a Grafana server.
    pub url: Option<String>,
    /// API token, basic auth in `username:password` format, or `anonymous`.
    pub auth: Option<String>,
    /// HTTP headers sent with every Grafana and Grafana Cloud API call.
    pub http_headers: HashMap<String, String>,
    /// Retry attempt count for API calls.
    pub retries: u32,
    /// Status code patterns to retry on; `x` is a digit wildcard (`5xx`).
    pub retry_status_codes: Vec<String>,
    /// Seconds to wait between retries.
    pub retry_wait: u64,
    /// Client TLS key (file path or literal PEM).
    pub tls_key: Option<String>,
    /// Client TLS certificate (file path or literal PEM).
    pub tls_cert: Option<String>,
    /// CA bundle used to verify the server certificate (file path or literal PEM).
    pub ca_cert: Option<String>,
    /// Skip TLS certificate verification.
    pub insecure_skip_verify: bool,
    /// Access Policy Token for Grafana Cloud.
    pub cloud_access_policy_token: Option<String>,
    /// Grafana Cloud API URL.
    pub cloud_api_url: String,
    /// Synthetic Monitoring access token.
    pub sm_access_token: Option<String>,
    /// Synthetic Monitoring backend address.
    pub sm_url: String,
    /// Grafana OnCall access token.
    pub oncall_access_token: Option<String>,
    /// Grafana OnCall backend address.
    pub oncall_url: String,
    /// Store only the sha256 digest of dashboard JSON in state.
    pub store_dashboard_sha256: bool,
    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: None,
            auth: None,
            http_headers: HashMap::new(),
            retries: DEFAULT_RETRIES,
            retry_status_codes: vec!["429".to_string(), "5xx".to_string()],
            retry_wait: 0,
            tls_key: None,
            tls_cert: None,
            ca_cert: None,
            insecure_skip_verify: false,
            cloud_access_policy_token: None,
            cloud_api_url: DEFAULT_CLOUD_API_URL.to_string(),
            sm_access_token: None,
            sm_url: DEFAULT_SM_URL.to_string(),
            oncall_access_token: None,
            oncall_url: DEFAULT_ONCALL_URL.to_string(),
            store_dashboard_sha256: false,
            user_agent: format!("grafana-provider/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ProviderConfig {
    /// Build a configuration from the provider config value, applying
    /// environment overrides and defaults.
    pub fn resolve(value: &Value) -> Result<Self, ProviderError> {
        let mut config = Self::from_value(value)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Extract configuration from the raw provider config value.
    fn from_value(value: &Value) -> Result<Self, ProviderError> {
        let mut config = Self::default();

        config.url = get_string(value, "url");
        config.auth = get_string(value, "auth");
        if let Some(headers) = value.get("http_headers").and_then(Value::as_object) {
            for (name, v) in headers {
                let v = v.as_str().ok_or_else(|| {
                    ProviderError::Configuration(format!(
                        "http_headers[{}] must be a string",
                        name
                    ))
                })?;
                config.http_headers.insert(name.clone(), v.to_string());
            }
        }
        if let Some(retries) = get_u64(value, "retries")? {
            config.retries = retries as u32;
        }
        if let Some(codes) = value.get("retry_status_codes").and_then(Value::as_array) {
            config.retry_status_codes = codes
                .iter()
                .map(|c| {
                    c.as_str().map(|s| s.to_string()).ok_or_else(|| {
                        ProviderError::Configuration(
                            "retry_status_codes entries must be strings".to_string(),
                        )
                    })
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(wait) = get_u64(value, "retry_wait")? {
            config.retry_wait = wait;
        }
        config.tls_key = get_string(value, "tls_key");
        config.tls_cert = get_string(value, "tls_cert");
        config.ca_cert = get_string(value, "ca_cert");
        config.insecure_skip_verify = get_bool(value, "insecure_skip_verify").unwrap_or(false);
        config.cloud_access_policy_token = get_string(value, "cloud_access_policy_token")
            .or_else(|| get_string(value, "cloud_api_key"));
        if let Some(url) = get_string(value, "cloud_api_url") {
            config.cloud_api_url = url;
        }
        config.sm_access_token = get_string(value, "sm_access_token");
        if let Some(url) = get_string(value, "sm_url") {
            config.sm_url = url;
        }
        config.oncall_access_token = get_string(value, "oncall_access_token");
        if let Some(url) = get_string(value, "oncall_url") {
            config.oncall_url = url;
        }
        config.store_dashboard_sha256 =
            get_bool(value, "store_dashboard_sha256").unwrap_or(false);

        Ok(config)
    }

    /// Apply `GRAFANA_*` environment variable overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ProviderError> {
        if let Some(v) = env_var("GRAFANA_URL") {
            self.url = Some(v);
        }
        if let Some(v) = env_var("GRAFANA_AUTH") {
            self.auth = Some(v);
        }
        if let Some(v) = env_var("GRAFANA_HTTP_HEADERS") {
            self.http_headers = serde_json::from_str(&v).map_err(|e| {
                ProviderError::Configuration(format!(
                    "GRAFANA_HTTP_HEADERS must be a JSON object of strings: {}",
                    e
                ))
            })?;
        }
        if let Some(v) = env_var("GRAFANA_RETRIES") {
            self.retries = parse_env("GRAFANA_RETRIES", &v)?;
        }
        if let Some(v) = env_var("GRAFANA_RETRY_STATUS_CODES") {
            self.retry_status_codes = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Some(v) = env_var("GRAFANA_RETRY_WAIT") {
            self.retry_wait = parse_env("GRAFANA_RETRY_WAIT", &v)?;
        }
        if let Some(v) = env_var("GRAFANA_TLS_KEY") {
            self.tls_key = Some(v);
        }
        if let Some(v) = env_var("GRAFANA_TLS_CERT") {
            self.tls_cert = Some(v);
        }
        if let Some(v) = env_var("GRAFANA_CA_CERT") {
            self.ca_cert = Some(v);
        }
        if let Some(v) = env_var("GRAFANA_INSECURE_SKIP_VERIFY") {
            self.insecure_skip_verify = parse_env("GRAFANA_INSECURE_SKIP_VERIFY", &v)?;
        }
        if let Some(v) = env_var("GRAFANA_CLOUD_ACCESS_POLICY_TOKEN") {
            self.cloud_access_policy_token = Some(v);
        }
        if let Some(v) = env_var("GRAFANA_CLOUD_API_URL") {
            self.cloud_api_url = v;
        }
        if let Some(v) = env_var("GRAFANA_SM_ACCESS_TOKEN") {
            self.sm_access_token = Some(v);
        }
        if let Some(v) = env_var("GRAFANA_SM_URL") {
            self.sm_url = v;
        }
        if let Some(v) = env_var("GRAFANA_ONCALL_ACCESS_TOKEN") {
            self.oncall_access_token = Some(v);
        }
        if let Some(v) = env_var("GRAFANA_ONCALL_URL") {
            self.oncall_url = v;
        }
        Ok(())
    }
}

/// The provider configuration schema.
pub fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "url",
            Attribute::optional_string()
                .with_description("The root URL of a Grafana server. May alternatively be set via the `GRAFANA_URL` environment variable.")
                .with_validator(ValueValidator::HttpUrl),
        )
        .with_attribute(
            "auth",
            Attribute::optional_string()
                .sensitive()
                .with_description("API token, basic auth in the `username:password` format or `anonymous` (string literal). May alternatively be set via the `GRAFANA_AUTH` environment variable."),
        )
        .with_attribute(
            "http_headers",
            Attribute::new(
                AttributeType::map(AttributeType::String),
                AttributeFlags::optional(),
            )
            .sensitive()
            .with_description("Optional. HTTP headers mapping keys to values used for accessing the Grafana and Grafana Cloud APIs. May alternatively be set via the `GRAFANA_HTTP_HEADERS` environment variable in JSON format."),
        )
        .with_attribute(
            "retries",
            Attribute::optional_int64()
                .with_description("The amount of retries to use for Grafana API and Grafana Cloud API calls. May alternatively be set via the `GRAFANA_RETRIES` environment variable."),
        )
        .with_attribute(
            "retry_status_codes",
            Attribute::new(
                AttributeType::set(AttributeType::String),
                AttributeFlags::optional(),
            )
            .with_description("The status codes to retry on for Grafana API and Grafana Cloud API calls. Use `x` as a digit wildcard. Defaults to 429 and 5xx. May alternatively be set via the `GRAFANA_RETRY_STATUS_CODES` environment variable."),
        )
        .with_attribute(
            "retry_wait",
            Attribute::optional_int64()
                .with_description("The amount of time in seconds to wait between retries for Grafana API and Grafana Cloud API calls. May alternatively be set via the `GRAFANA_RETRY_WAIT` environment variable."),
        )
        .with_attribute(
            "tls_key",
            Attribute::optional_string()
                .with_description("Client TLS key (file path or literal value) to use to authenticate to the Grafana server. May alternatively be set via the `GRAFANA_TLS_KEY` environment variable."),
        )
        .with_attribute(
            "tls_cert",
            Attribute::optional_string()
                .with_description("Client TLS certificate (file path or literal value) to use to authenticate to the Grafana server. May alternatively be set via the `GRAFANA_TLS_CERT` environment variable."),
        )
        .with_attribute(
            "ca_cert",
            Attribute::optional_string()
                .with_description("Certificate CA bundle (file path or literal value) to use to verify the Grafana server's certificate. May alternatively be set via the `GRAFANA_CA_CERT` environment variable."),
        )
        .with_attribute(
            "insecure_skip_verify",
            Attribute::optional_bool()
                .with_description("Skip TLS certificate verification. May alternatively be set via the `GRAFANA_INSECURE_SKIP_VERIFY` environment variable."),
        )
        .with_attribute(
            "cloud_access_policy_token",
            Attribute::optional_string()
                .sensitive()
                .with_description("Access Policy Token for Grafana Cloud. May alternatively be set via the `GRAFANA_CLOUD_ACCESS_POLICY_TOKEN` environment variable."),
        )
        .with_attribute(
            "cloud_api_key",
            Attribute::optional_string()
                .sensitive()
                .with_deprecated("Use `cloud_access_policy_token` instead."),
        )
        .with_attribute(
            "cloud_api_url",
            Attribute::optional_string()
                .with_description("Grafana Cloud's API URL. May alternatively be set via the `GRAFANA_CLOUD_API_URL` environment variable.")
                .with_validator(ValueValidator::HttpUrl),
        )
        .with_attribute(
            "sm_access_token",
            Attribute::optional_string()
                .sensitive()
                .with_description("A Synthetic Monitoring access token. May alternatively be set via the `GRAFANA_SM_ACCESS_TOKEN` environment variable."),
        )
        .with_attribute(
            "sm_url",
            Attribute::optional_string()
                .with_description("Synthetic monitoring backend address. May alternatively be set via the `GRAFANA_SM_URL` environment variable.")
                .with_validator(ValueValidator::HttpUrl),
        )
        .with_attribute(
            "oncall_access_token",
            Attribute::optional_string()
                .sensitive()
                .with_description("A Grafana OnCall access token. May alternatively be set via the `GRAFANA_ONCALL_ACCESS_TOKEN` environment variable."),
        )
        .with_attribute(
            "oncall_url",
            Attribute::optional_string()
                .with_description("A Grafana OnCall backend address. May alternatively be set via the `GRAFANA_ONCALL_URL` environment variable.")
                .with_validator(ValueValidator::HttpUrl),
        )
        .with_attribute(
            "store_dashboard_sha256",
            Attribute::optional_bool()
                .with_description("Set to true if you want to save only the sha256sum instead of complete dashboard model JSON in the tfstate."),
        )
        .conflicts_with(&["cloud_access_policy_token", "cloud_api_key"])
}

fn get_string(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn get_bool(value: &Value, key: &str) -> Option<bool> {
    value.get(key).and_then(Value::as_bool)
}

fn get_u64(value: &Value, key: &str) -> Result<Option<u64>, ProviderError> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64().map(Some).ok_or_else(|| {
            ProviderError::Configuration(format!("{} must be a non-negative integer", key))
        }),
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ProviderError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ProviderError::Configuration(format!("invalid {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_grafana_env<R>(f: impl FnOnce() -> R) -> R {
        // Keys that the tests below could otherwise inherit from the
        // environment of the test runner.
        temp_env::with_vars(
            [
                ("GRAFANA_URL", None::<&str>),
                ("GRAFANA_AUTH", None),
                ("GRAFANA_HTTP_HEADERS", None),
                ("GRAFANA_RETRIES", None),
                ("GRAFANA_RETRY_STATUS_CODES", None),
                ("GRAFANA_RETRY_WAIT", None),
                ("GRAFANA_TLS_KEY", None),
                ("GRAFANA_TLS_CERT", None),
                ("GRAFANA_CA_CERT", None),
                ("GRAFANA_INSECURE_SKIP_VERIFY", None),
                ("GRAFANA_CLOUD_ACCESS_POLICY_TOKEN", None),
                ("GRAFANA_CLOUD_API_URL", None),
                ("GRAFANA_SM_ACCESS_TOKEN", None),
                ("GRAFANA_SM_URL", None),
                ("GRAFANA_ONCALL_ACCESS_TOKEN", None),
                ("GRAFANA_ONCALL_URL", None),
            ],
            f,
        )
    }

    #[test]
    fn test_defaults() {
        no_grafana_env(|| {
            let config = ProviderConfig::resolve(&json!({})).unwrap();
            assert_eq!(config.cloud_api_url, DEFAULT_CLOUD_API_URL);
            assert_eq!(config.sm_url, DEFAULT_SM_URL);
            assert_eq!(config.oncall_url, DEFAULT_ONCALL_URL);
            assert_eq!(config.retries, 3);
            assert_eq!(config.retry_status_codes, vec!["429", "5xx"]);
            assert!(!config.store_dashboard_sha256);
        });
    }

    #[test]
    fn test_from_value_typed_fields() {
        no_grafana_env(|| {
            let config = ProviderConfig::resolve(&json!({
                "url": "https://grafana.example.com",
                "auth": "admin:secret",
                "retries": 5,
                "retry_wait": 2,
                "retry_status_codes": ["429", "502"],
                "http_headers": {"X-Org": "7"},
                "insecure_skip_verify": true,
                "store_dashboard_sha256": true,
            }))
            .unwrap();

            assert_eq!(config.url.as_deref(), Some("https://grafana.example.com"));
            assert_eq!(config.auth.as_deref(), Some("admin:secret"));
            assert_eq!(config.retries, 5);
            assert_eq!(config.retry_wait, 2);
            assert_eq!(config.retry_status_codes, vec!["429", "502"]);
            assert_eq!(config.http_headers.get("X-Org").map(String::as_str), Some("7"));
            assert!(config.insecure_skip_verify);
            assert!(config.store_dashboard_sha256);
        });
    }

    #[test]
    fn test_invalid_retries_rejected() {
        no_grafana_env(|| {
            let err = ProviderConfig::resolve(&json!({"retries": "three"})).unwrap_err();
            assert!(err.to_string().contains("retries"));
        });
    }

    #[test]
    fn test_cloud_api_key_fallback() {
        no_grafana_env(|| {
            let config = ProviderConfig::resolve(&json!({"cloud_api_key": "legacy"})).unwrap();
            assert_eq!(config.cloud_access_policy_token.as_deref(), Some("legacy"));

            // The new attribute takes precedence
            let config = ProviderConfig::resolve(&json!({
                "cloud_api_key": "legacy",
                "cloud_access_policy_token": "new",
            }))
            .unwrap();
            assert_eq!(config.cloud_access_policy_token.as_deref(), Some("new"));
        });
    }

    #[test]
    fn test_env_overrides() {
        temp_env::with_vars(
            [
                ("GRAFANA_URL", Some("https://env.example.com")),
                ("GRAFANA_AUTH", Some("env-token")),
                ("GRAFANA_RETRIES", Some("7")),
                ("GRAFANA_RETRY_STATUS_CODES", Some("429,503")),
                ("GRAFANA_HTTP_HEADERS", Some(r#"{"X-Env": "yes"}"#)),
            ],
            || {
                let config = ProviderConfig::resolve(&json!({
                    "url": "https://config.example.com",
                }))
                .unwrap();
                assert_eq!(config.url.as_deref(), Some("https://env.example.com"));
                assert_eq!(config.auth.as_deref(), Some("env-token"));
                assert_eq!(config.retries, 7);
                assert_eq!(config.retry_status_codes, vec!["429", "503"]);
                assert_eq!(
                    config.http_headers.get("X-Env").map(String::as_str),
                    Some("yes")
                );
            },
        );
    }

    #[test]
    fn test_invalid_env_headers_rejected() {
        temp_env::with_var("GRAFANA_HTTP_HEADERS", Some("not json"), || {
            let err = ProviderConfig::resolve(&json!({})).unwrap_err();
            assert!(err.to_string().contains("GRAFANA_HTTP_HEADERS"));
        });
    }

    #[test]
    fn test_provider_schema_shape() {
        let schema = provider_config_schema();
        assert!(schema.block.attributes.contains_key("url"));
        assert!(schema.block.attributes["auth"].flags.sensitive);
        assert!(schema.block.attributes["cloud_api_key"].deprecated.is_some());
        assert_eq!(
            schema.conflicts_with,
            vec![vec!["cloud_access_policy_token", "cloud_api_key"]]
        );
    }
}
