//! Grafana Provider
//!
//! This crate implements a declarative infrastructure provider for Grafana,
//! Grafana Cloud, and related services. It translates between a
//! configuration/state model and the vendor REST APIs: typed schemas,
//! validation, conversion between attribute-value trees and API payloads,
//! and create/read/update/delete lifecycles.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **Schema types**: Typed attribute trees with validators and cross-field
//!   rules for provider config, resources, and data sources
//! - **Validation**: Config checking against a schema, reported as
//!   structured diagnostics before any network call
//! - **ProviderService trait**: The handler surface the orchestrating tool's
//!   plugin protocol invokes (diffing/planning happens upstream)
//! - **Resource handlers**: Dashboards, annotations, the alerting
//!   notification policy tree, cloud access-policy tokens, AWS CloudWatch
//!   scrape jobs, and data source LBAC rules
//! - **Client wiring**: Authenticated HTTP clients built once at configure
//!   time, with a configurable retry policy
//! - **Generate helpers**: Post-processing passes over generated HCL configs
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```no_run
//! use grafana_provider::{GrafanaProvider, ProviderService};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = GrafanaProvider::new();
//!
//! provider
//!     .configure(json!({
//!         "url": "https://grafana.example.com",
//!         "auth": "service-account-token",
//!     }))
//!     .await?;
//!
//! let state = provider
//!     .create(
//!         "grafana_annotation",
//!         json!({"text": "deploy v42", "tags": ["release"]}),
//!     )
//!     .await?;
//!
//! // Refresh detects drift; `None` means the object is gone remotely
//! let refreshed = provider.read("grafana_annotation", state).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Not-found policy
//!
//! A not-found response during Read uniformly drops the resource from state
//! (`Ok(None)`), enabling automatic recreation on the next apply. A
//! not-found during Delete counts as already deleted.

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod context;
pub mod datasources;
pub mod error;
pub mod generate;
pub mod ids;
pub mod logging;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod testing;
pub mod validation;

// Re-export main types at crate root
pub use config::ProviderConfig;
pub use context::ProviderContext;
pub use error::ProviderError;
pub use ids::ResourceId;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{
    DataSourceHandler, GrafanaProvider, ProviderMetadata, ProviderService, ResourceHandler,
};
pub use schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
