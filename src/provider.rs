//! Provider service and CRUD dispatch.
//!
//! The [`ProviderService`] trait is the surface the orchestrating tool's
//! plugin protocol invokes; diffing and planning happen upstream, so this
//! layer only validates configs and applies full sets of values. Each
//! resource and data source registers a handler, and [`GrafanaProvider`]
//! dispatches lifecycle calls by type name.
//!
//! Two policies are enforced centrally, for every resource:
//!
//! - a not-found during Read drops the resource from state (`Ok(None)`)
//!   instead of failing the refresh;
//! - a not-found during Delete counts as already deleted.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::context::ProviderContext;
use crate::error::ProviderError;
use crate::schema::{has_errors, Diagnostic, DescriptionFormatter, ProviderSchema, Schema};
use crate::validation::validate;
use crate::{config, datasources, resources};

/// Names of the resource and data source types a provider serves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
    /// List of data source type names.
    pub data_sources: Vec<String>,
}

/// Trait implemented by each managed resource type.
///
/// Handlers are invoked with a shared, immutable [`ProviderContext`]; each
/// invocation is a synchronous call sequence with no internal parallelism.
#[async_trait::async_trait]
pub trait ResourceHandler: Send + Sync {
    /// The resource type name (e.g. `grafana_annotation`).
    fn type_name(&self) -> &'static str;

    /// The resource schema.
    fn schema(&self) -> Schema;

    /// Cross-field checks beyond what the schema declares.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Create the remote object and return the normalized state.
    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Refresh state from the remote object.
    ///
    /// `Ok(None)` means the object no longer exists and must be dropped from
    /// state.
    async fn read(
        &self,
        ctx: &ProviderContext,
        state: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Apply the planned full set of values to the remote object.
    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, ctx: &ProviderContext, state: Value) -> Result<(), ProviderError>;

    /// Build importable state from a textual ID.
    async fn import(&self, ctx: &ProviderContext, id: &str) -> Result<Value, ProviderError> {
        let _ = ctx;
        Err(ProviderError::Unsupported(format!(
            "import is not supported for {} (id {})",
            self.type_name(),
            id
        )))
    }
}

/// Trait implemented by each read-only data source type.
#[async_trait::async_trait]
pub trait DataSourceHandler: Send + Sync {
    /// The data source type name.
    fn type_name(&self) -> &'static str;

    /// The data source schema.
    fn schema(&self) -> Schema;

    /// Cross-field checks beyond what the schema declares.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Query remote state for the given config.
    async fn read(&self, ctx: &ProviderContext, config: Value) -> Result<Value, ProviderError>;
}

/// The handler surface the plugin protocol invokes.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Return the resource and data source type names.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.keys().cloned().collect();
        let mut data_sources: Vec<String> = schema.data_sources.keys().cloned().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
        }
    }

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Validate a resource's configuration.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Create a new resource.
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Read the current state of a resource. `Ok(None)` means the resource
    /// is gone and must be dropped from state.
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Update an existing resource with the planned full set of values.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Value, ProviderError>;

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Read data from an external source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError>;
}

/// The Grafana provider: a registry of resource and data source handlers
/// plus the shared client context.
pub struct GrafanaProvider {
    resources: HashMap<&'static str, Box<dyn ResourceHandler>>,
    data_sources: HashMap<&'static str, Box<dyn DataSourceHandler>>,
    context: RwLock<Option<Arc<ProviderContext>>>,
}

impl GrafanaProvider {
    /// Create a provider with every known resource and data source
    /// registered.
    pub fn new() -> Self {
        let mut resource_map: HashMap<&'static str, Box<dyn ResourceHandler>> = HashMap::new();
        for handler in resources::all() {
            resource_map.insert(handler.type_name(), handler);
        }
        let mut data_source_map: HashMap<&'static str, Box<dyn DataSourceHandler>> =
            HashMap::new();
        for handler in datasources::all() {
            data_source_map.insert(handler.type_name(), handler);
        }
        Self {
            resources: resource_map,
            data_sources: data_source_map,
            context: RwLock::new(None),
        }
    }

    fn context(&self) -> Result<Arc<ProviderContext>, ProviderError> {
        self.context
            .read()
            .expect("context lock poisoned")
            .clone()
            .ok_or_else(|| {
                ProviderError::Configuration("the provider has not been configured".to_string())
            })
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn ResourceHandler, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|h| h.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(
        &self,
        data_source_type: &str,
    ) -> Result<&dyn DataSourceHandler, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .map(|h| h.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

impl Default for GrafanaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProviderService for GrafanaProvider {
    fn schema(&self) -> ProviderSchema {
        let formatter = DescriptionFormatter::markdown();
        let mut schema = ProviderSchema::new();

        let mut provider = config::provider_config_schema();
        formatter.apply(&mut provider);
        schema = schema.with_provider_config(provider);

        for handler in self.resources.values() {
            let mut resource_schema = handler.schema();
            formatter.apply(&mut resource_schema);
            schema = schema.with_resource(handler.type_name(), resource_schema);
        }
        for handler in self.data_sources.values() {
            let mut data_source_schema = handler.schema();
            formatter.apply(&mut data_source_schema);
            schema = schema.with_data_source(handler.type_name(), data_source_schema);
        }
        schema
    }

    #[instrument(skip(self, config), name = "provider.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&config::provider_config_schema(), &config))
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validate(&config::provider_config_schema(), &config);
        if has_errors(&diagnostics) {
            warn!(diagnostics = diagnostics.len(), "provider config is invalid");
            return Ok(diagnostics);
        }

        let resolved = config::ProviderConfig::resolve(&config)?;
        let context = ProviderContext::new(resolved)?;
        *self.context.write().expect("context lock poisoned") = Some(Arc::new(context));
        info!("provider configured");
        Ok(diagnostics)
    }

    #[instrument(skip(self, config), name = "provider.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let handler = self.resource(resource_type)?;
        let mut diagnostics = validate(&handler.schema(), &config);
        diagnostics.extend(handler.validate(&config));
        debug!(resource_type, diagnostics = diagnostics.len(), "resource config validated");
        Ok(diagnostics)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.resource(resource_type)?;
        let ctx = self.context()?;
        info!(resource_type, "creating resource");
        handler.create(&ctx, planned_state).await
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let handler = self.resource(resource_type)?;
        let ctx = self.context()?;
        match handler.read(&ctx, current_state).await {
            Ok(state) => Ok(state),
            Err(e) if e.is_not_found() => {
                warn!(resource_type, error = %e, "remote object gone, dropping from state");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.resource(resource_type)?;
        let ctx = self.context()?;
        info!(resource_type, "updating resource");
        handler.update(&ctx, prior_state, planned_state).await
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let handler = self.resource(resource_type)?;
        let ctx = self.context()?;
        info!(resource_type, "deleting resource");
        match handler.delete(&ctx, current_state).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(resource_type, "remote object already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), name = "provider.import_resource")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Value, ProviderError> {
        let handler = self.resource(resource_type)?;
        let ctx = self.context()?;
        info!(resource_type, id, "importing resource");
        handler.import(&ctx, id).await
    }

    #[instrument(skip(self, config), name = "provider.validate_data_source_config")]
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let handler = self.data_source(data_source_type)?;
        let mut diagnostics = validate(&handler.schema(), &config);
        diagnostics.extend(handler.validate(&config));
        Ok(diagnostics)
    }

    #[instrument(skip(self, config), name = "provider.read_data_source")]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.data_source(data_source_type)?;

        // Validation failures must short-circuit before any network call,
        // even when the orchestrator skipped the validate phase.
        let mut diagnostics = validate(&handler.schema(), &config);
        diagnostics.extend(handler.validate(&config));
        if let Some(error) = diagnostics
            .iter()
            .find(|d| matches!(d.severity, crate::schema::DiagnosticSeverity::Error))
        {
            return Err(ProviderError::Validation(error.summary.clone()));
        }

        let ctx = self.context()?;
        debug!(data_source_type, "reading data source");
        handler.read(&ctx, config).await
    }
}
