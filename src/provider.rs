//! The provider: resources, provider-level configuration, and meta.

use crate::config::ResourceConfig;
use crate::data::ResourceData;
use crate::diff::InstanceDiff;
use crate::error::{CallbackError, ProviderError};
use crate::resource::Resource;
use crate::schema::{Diagnostic, SchemaMap};
use crate::state::ResourceState;
use std::collections::BTreeMap;
use std::fmt;

/// Builds the provider's meta from its validated configuration.
///
/// The returned value (API clients, credentials) is stored on the
/// provider and passed by reference into every CRUD callback. It must be
/// safe for concurrent reads; the core never serializes access to it.
pub type ConfigureFunc<M> = Box<dyn Fn(&ResourceData) -> Result<M, CallbackError> + Send + Sync>;

/// A resource provider: a schema for its own configuration, a set of
/// managed resource types, and the configure hook producing the meta.
///
/// Lifecycle: `internal_validate` once at registration, `validate` and
/// `configure` once per run, then any number of
/// `validate_resource` / `diff` / `apply` / `refresh` calls. After
/// construction the provider is read-only apart from `configure`, which
/// writes the meta exactly once before resource operations begin.
pub struct Provider<M> {
    schema: SchemaMap,
    resources: BTreeMap<String, Resource<M>>,
    configure: Option<ConfigureFunc<M>>,
    meta: Option<M>,
}

impl<M> fmt::Debug for Provider<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("schema", &self.schema)
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("configure", &self.configure.is_some())
            .field("configured", &self.meta.is_some())
            .finish()
    }
}

impl<M> Default for Provider<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Provider<M> {
    /// An empty provider with no schema, resources, or configure hook.
    pub fn new() -> Self {
        Self {
            schema: SchemaMap::new(),
            resources: BTreeMap::new(),
            configure: None,
            meta: None,
        }
    }

    /// Set the provider-level configuration schema.
    pub fn with_schema(mut self, schema: SchemaMap) -> Self {
        self.schema = schema;
        self
    }

    /// Register a resource under its type name.
    pub fn with_resource(mut self, type_name: impl Into<String>, resource: Resource<M>) -> Self {
        self.resources.insert(type_name.into(), resource);
        self
    }

    /// Set the configure hook.
    pub fn with_configure(
        mut self,
        f: impl Fn(&ResourceData) -> Result<M, CallbackError> + Send + Sync + 'static,
    ) -> Self {
        self.configure = Some(Box::new(f));
        self
    }

    /// Validate the provider declaration: its own schema and every
    /// registered resource. Run this from a test in every provider; a
    /// failure here is fatal and must never ship.
    pub fn internal_validate(&self) -> Result<(), ProviderError> {
        self.schema.internal_validate()?;
        for (name, resource) in &self.resources {
            resource.internal_validate().map_err(|e| match e {
                ProviderError::SchemaDeclaration(msg) => {
                    ProviderError::SchemaDeclaration(format!("{}: {}", name, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Validate the provider-level configuration.
    pub fn validate(&self, config: &ResourceConfig) -> Vec<Diagnostic> {
        self.schema.validate(config)
    }

    /// Validate a resource configuration against the named type's schema.
    pub fn validate_resource(
        &self,
        type_name: &str,
        config: &ResourceConfig,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.resource(type_name)?.validate(config))
    }

    /// Configure the provider and store the resulting meta.
    ///
    /// The configuration is diffed against no state first so that schema
    /// defaults apply, then handed to the configure hook as a
    /// [`ResourceData`]. Without a configure hook this is a no-op; use
    /// [`set_meta`](Self::set_meta) for providers whose meta does not
    /// come from configuration.
    pub fn configure(&mut self, config: &ResourceConfig) -> Result<(), ProviderError> {
        let Some(f) = &self.configure else {
            return Ok(());
        };
        let diff = self.schema.diff(None, config)?;
        let data = self.schema.data(None, Some(&diff));
        let meta = f(&data).map_err(|e| ProviderError::Configuration(e.to_string()))?;
        self.meta = Some(meta);
        tracing::debug!("provider configured");
        Ok(())
    }

    /// The meta produced by `configure`, if any.
    pub fn meta(&self) -> Option<&M> {
        self.meta.as_ref()
    }

    /// Forcefully set the meta. `configure` overrides anything set here.
    pub fn set_meta(&mut self, meta: M) {
        self.meta = Some(meta);
    }

    /// Diff a resource instance against its configuration. Dispatches on
    /// the state's type name.
    pub fn diff(
        &self,
        state: &ResourceState,
        config: &ResourceConfig,
    ) -> Result<InstanceDiff, ProviderError> {
        let resource = self.resource(&state.type_name)?;
        resource.diff(Some(state), config)
    }

    /// Apply a diff to a resource instance.
    pub fn apply(
        &self,
        state: &ResourceState,
        diff: &InstanceDiff,
    ) -> Result<ResourceState, ProviderError> {
        let resource = self.resource(&state.type_name)?;
        resource.apply(state, diff, self.require_meta()?)
    }

    /// Re-read a resource instance's remote state.
    pub fn refresh(&self, state: &ResourceState) -> Result<ResourceState, ProviderError> {
        let resource = self.resource(&state.type_name)?;
        resource.refresh(state, self.require_meta()?)
    }

    /// The supported resource type names, sorted.
    pub fn resource_types(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }

    fn resource(&self, type_name: &str) -> Result<&Resource<M>, ProviderError> {
        self.resources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResourceType(type_name.to_string()))
    }

    fn require_meta(&self) -> Result<&M, ProviderError> {
        self.meta
            .as_ref()
            .ok_or_else(|| ProviderError::Configuration("provider is not configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    struct ApiClient {
        token: String,
    }

    fn test_provider() -> Provider<ApiClient> {
        let app = Resource::new(
            SchemaMap::new()
                .with_attribute("name", Attribute::required_string())
                .with_attribute("id", Attribute::computed_string()),
        )
        .create(|d, client: &ApiClient| {
            let name = d.get("name").flat_string();
            d.set_id(format!("{}@{}", name, client.token));
            Ok(())
        })
        .read(|_, _| Ok(()))
        .update(|_, _| Ok(()))
        .delete(|_, _| Ok(()));

        Provider::new()
            .with_schema(
                SchemaMap::new()
                    .with_attribute("token", Attribute::required_string().sensitive())
                    .with_attribute(
                        "endpoint",
                        Attribute::optional_string()
                            .with_default("https://api.lattice.dev"),
                    ),
            )
            .with_configure(|d| {
                Ok(ApiClient {
                    token: d.get("token").flat_string(),
                })
            })
            .with_resource("lattice_app", app)
    }

    #[test]
    fn test_internal_validate_covers_resources() {
        assert!(test_provider().internal_validate().is_ok());

        let broken = Provider::<()>::new().with_resource(
            "lattice_broken",
            Resource::new(
                SchemaMap::new().with_attribute("name", Attribute::required_string()),
            ),
        );
        let err = broken.internal_validate().unwrap_err();
        assert!(format!("{}", err).contains("lattice_broken"));
    }

    #[test]
    fn test_configure_applies_defaults_and_stores_meta() {
        let mut provider = test_provider();
        provider
            .configure(&ResourceConfig::from_json(json!({"token": "t0ken"})))
            .unwrap();

        assert_eq!(provider.meta().unwrap().token, "t0ken");
    }

    #[test]
    fn test_configure_failure_is_surfaced() {
        let mut provider = Provider::<()>::new()
            .with_configure(|_| Err("bad credentials".into()));

        let err = provider
            .configure(&ResourceConfig::from_json(json!({})))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(format!("{}", err).contains("bad credentials"));
    }

    #[test]
    fn test_dispatch_rejects_unknown_type() {
        let provider = test_provider();
        let state = ResourceState::new("lattice_dns_zone");
        let config = ResourceConfig::from_json(json!({}));

        assert!(matches!(
            provider.diff(&state, &config),
            Err(ProviderError::UnknownResourceType(_))
        ));
        assert!(matches!(
            provider.apply(&state, &InstanceDiff::new()),
            Err(ProviderError::UnknownResourceType(_))
        ));
        assert!(matches!(
            provider.refresh(&state),
            Err(ProviderError::UnknownResourceType(_))
        ));
        assert!(matches!(
            provider.validate_resource("lattice_dns_zone", &config),
            Err(ProviderError::UnknownResourceType(_))
        ));
    }

    #[test]
    fn test_apply_requires_configuration() {
        let provider = test_provider();
        let state = ResourceState::new("lattice_app");

        let diff = provider
            .diff(&state, &ResourceConfig::from_json(json!({"name": "app"})))
            .unwrap();
        let err = provider.apply(&state, &diff).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_full_cycle_threads_meta_into_callbacks() {
        let mut provider = test_provider();
        provider
            .configure(&ResourceConfig::from_json(json!({"token": "t0ken"})))
            .unwrap();

        let state = ResourceState::new("lattice_app");
        let config = ResourceConfig::from_json(json!({"name": "app"}));
        let diff = provider.diff(&state, &config).unwrap();
        let new_state = provider.apply(&state, &diff).unwrap();

        assert_eq!(new_state.id, "app@t0ken");
    }

    #[test]
    fn test_resource_types_sorted() {
        let noop = |schema: SchemaMap| {
            Resource::<ApiClient>::new(schema)
                .create(|_, _| Ok(()))
                .read(|_, _| Ok(()))
                .delete(|_, _| Ok(()))
        };
        let provider = test_provider()
            .with_resource(
                "lattice_dns_zone",
                noop(SchemaMap::new()
                    .with_attribute("domain", Attribute::required_string().force_new())),
            )
            .with_resource(
                "lattice_alias",
                noop(SchemaMap::new()
                    .with_attribute("target", Attribute::required_string().force_new())),
            );

        assert_eq!(
            provider.resource_types(),
            vec!["lattice_alias", "lattice_app", "lattice_dns_zone"]
        );
    }
}
