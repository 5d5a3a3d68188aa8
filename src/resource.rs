//! A resource: a schema plus CRUD callbacks, and the apply state machine
//! that drives them.

use crate::config::ResourceConfig;
use crate::data::ResourceData;
use crate::diff::InstanceDiff;
use crate::error::{CallbackError, ProviderError};
use crate::schema::{Diagnostic, SchemaMap};
use crate::state::ResourceState;
use std::fmt;

/// Result type returned by provider CRUD callbacks.
pub type CallbackResult = Result<(), CallbackError>;

/// A CRUD callback: reads inputs and writes outputs through the
/// [`ResourceData`] handle, with the provider's meta alongside.
pub type ResourceFunc<M> = Box<dyn Fn(&mut ResourceData, &M) -> CallbackResult + Send + Sync>;

/// One managed resource type: its attribute schema and the callbacks that
/// realize it remotely.
///
/// The generic parameter `M` is the provider's meta type (API clients,
/// credentials) produced by its configure hook and passed into every
/// callback.
pub struct Resource<M> {
    /// The attribute schema driving validation, diffing, and access.
    pub schema: SchemaMap,
    create: Option<ResourceFunc<M>>,
    read: Option<ResourceFunc<M>>,
    update: Option<ResourceFunc<M>>,
    delete: Option<ResourceFunc<M>>,
}

impl<M> fmt::Debug for Resource<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("schema", &self.schema)
            .field("create", &self.create.is_some())
            .field("read", &self.read.is_some())
            .field("update", &self.update.is_some())
            .field("delete", &self.delete.is_some())
            .finish()
    }
}

impl<M> Resource<M> {
    /// Create a resource with the given schema and no callbacks.
    pub fn new(schema: SchemaMap) -> Self {
        Self {
            schema,
            create: None,
            read: None,
            update: None,
            delete: None,
        }
    }

    /// Register the create callback.
    pub fn create(
        mut self,
        f: impl Fn(&mut ResourceData, &M) -> CallbackResult + Send + Sync + 'static,
    ) -> Self {
        self.create = Some(Box::new(f));
        self
    }

    /// Register the read callback.
    pub fn read(
        mut self,
        f: impl Fn(&mut ResourceData, &M) -> CallbackResult + Send + Sync + 'static,
    ) -> Self {
        self.read = Some(Box::new(f));
        self
    }

    /// Register the update callback.
    pub fn update(
        mut self,
        f: impl Fn(&mut ResourceData, &M) -> CallbackResult + Send + Sync + 'static,
    ) -> Self {
        self.update = Some(Box::new(f));
        self
    }

    /// Register the delete callback.
    pub fn delete(
        mut self,
        f: impl Fn(&mut ResourceData, &M) -> CallbackResult + Send + Sync + 'static,
    ) -> Self {
        self.delete = Some(Box::new(f));
        self
    }

    /// Validate the resource declaration: the schema itself, and that the
    /// registered callbacks can actually service it. An attribute that
    /// can change in place demands an `update` callback even when other
    /// attributes force replacement.
    pub fn internal_validate(&self) -> Result<(), ProviderError> {
        self.schema.internal_validate()?;

        if self.create.is_none() || self.read.is_none() || self.delete.is_none() {
            return Err(ProviderError::SchemaDeclaration(
                "managed resources require create, read, and delete callbacks".to_string(),
            ));
        }

        let updatable_in_place = self
            .schema
            .iter()
            .any(|(_, a)| (a.required || a.optional) && !a.force_new);
        if updatable_in_place && self.update.is_none() {
            return Err(ProviderError::SchemaDeclaration(
                "update callback required: schema has attributes that change in place"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Validate a configuration against this resource's schema.
    pub fn validate(&self, config: &ResourceConfig) -> Vec<Diagnostic> {
        self.schema.validate(config)
    }

    /// Compute the diff between prior state and configuration.
    pub fn diff(
        &self,
        state: Option<&ResourceState>,
        config: &ResourceConfig,
    ) -> Result<InstanceDiff, ProviderError> {
        self.schema.diff(state, config)
    }

    /// Apply a diff to the resource, driving the CRUD callbacks.
    ///
    /// An empty diff is a no-op and invokes nothing. A destroy diff runs
    /// `delete`. A replacement diff runs `delete` then `create`. All
    /// other diffs run `create` or `update` depending on whether the
    /// resource exists, followed by `read` to pick up computed values.
    ///
    /// On callback failure the returned error carries the partial state
    /// (with any id the callback recorded) for the engine to persist.
    pub fn apply(
        &self,
        state: &ResourceState,
        diff: &InstanceDiff,
        meta: &M,
    ) -> Result<ResourceState, ProviderError> {
        if diff.destroy {
            return self.destroy_instance(state, meta);
        }
        if diff.is_empty() {
            return Ok(state.clone());
        }
        if diff.requires_new() && state.is_created() {
            tracing::debug!(
                resource = %state.type_name,
                id = %state.id,
                "replacing resource"
            );
            self.destroy_instance(state, meta)?;
            let blank = ResourceState::new(&state.type_name);
            return self.create_instance(&blank, diff, meta);
        }
        if !state.is_created() {
            return self.create_instance(state, diff, meta);
        }
        self.update_instance(state, diff, meta)
    }

    /// Re-read remote state. A read that clears the id reports the
    /// resource as gone; the caller decides whether to drop it.
    pub fn refresh(
        &self,
        state: &ResourceState,
        meta: &M,
    ) -> Result<ResourceState, ProviderError> {
        let read = self.callback(&self.read, "read")?;
        let mut data = self.schema.data(Some(state), None);
        read(&mut data, meta).map_err(|e| callback_failed(state.clone(), e))?;

        let refreshed = data.to_state(&state.type_name);
        if !refreshed.is_created() {
            tracing::debug!(resource = %state.type_name, id = %state.id, "resource gone");
        }
        Ok(refreshed)
    }

    fn create_instance(
        &self,
        state: &ResourceState,
        diff: &InstanceDiff,
        meta: &M,
    ) -> Result<ResourceState, ProviderError> {
        let create = self.callback(&self.create, "create")?;
        tracing::debug!(resource = %state.type_name, "creating resource");

        let mut data = self.schema.data(Some(state), Some(diff));
        if let Err(e) = create(&mut data, meta) {
            // Writes are discarded, but the id survives so the engine
            // keeps tracking whatever was created remotely.
            let mut partial = state.clone();
            partial.id = data.id();
            return Err(callback_failed(partial, e));
        }
        self.post_apply_read(data.to_state(&state.type_name), meta)
    }

    fn update_instance(
        &self,
        state: &ResourceState,
        diff: &InstanceDiff,
        meta: &M,
    ) -> Result<ResourceState, ProviderError> {
        let update = self.callback(&self.update, "update")?;
        tracing::debug!(resource = %state.type_name, id = %state.id, "updating resource");

        let mut data = self.schema.data(Some(state), Some(diff));
        if let Err(e) = update(&mut data, meta) {
            let mut partial = state.clone();
            partial.id = data.id();
            return Err(callback_failed(partial, e));
        }
        self.post_apply_read(data.to_state(&state.type_name), meta)
    }

    fn destroy_instance(
        &self,
        state: &ResourceState,
        meta: &M,
    ) -> Result<ResourceState, ProviderError> {
        let delete = self.callback(&self.delete, "delete")?;
        tracing::debug!(resource = %state.type_name, id = %state.id, "destroying resource");

        let mut data = self.schema.data(Some(state), None);
        delete(&mut data, meta).map_err(|e| callback_failed(state.clone(), e))?;
        Ok(ResourceState::new(&state.type_name))
    }

    /// Refresh computed attributes after a successful create or update.
    fn post_apply_read(
        &self,
        state: ResourceState,
        meta: &M,
    ) -> Result<ResourceState, ProviderError> {
        let read = self.callback(&self.read, "read")?;
        let mut data = self.schema.data(Some(&state), None);
        read(&mut data, meta).map_err(|e| callback_failed(state.clone(), e))?;
        Ok(data.to_state(&state.type_name))
    }

    fn callback<'a>(
        &self,
        f: &'a Option<ResourceFunc<M>>,
        name: &str,
    ) -> Result<&'a ResourceFunc<M>, ProviderError> {
        f.as_ref()
            .ok_or_else(|| ProviderError::Unimplemented(format!("resource has no {} callback", name)))
    }
}

fn callback_failed(partial: ResourceState, source: CallbackError) -> ProviderError {
    ProviderError::Callback {
        partial: Box::new(partial),
        source,
    }
}
