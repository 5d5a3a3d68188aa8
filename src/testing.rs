//! Test utilities for provider implementations.
//!
//! [`ProviderHarness`] wraps a [`Provider`] and drives the full
//! plan/apply pipeline the way the engine would, with JSON literals as
//! configuration. Constructing the harness runs `internal_validate`, so
//! any provider with a test gets its schema declarations checked before
//! release.
//!
//! # Example
//!
//! ```ignore
//! use lattice_provider_sdk::testing::ProviderHarness;
//! use serde_json::json;
//!
//! let mut harness = ProviderHarness::new(my_provider());
//! harness.configure(json!({"token": "test"})).unwrap();
//!
//! let state = harness.create("my_app", json!({"name": "web"})).unwrap();
//! assert_eq!(state.get_attribute("name"), Some("web"));
//! ```

use crate::config::ResourceConfig;
use crate::diff::InstanceDiff;
use crate::error::ProviderError;
use crate::provider::Provider;
use crate::schema::{Diagnostic, DiagnosticSeverity};
use crate::state::ResourceState;

/// A test harness driving a provider through the engine-side interface.
pub struct ProviderHarness<M> {
    provider: Provider<M>,
}

impl<M> ProviderHarness<M> {
    /// Wrap a provider, validating its declarations first.
    ///
    /// # Panics
    ///
    /// Panics when `internal_validate` fails; a provider with an
    /// inconsistent schema must not reach any further testing.
    pub fn new(provider: Provider<M>) -> Self {
        if let Err(e) = provider.internal_validate() {
            panic!("provider failed internal validation: {}", e);
        }
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &Provider<M> {
        &self.provider
    }

    /// Mutable access to the wrapped provider.
    pub fn provider_mut(&mut self) -> &mut Provider<M> {
        &mut self.provider
    }

    /// Configure the provider from a JSON configuration.
    pub fn configure(&mut self, config: serde_json::Value) -> Result<(), ProviderError> {
        self.provider.configure(&ResourceConfig::from_json(config))
    }

    /// Install the meta directly, bypassing the configure hook.
    pub fn set_meta(&mut self, meta: M) {
        self.provider.set_meta(meta);
    }

    /// Validate a provider-level configuration.
    pub fn validate(&self, config: serde_json::Value) -> Vec<Diagnostic> {
        self.provider.validate(&ResourceConfig::from_json(config))
    }

    /// Validate a resource configuration.
    pub fn validate_resource(
        &self,
        type_name: &str,
        config: serde_json::Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        self.provider
            .validate_resource(type_name, &ResourceConfig::from_json(config))
    }

    /// Diff a configuration against prior state (or no state).
    pub fn diff(
        &self,
        type_name: &str,
        state: Option<&ResourceState>,
        config: serde_json::Value,
    ) -> Result<InstanceDiff, ProviderError> {
        self.diff_config(type_name, state, ResourceConfig::from_json(config))
    }

    /// Like [`diff`](Self::diff) but takes a prepared [`ResourceConfig`],
    /// for configurations with deferred values.
    pub fn diff_config(
        &self,
        type_name: &str,
        state: Option<&ResourceState>,
        config: ResourceConfig,
    ) -> Result<InstanceDiff, ProviderError> {
        let blank = ResourceState::new(type_name);
        self.provider.diff(state.unwrap_or(&blank), &config)
    }

    /// Apply a diff to a state.
    pub fn apply(
        &self,
        state: &ResourceState,
        diff: &InstanceDiff,
    ) -> Result<ResourceState, ProviderError> {
        self.provider.apply(state, diff)
    }

    /// Refresh a state from the remote side.
    pub fn refresh(&self, state: &ResourceState) -> Result<ResourceState, ProviderError> {
        self.provider.refresh(state)
    }

    /// Full create cycle: diff from no state, then apply.
    pub fn create(
        &self,
        type_name: &str,
        config: serde_json::Value,
    ) -> Result<ResourceState, ProviderError> {
        let state = ResourceState::new(type_name);
        let diff = self.diff(type_name, Some(&state), config)?;
        self.provider.apply(&state, &diff)
    }

    /// Full update cycle: diff against prior state, then apply.
    pub fn update(
        &self,
        state: &ResourceState,
        config: serde_json::Value,
    ) -> Result<ResourceState, ProviderError> {
        let diff = self.diff(&state.type_name, Some(state), config)?;
        self.provider.apply(state, &diff)
    }

    /// Destroy cycle: apply a destroy diff.
    pub fn destroy(&self, state: &ResourceState) -> Result<ResourceState, ProviderError> {
        self.provider.apply(state, &InstanceDiff::new_destroy())
    }

    /// Supported resource type names, sorted.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.resource_types()
    }
}

// =========================================================================
// Assertion helpers
// =========================================================================

/// Assert that a diff records no changes at all.
///
/// # Panics
///
/// Panics listing the changed paths otherwise.
pub fn assert_diff_empty(diff: &InstanceDiff) {
    assert!(
        diff.is_empty(),
        "expected empty diff, got {} change(s): {:?}",
        diff.len(),
        diff.attributes.keys().collect::<Vec<_>>()
    );
}

/// Assert that a diff records at least one change.
pub fn assert_diff_has_changes(diff: &InstanceDiff) {
    assert!(!diff.is_empty(), "expected changes, got an empty diff");
}

/// Assert that a diff touches the given flat path (or something nested
/// under it).
pub fn assert_diff_changes_attribute(diff: &InstanceDiff, path: &str) {
    assert!(
        diff.has_change(path),
        "expected a change at '{}'; changed paths: {:?}",
        path,
        diff.attributes.keys().collect::<Vec<_>>()
    );
}

/// Assert that a diff does not touch the given flat path.
pub fn assert_diff_does_not_change_attribute(diff: &InstanceDiff, path: &str) {
    assert!(
        !diff.has_change(path),
        "expected no change at '{}', but it changed",
        path
    );
}

/// Assert that the diff forces resource replacement.
pub fn assert_diff_replaces(diff: &InstanceDiff) {
    assert!(
        diff.requires_new(),
        "expected the diff to force replacement, but it updates in place"
    );
}

/// Assert that the diff updates in place.
pub fn assert_diff_updates_in_place(diff: &InstanceDiff) {
    assert!(
        !diff.requires_new(),
        "expected an in-place update, but the diff forces replacement"
    );
}

/// Assert that the entry at `path` is pending computation.
pub fn assert_new_computed(diff: &InstanceDiff, path: &str) {
    match diff.get(path) {
        Some(entry) => assert!(
            entry.new_computed,
            "expected '{}' to be pending computation, got {:?}",
            path, entry
        ),
        None => panic!(
            "expected a pending entry at '{}'; changed paths: {:?}",
            path,
            diff.attributes.keys().collect::<Vec<_>>()
        ),
    }
}

/// Assert that no diagnostic is an error.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert!(
        errors.is_empty(),
        "expected no errors, got {}: {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that at least one diagnostic is an error.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(|d| d.is_error()),
        "expected at least one error diagnostic, got none"
    );
}

/// Assert that some error diagnostic's summary contains `substring`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let found = diagnostics
        .iter()
        .any(|d| d.is_error() && d.summary.contains(substring));
    assert!(
        found,
        "no error containing '{}'; errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

/// Assert that some warning diagnostic's summary contains `substring`.
pub fn assert_warning_contains(diagnostics: &[Diagnostic], substring: &str) {
    let found = diagnostics
        .iter()
        .any(|d| d.severity == DiagnosticSeverity::Warning && d.summary.contains(substring));
    assert!(
        found,
        "no warning containing '{}'; diagnostics: {:?}",
        substring,
        diagnostics.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::AttributeDiff;
    use crate::resource::Resource;
    use crate::schema::{Attribute, SchemaMap};
    use serde_json::json;

    fn demo_provider() -> Provider<()> {
        let app = Resource::new(
            SchemaMap::new()
                .with_attribute("name", Attribute::required_string())
                .with_attribute("id", Attribute::computed_string()),
        )
        .create(|d, _| {
            let name = d.get("name").flat_string();
            d.set_id(format!("{}-1", name));
            Ok(())
        })
        .read(|d, _| {
            let id = d.id();
            d.set("id", id)?;
            Ok(())
        })
        .update(|_, _| Ok(()))
        .delete(|_, _| Ok(()));

        Provider::new().with_resource("lattice_app", app)
    }

    #[test]
    fn test_harness_create_and_destroy() {
        let mut harness = ProviderHarness::new(demo_provider());
        harness.set_meta(());

        let state = harness.create("lattice_app", json!({"name": "web"})).unwrap();
        assert_eq!(state.id, "web-1");

        let gone = harness.destroy(&state).unwrap();
        assert!(!gone.is_created());
    }

    #[test]
    fn test_harness_diff_without_state() {
        let harness = ProviderHarness::new(demo_provider());

        let diff = harness
            .diff("lattice_app", None, json!({"name": "web"}))
            .unwrap();
        assert_diff_has_changes(&diff);
        assert_diff_changes_attribute(&diff, "name");
        assert_new_computed(&diff, "id");
        assert_diff_updates_in_place(&diff);
    }

    #[test]
    #[should_panic(expected = "internal validation")]
    fn test_harness_rejects_invalid_provider() {
        // `update` is missing although `name` changes in place.
        let broken = Provider::<()>::new().with_resource(
            "lattice_broken",
            Resource::new(
                SchemaMap::new().with_attribute("name", Attribute::required_string()),
            )
            .create(|_, _| Ok(()))
            .read(|_, _| Ok(()))
            .delete(|_, _| Ok(())),
        );
        ProviderHarness::new(broken);
    }

    #[test]
    #[should_panic(expected = "expected empty diff")]
    fn test_assert_diff_empty_fails() {
        let diff = InstanceDiff::new().with_attribute("name", AttributeDiff::change("a", "b"));
        assert_diff_empty(&diff);
    }

    #[test]
    fn test_diagnostic_assertions() {
        let diags = vec![
            crate::schema::Diagnostic::warning("'region' is deprecated"),
            crate::schema::Diagnostic::error("Missing required attribute 'name'"),
        ];

        assert_has_errors(&diags);
        assert_error_contains(&diags, "'name'");
        assert_warning_contains(&diags, "deprecated");
        assert_no_errors(&[crate::schema::Diagnostic::warning("only a warning")]);
    }
}
