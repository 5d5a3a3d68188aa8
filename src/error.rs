//! Error types for the Lattice Provider SDK.

use crate::state::ResourceState;
use thiserror::Error;

/// A boxed error returned by provider-authored callbacks.
///
/// CRUD callbacks and `ConfigureFunc` return whatever error type the
/// provider uses internally; the SDK wraps it without inspecting it.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by the schema, diff, and apply pipeline.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The schema is self-inconsistent. Raised by `internal_validate` at
    /// provider registration and fatal to the whole provider.
    #[error("invalid schema: {0}")]
    SchemaDeclaration(String),

    /// A value could not be coerced to its declared type.
    #[error("type mismatch at {path}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Flat attribute path of the offending value.
        path: String,
        /// The declared type.
        expected: &'static str,
        /// A rendering of the value that was supplied.
        actual: String,
    },

    /// Dispatch found no resource registered under the given type name.
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    /// A CRUD callback failed. Carries the partial state so the engine
    /// can persist it instead of orphaning the remote resource.
    #[error("callback failed: {source}")]
    Callback {
        /// State as the callback left it; the id reflects any `set_id`.
        partial: Box<ResourceState>,
        /// The provider's own error.
        #[source]
        source: CallbackError,
    },

    /// Provider configuration failed, or a resource operation ran before
    /// `configure`.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The resource does not implement the requested operation.
    #[error("unsupported operation: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// The partial state carried by a [`ProviderError::Callback`], if any.
    ///
    /// Engines persist this state even on failure so that a half-created
    /// resource stays tracked and a later diff can resume it.
    pub fn partial_state(&self) -> Option<&ResourceState> {
        match self {
            ProviderError::Callback { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::UnknownResourceType("lattice_app".to_string());
        assert_eq!(format!("{}", err), "unknown resource type: lattice_app");

        let err = ProviderError::TypeMismatch {
            path: "port".to_string(),
            expected: "int",
            actual: "\"eighty\"".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "type mismatch at port: expected int, got \"eighty\""
        );
    }

    #[test]
    fn test_partial_state_accessor() {
        let mut state = ResourceState::new("lattice_app");
        state.id = "app-1".to_string();

        let err = ProviderError::Callback {
            partial: Box::new(state),
            source: "remote API returned 500".into(),
        };

        assert_eq!(err.partial_state().unwrap().id, "app-1");
        assert!(format!("{}", err).contains("remote API returned 500"));

        let err = ProviderError::Configuration("missing credentials".to_string());
        assert!(err.partial_state().is_none());
    }
}
