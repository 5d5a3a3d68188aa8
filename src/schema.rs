//! Schema types describing resource and provider attribute structure.
//!
//! A [`SchemaMap`] names a set of [`Attribute`]s; each attribute declares
//! its type, role (required / optional / computed), change policy
//! (`force_new`), and optional default and normalization hooks. The same
//! declaration drives configuration validation, structural diffing, and
//! the typed accessors handed to CRUD callbacks.

use crate::config::ResourceConfig;
use crate::data::ResourceData;
use crate::diff::InstanceDiff;
use crate::error::ProviderError;
use crate::state::ResourceState;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The type of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A 64-bit integer.
    Int,
    /// A boolean value.
    Bool,
    /// A string value.
    String,
    /// An ordered sequence; diffs are positional.
    List,
    /// An unordered collection; elements are keyed by a stable hash.
    Set,
    /// A flat mapping from string keys to primitive values.
    Map,
}

impl AttributeType {
    /// Short name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            AttributeType::Int => "int",
            AttributeType::Bool => "bool",
            AttributeType::String => "string",
            AttributeType::List => "list",
            AttributeType::Set => "set",
            AttributeType::Map => "map",
        }
    }

    /// True for `List`, `Set`, and `Map`.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            AttributeType::List | AttributeType::Set | AttributeType::Map
        )
    }
}

/// Element declaration for a container attribute.
#[derive(Clone)]
pub enum Elem {
    /// Container of primitives: each element follows the inner attribute.
    Attribute(Box<Attribute>),
    /// Container of objects: each element is a nested schema.
    Schema(SchemaMap),
}

impl fmt::Debug for Elem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Elem::Attribute(a) => f.debug_tuple("Attribute").field(a).finish(),
            Elem::Schema(s) => f.debug_tuple("Schema").field(s).finish(),
        }
    }
}

/// Normalizer applied to a value before comparison and storage.
pub type StateFunc = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Per-value validation hook; returns diagnostics for the given path.
pub type ValidateFunc = Arc<dyn Fn(&Value, &str) -> Vec<Diagnostic> + Send + Sync>;

/// Reduces a set element to its stable hash key.
pub type SetHashFunc = Arc<dyn Fn(&Value) -> u64 + Send + Sync>;

/// Describes a single named attribute in a schema.
#[derive(Clone)]
pub struct Attribute {
    /// The declared type.
    pub attr_type: AttributeType,
    /// The attribute must be present in configuration.
    pub required: bool,
    /// The attribute may be present in configuration.
    pub optional: bool,
    /// The value is determined by the provider rather than the user.
    /// Combined with `optional`, the user may set it and the provider
    /// fills it in when absent.
    pub computed: bool,
    /// Any change to this attribute forces destroy-and-recreate.
    pub force_new: bool,
    /// Hidden in logs and rendered output; redaction is the engine's job.
    pub sensitive: bool,
    /// Human-readable description.
    pub description: Option<String>,
    /// Value used when the attribute is absent from configuration.
    pub default: Option<Value>,
    /// Element declaration; required for container types.
    pub elem: Option<Elem>,
    /// Optional normalizer applied before comparison and storage.
    pub state_func: Option<StateFunc>,
    /// Optional per-value validation hook.
    pub validate_func: Option<ValidateFunc>,
    /// Optional hash function for set elements; defaults to hashing the
    /// element's canonical flat form.
    pub set_hash: Option<SetHashFunc>,
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("attr_type", &self.attr_type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("force_new", &self.force_new)
            .field("sensitive", &self.sensitive)
            .field("default", &self.default)
            .field("elem", &self.elem)
            .field("state_func", &self.state_func.is_some())
            .field("validate_func", &self.validate_func.is_some())
            .field("set_hash", &self.set_hash.is_some())
            .finish()
    }
}

impl Attribute {
    /// Create an attribute of the given type with no role flags set.
    pub fn new(attr_type: AttributeType) -> Self {
        Self {
            attr_type,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            description: None,
            default: None,
            elem: None,
            state_func: None,
            validate_func: None,
            set_hash: None,
        }
    }

    /// A required string attribute.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String).required()
    }

    /// An optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String).optional()
    }

    /// A computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String).computed()
    }

    /// A required int attribute.
    pub fn required_int() -> Self {
        Self::new(AttributeType::Int).required()
    }

    /// An optional int attribute.
    pub fn optional_int() -> Self {
        Self::new(AttributeType::Int).optional()
    }

    /// A computed int attribute.
    pub fn computed_int() -> Self {
        Self::new(AttributeType::Int).computed()
    }

    /// A required bool attribute.
    pub fn required_bool() -> Self {
        Self::new(AttributeType::Bool).required()
    }

    /// An optional bool attribute.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool).optional()
    }

    /// A list attribute with the given element declaration.
    pub fn list(elem: Elem) -> Self {
        Self::new(AttributeType::List).with_elem(elem)
    }

    /// A set attribute with the given element declaration.
    pub fn set(elem: Elem) -> Self {
        Self::new(AttributeType::Set).with_elem(elem)
    }

    /// A map attribute with the given element declaration.
    pub fn map(elem: Elem) -> Self {
        Self::new(AttributeType::Map).with_elem(elem)
    }

    /// Mark the attribute required. Clears `optional`.
    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    /// Mark the attribute optional. Clears `required`.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self.required = false;
        self
    }

    /// Mark the attribute computed.
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Changing this attribute forces resource replacement.
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Mark the attribute sensitive.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the default value used when the attribute is absent.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set the element declaration for a container type.
    pub fn with_elem(mut self, elem: Elem) -> Self {
        self.elem = Some(elem);
        self
    }

    /// Set the normalizer applied before comparison and storage.
    pub fn with_state_func(
        mut self,
        f: impl Fn(&Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.state_func = Some(Arc::new(f));
        self
    }

    /// Set the per-value validation hook.
    pub fn with_validate_func(
        mut self,
        f: impl Fn(&Value, &str) -> Vec<Diagnostic> + Send + Sync + 'static,
    ) -> Self {
        self.validate_func = Some(Arc::new(f));
        self
    }

    /// Set the hash function used to key set elements.
    pub fn with_set_hash(mut self, f: impl Fn(&Value) -> u64 + Send + Sync + 'static) -> Self {
        self.set_hash = Some(Arc::new(f));
        self
    }

    /// Validate the declaration itself. Called once per attribute at
    /// provider registration; failures are fatal to the whole provider.
    pub fn internal_validate(&self, path: &str) -> Result<(), ProviderError> {
        if self.required && self.optional {
            return Err(declaration(path, "cannot be both required and optional"));
        }
        if self.required && self.computed {
            return Err(declaration(path, "cannot be both required and computed"));
        }
        if !self.required && !self.optional && !self.computed {
            return Err(declaration(
                path,
                "one of required, optional, or computed must be set",
            ));
        }
        if self.default.is_some() && self.required {
            return Err(declaration(path, "default conflicts with required"));
        }
        if let Some(default) = &self.default {
            if default.coerce(self.attr_type, path).is_err() {
                return Err(declaration(path, "default does not fit the declared type"));
            }
        }
        self.internal_validate_shape(path)
    }

    /// Type-level checks shared with container element declarations,
    /// which carry no role flags of their own.
    fn internal_validate_shape(&self, path: &str) -> Result<(), ProviderError> {
        if self.attr_type.is_container() {
            match &self.elem {
                None => return Err(declaration(path, "container type requires an elem")),
                Some(Elem::Schema(_)) if self.attr_type == AttributeType::Map => {
                    return Err(declaration(
                        path,
                        "map of objects is not supported; use a list of objects \
                         or a map of primitives",
                    ));
                }
                Some(Elem::Schema(schema)) => {
                    for (name, attr) in schema.iter() {
                        attr.internal_validate(&format!("{}.{}", path, name))?;
                    }
                }
                Some(Elem::Attribute(inner)) => {
                    inner.internal_validate_shape(&format!("{}.elem", path))?;
                }
            }
        } else if self.elem.is_some() {
            return Err(declaration(path, "elem is only valid on container types"));
        }
        if self.set_hash.is_some() && self.attr_type != AttributeType::Set {
            return Err(declaration(path, "set_hash is only valid on sets"));
        }
        Ok(())
    }
}

fn declaration(path: &str, message: &str) -> ProviderError {
    ProviderError::SchemaDeclaration(format!("{}: {}", path, message))
}

/// A named collection of attribute schemas.
///
/// Backed by an ordered map so every derived artifact (flat paths, diffs,
/// validation output) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct SchemaMap {
    attrs: BTreeMap<String, Attribute>,
}

impl SchemaMap {
    /// Create an empty schema map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute, builder style.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attrs.insert(name.into(), attr);
        self
    }

    /// Look up an attribute by name.
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attrs.get(name)
    }

    /// Iterate attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attrs.iter()
    }

    /// Number of declared attributes.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// True when no attributes are declared.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Validate every declaration in the map.
    pub fn internal_validate(&self) -> Result<(), ProviderError> {
        for (name, attr) in &self.attrs {
            attr.internal_validate(name)?;
        }
        Ok(())
    }

    /// Validate a configuration against this schema.
    /// See [`crate::validation::validate`].
    pub fn validate(&self, config: &ResourceConfig) -> Vec<Diagnostic> {
        crate::validation::validate(self, config)
    }

    /// Compute the structural diff between prior state and configuration.
    /// See [`crate::diff`].
    pub fn diff(
        &self,
        state: Option<&ResourceState>,
        config: &ResourceConfig,
    ) -> Result<InstanceDiff, ProviderError> {
        crate::diff::diff(self, state, config)
    }

    /// Build the typed read/write facade handed to CRUD callbacks.
    pub fn data(
        &self,
        state: Option<&ResourceState>,
        diff: Option<&InstanceDiff>,
    ) -> ResourceData {
        ResourceData::new(self.clone(), state.cloned(), diff.cloned())
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Prevents the operation from proceeding.
    Error,
    /// Worth surfacing, but not blocking.
    Warning,
}

/// A validation finding tied to an attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the finding.
    pub severity: DiagnosticSeverity,
    /// Short summary of the issue.
    pub summary: String,
    /// Longer description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The attribute path the finding refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Attach detail text.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach the attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// True for error severity.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_flag_builders_are_mutually_exclusive() {
        let attr = Attribute::required_string().optional();
        assert!(attr.optional);
        assert!(!attr.required);

        let attr = Attribute::optional_string().required();
        assert!(attr.required);
        assert!(!attr.optional);
    }

    #[test]
    fn test_internal_validate_rejects_conflicting_roles() {
        let mut attr = Attribute::required_string();
        attr.optional = true;
        assert!(attr.internal_validate("name").is_err());

        let mut attr = Attribute::required_string();
        attr.computed = true;
        assert!(attr.internal_validate("name").is_err());

        let attr = Attribute::new(AttributeType::String);
        let err = attr.internal_validate("name").unwrap_err();
        assert!(format!("{}", err).contains("one of required, optional, or computed"));
    }

    #[test]
    fn test_internal_validate_rejects_default_on_required() {
        let attr = Attribute::required_string().with_default("x");
        let err = attr.internal_validate("region").unwrap_err();
        assert!(format!("{}", err).contains("default conflicts with required"));
    }

    #[test]
    fn test_internal_validate_rejects_bad_default_type() {
        let attr = Attribute::optional_int().with_default("not-a-number");
        assert!(attr.internal_validate("count").is_err());

        let attr = Attribute::optional_int().with_default("8080");
        assert!(attr.internal_validate("count").is_ok());
    }

    #[test]
    fn test_internal_validate_rejects_container_without_elem() {
        let attr = Attribute::new(AttributeType::List).optional();
        let err = attr.internal_validate("tags").unwrap_err();
        assert!(format!("{}", err).contains("requires an elem"));
    }

    #[test]
    fn test_internal_validate_rejects_map_of_objects() {
        let nested = SchemaMap::new().with_attribute("port", Attribute::required_int());
        let attr = Attribute::map(Elem::Schema(nested)).optional();
        let err = attr.internal_validate("endpoints").unwrap_err();
        assert!(format!("{}", err).contains("map of objects"));
    }

    #[test]
    fn test_internal_validate_recurses_into_nested_schema() {
        let nested = SchemaMap::new()
            .with_attribute("port", Attribute::required_int().with_default(80));
        let attr = Attribute::list(Elem::Schema(nested)).optional();
        let err = attr.internal_validate("listener").unwrap_err();
        assert!(format!("{}", err).contains("listener.port"));
    }

    #[test]
    fn test_schema_map_orders_attributes_by_name() {
        let schema = SchemaMap::new()
            .with_attribute("zone", Attribute::optional_string())
            .with_attribute("app", Attribute::required_string());

        let names: Vec<_> = schema.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["app", "zone"]);
    }

    #[test]
    fn test_diagnostic_builders() {
        let d = Diagnostic::error("value out of range")
            .with_detail("must be between 1 and 65535")
            .with_attribute("port");

        assert!(d.is_error());
        assert_eq!(d.attribute.as_deref(), Some("port"));
        assert!(!Diagnostic::warning("deprecated").is_error());
    }
}
