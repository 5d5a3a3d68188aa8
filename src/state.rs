//! Persisted resource state in canonical flat form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The persisted representation of one resource instance.
///
/// Attributes are stored flat: dotted paths mapping to strings, with
/// `.#` / `.%` entries carrying container counts. Type reconstruction is
/// driven by the schema, never by the stored form itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceState {
    /// Remote identity. Empty means not yet created, or destroyed.
    pub id: String,
    /// The resource type name this state belongs to.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Flat attribute map; ordered for deterministic output.
    pub attributes: BTreeMap<String, String>,
}

impl ResourceState {
    /// A fresh, not-yet-created state for the given resource type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            type_name: type_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// True when the resource exists remotely (non-empty id).
    pub fn is_created(&self) -> bool {
        !self.id.is_empty()
    }

    /// Read one flat attribute; absent reads as `None`.
    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// All flat entries at or under the given path, in key order.
    pub fn attributes_under<'a>(
        &'a self,
        path: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a String)> + 'a {
        self.attributes.iter().filter(move |(k, _)| {
            k.as_str() == path || k.starts_with(path) && k[path.len()..].starts_with('.')
        })
    }
}
