//! Structural diffing between prior state and desired configuration.
//!
//! The differ works entirely in flat form: the configuration is flattened
//! through the schema, then compared key by key against the state's flat
//! attributes. Containers diff element-wise (positionally for lists, by
//! hash for sets, per key for maps); an empty result means no change.

use crate::config::ResourceConfig;
use crate::error::ProviderError;
use crate::flatmap::{self, FlatValue};
use crate::schema::{Attribute, AttributeType, SchemaMap};
use crate::state::ResourceState;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The change recorded for a single flat attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeDiff {
    /// The value in prior state; empty when absent.
    pub old: String,
    /// The desired value; empty when removed or not yet known.
    pub new: String,
    /// The new value is not known yet and will be filled in post-apply.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub new_computed: bool,
    /// The attribute is being removed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub new_removed: bool,
    /// This change forces destroy-and-recreate.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_new: bool,
}

impl AttributeDiff {
    /// A plain old-to-new change.
    pub fn change(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
            ..Self::default()
        }
    }

    /// A change whose new value is pending computation.
    pub fn computed(old: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new_computed: true,
            ..Self::default()
        }
    }
}

/// The full set of per-attribute changes for one resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstanceDiff {
    /// Changes keyed by flat attribute path.
    pub attributes: BTreeMap<String, AttributeDiff>,
    /// The instance is to be destroyed rather than changed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub destroy: bool,
}

impl InstanceDiff {
    /// An empty diff: no changes.
    pub fn new() -> Self {
        Self::default()
    }

    /// A destroy marker diff.
    pub fn new_destroy() -> Self {
        Self {
            destroy: true,
            ..Self::default()
        }
    }

    /// Add an attribute change, builder style.
    pub fn with_attribute(mut self, path: impl Into<String>, diff: AttributeDiff) -> Self {
        self.attributes.insert(path.into(), diff);
        self
    }

    /// Look up the change for a flat path.
    pub fn get(&self, path: &str) -> Option<&AttributeDiff> {
        self.attributes.get(path)
    }

    /// True when the diff records nothing at all.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && !self.destroy
    }

    /// True when any recorded change forces replacement.
    pub fn requires_new(&self) -> bool {
        self.attributes.values().any(|d| d.requires_new)
    }

    /// True when the diff touches `path` or anything nested under it.
    pub fn has_change(&self, path: &str) -> bool {
        self.attributes
            .keys()
            .any(|k| k == path || k.starts_with(path) && k[path.len()..].starts_with('.'))
    }

    /// Number of attribute entries.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// True when there are no attribute entries. A destroy marker still
    /// counts as a change; use [`is_empty`](Self::is_empty) for that.
    pub fn is_attributes_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Compute the diff between prior state and desired configuration.
///
/// `None` state reads as a resource that does not exist yet. The result
/// is empty exactly when applying the configuration would change nothing.
pub fn diff(
    schema: &SchemaMap,
    state: Option<&ResourceState>,
    config: &ResourceConfig,
) -> Result<InstanceDiff, ProviderError> {
    let resolved = config.resolved();
    let flat_new = flatmap::flatten(schema, &resolved)?;

    let empty = BTreeMap::new();
    let state_attrs = state.map(|s| &s.attributes).unwrap_or(&empty);

    let mut result = InstanceDiff::new();
    for (name, attr) in schema.iter() {
        diff_attribute(name, attr, state_attrs, &flat_new, &mut result);
    }

    if result.requires_new() {
        // Replacement: recompute against an empty state so the create
        // half of destroy-and-create carries every attribute, keeping
        // the real old values for display and the requires_new marks
        // from the first pass.
        let original = std::mem::take(&mut result);
        let empty = BTreeMap::new();
        for (name, attr) in schema.iter() {
            diff_attribute(name, attr, &empty, &flat_new, &mut result);
        }
        for (key, entry) in result.attributes.iter_mut() {
            entry.old = state_attrs.get(key).cloned().unwrap_or_default();
            entry.requires_new = original.get(key).map(|e| e.requires_new).unwrap_or(false);
        }

        // A replaced resource gets fresh computed values; everything
        // computed becomes pending again.
        for (name, attr) in schema.iter() {
            if !attr.computed {
                continue;
            }
            let key = flatmap::root_key(name, attr.attr_type);
            let old = state_attrs.get(&key).cloned().unwrap_or_default();
            result
                .attributes
                .entry(key)
                .or_insert_with(|| AttributeDiff::computed(old))
                .new_computed = true;
        }
    }

    tracing::debug!(changes = result.len(), destroy = result.destroy, "computed diff");
    Ok(result)
}

fn diff_attribute(
    name: &str,
    attr: &Attribute,
    state: &BTreeMap<String, String>,
    flat_new: &BTreeMap<String, FlatValue>,
    result: &mut InstanceDiff,
) {
    match attr.attr_type {
        AttributeType::Int | AttributeType::Bool | AttributeType::String => {
            diff_scalar(name, attr, state, flat_new, result);
        }
        AttributeType::List | AttributeType::Set | AttributeType::Map => {
            diff_container(name, attr, state, flat_new, result);
        }
    }
}

fn diff_scalar(
    path: &str,
    attr: &Attribute,
    state: &BTreeMap<String, String>,
    flat_new: &BTreeMap<String, FlatValue>,
    result: &mut InstanceDiff,
) {
    let old_entry = state.get(path);
    let old = normalize_old(attr, old_entry);

    match flat_new.get(path) {
        Some(FlatValue::Unknown) => {
            result
                .attributes
                .insert(path.to_string(), AttributeDiff::computed(old));
        }
        Some(FlatValue::Known(new)) => {
            if old == *new {
                // Zero-vs-absent tie-break: a required attribute the user
                // explicitly set still shows up on first create.
                if attr.required && old_entry.is_none() {
                    result
                        .attributes
                        .insert(path.to_string(), AttributeDiff::change(old, new.clone()));
                }
                return;
            }
            let mut entry = AttributeDiff::change(old, new.clone());
            entry.requires_new = attr.force_new;
            result.attributes.insert(path.to_string(), entry);
        }
        None => {
            if attr.computed {
                if old.is_empty() {
                    result
                        .attributes
                        .insert(path.to_string(), AttributeDiff::computed(""));
                }
                // Non-empty computed state is preserved as-is.
                return;
            }
            if !old.is_empty() {
                let mut entry = AttributeDiff::change(old, "");
                entry.new_removed = true;
                entry.requires_new = attr.force_new;
                result.attributes.insert(path.to_string(), entry);
            }
        }
    }
}

fn diff_container(
    path: &str,
    attr: &Attribute,
    state: &BTreeMap<String, String>,
    flat_new: &BTreeMap<String, FlatValue>,
    result: &mut InstanceDiff,
) {
    let count_key = flatmap::root_key(path, attr.attr_type);
    let old_count = state.get(&count_key).cloned().unwrap_or_default();
    let old_elem_keys: Vec<&String> = keys_under(state, path)
        .filter(|k| **k != count_key)
        .collect();

    match flat_new.get(&count_key) {
        Some(FlatValue::Unknown) => {
            result
                .attributes
                .insert(count_key, AttributeDiff::computed(old_count));
        }
        Some(FlatValue::Known(new_count)) => {
            if old_count != *new_count {
                let mut entry = AttributeDiff::change(old_count, new_count.clone());
                entry.requires_new = attr.force_new;
                result.attributes.insert(count_key.clone(), entry);
            }

            // Union of element keys on both sides; each diffs like a leaf.
            let mut keys: BTreeSet<&String> = old_elem_keys.into_iter().collect();
            keys.extend(
                keys_under_flat(flat_new, path).filter(|k| **k != count_key),
            );

            for key in keys {
                let old = state.get(key).cloned().unwrap_or_default();
                match flat_new.get(key) {
                    Some(FlatValue::Unknown) => {
                        result
                            .attributes
                            .insert(key.clone(), AttributeDiff::computed(old));
                    }
                    Some(FlatValue::Known(new)) => {
                        if old != *new {
                            let mut entry = AttributeDiff::change(old, new.clone());
                            entry.requires_new = attr.force_new;
                            result.attributes.insert(key.clone(), entry);
                        }
                    }
                    None => {
                        if !old.is_empty() {
                            let mut entry = AttributeDiff::change(old, "");
                            entry.new_removed = true;
                            entry.requires_new = attr.force_new;
                            result.attributes.insert(key.clone(), entry);
                        }
                    }
                }
            }
        }
        None => {
            if attr.computed {
                if !state.contains_key(&count_key) && old_elem_keys.is_empty() {
                    result
                        .attributes
                        .insert(count_key, AttributeDiff::computed(""));
                }
                return;
            }
            // Attribute removed from configuration entirely.
            let mut removed_any = false;
            for key in old_elem_keys {
                let old = state.get(key).cloned().unwrap_or_default();
                if old.is_empty() {
                    continue;
                }
                let mut entry = AttributeDiff::change(old, "");
                entry.new_removed = true;
                entry.requires_new = attr.force_new;
                result.attributes.insert(key.clone(), entry);
                removed_any = true;
            }
            if removed_any || (!old_count.is_empty() && old_count != "0") {
                let mut entry = AttributeDiff::change(old_count, "0");
                entry.requires_new = attr.force_new;
                result.attributes.insert(count_key, entry);
            }
        }
    }
}

/// Re-normalize the old side through the attribute's `state_func` so both
/// sides of the comparison see the same canonical form.
fn normalize_old(attr: &Attribute, old: Option<&String>) -> String {
    let Some(old) = old else {
        return String::new();
    };
    match &attr.state_func {
        Some(f) => f(&Value::parse_flat(old, attr.attr_type)).flat_string(),
        None => old.clone(),
    }
}

fn keys_under<'a>(
    map: &'a BTreeMap<String, String>,
    path: &'a str,
) -> impl Iterator<Item = &'a String> + 'a {
    let prefix = format!("{}.", path);
    map.range(prefix.clone()..)
        .take_while(move |(k, _)| k.starts_with(&prefix))
        .map(|(k, _)| k)
}

fn keys_under_flat<'a>(
    map: &'a BTreeMap<String, FlatValue>,
    path: &'a str,
) -> impl Iterator<Item = &'a String> + 'a {
    let prefix = format!("{}.", path);
    map.range(prefix.clone()..)
        .take_while(move |(k, _)| k.starts_with(&prefix))
        .map(|(k, _)| k)
}
