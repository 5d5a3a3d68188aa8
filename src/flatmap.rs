//! Conversion between typed values and the canonical flat form.
//!
//! The flat form keys every leaf by a dotted path and stores every value
//! as a string: lists and sets carry a `<path>.#` count entry, maps carry
//! `<path>.%`, list elements are keyed by index, and set elements by
//! their stable hash. Flattening is schema-driven in both directions; the
//! flat form itself never records types.

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Elem, SchemaMap};
use crate::value::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

/// A flattened leaf: either a concrete flat string or a deferred value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlatValue {
    /// A concrete value in canonical string form.
    Known(String),
    /// The value is not resolved yet.
    Unknown,
}

/// Flatten a configuration map through the schema.
///
/// Only attributes present in the map (or supplied by a schema default)
/// produce entries; absence is meaningful to the differ and is not
/// papered over here. Values are coerced to their declared types and
/// passed through any `state_func` before being rendered.
pub fn flatten(
    schema: &SchemaMap,
    config: &Value,
) -> Result<BTreeMap<String, FlatValue>, ProviderError> {
    let mut out = BTreeMap::new();
    let map = match config {
        Value::Map(m) => m,
        _ => return Ok(out),
    };
    flatten_object(schema, "", map, &mut out)?;
    Ok(out)
}

pub(crate) fn flatten_object(
    schema: &SchemaMap,
    prefix: &str,
    map: &BTreeMap<String, Value>,
    out: &mut BTreeMap<String, FlatValue>,
) -> Result<(), ProviderError> {
    for (name, attr) in schema.iter() {
        let path = join(prefix, name);
        let value = match map.get(name) {
            Some(v) if !v.is_null() => v,
            _ => match &attr.default {
                Some(d) => d,
                None => continue,
            },
        };
        flatten_attribute(attr, &path, value, out)?;
    }
    Ok(())
}

pub(crate) fn flatten_attribute(
    attr: &Attribute,
    path: &str,
    value: &Value,
    out: &mut BTreeMap<String, FlatValue>,
) -> Result<(), ProviderError> {
    if value.is_unknown() {
        out.insert(root_key(path, attr.attr_type), FlatValue::Unknown);
        return Ok(());
    }
    if value.is_null() {
        return Ok(());
    }

    match attr.attr_type {
        AttributeType::Int | AttributeType::Bool | AttributeType::String => {
            let mut v = value.coerce(attr.attr_type, path)?;
            if let Some(f) = &attr.state_func {
                v = f(&v);
            }
            out.insert(path.to_string(), FlatValue::Known(v.flat_string()));
        }
        AttributeType::List => {
            let items = match value.coerce(AttributeType::List, path)? {
                Value::List(items) => items,
                _ => unreachable!("coerce returned non-list for list type"),
            };
            out.insert(
                format!("{}.#", path),
                FlatValue::Known(items.len().to_string()),
            );
            for (i, item) in items.iter().enumerate() {
                flatten_element(attr, &format!("{}.{}", path, i), item, out)?;
            }
        }
        AttributeType::Set => {
            let items = match value.coerce(AttributeType::Set, path)? {
                Value::List(items) => items,
                _ => unreachable!("coerce returned non-list for set type"),
            };
            if items.iter().any(Value::is_unknown) {
                // An unresolved element makes the membership itself
                // unresolved; the whole set defers.
                out.insert(format!("{}.#", path), FlatValue::Unknown);
                return Ok(());
            }
            let mut hashes = BTreeSet::new();
            for item in &items {
                let h = set_element_hash(attr, item, path)?;
                if hashes.insert(h) {
                    flatten_element(attr, &format!("{}.{}", path, h), item, out)?;
                }
            }
            out.insert(
                format!("{}.#", path),
                FlatValue::Known(hashes.len().to_string()),
            );
        }
        AttributeType::Map => {
            let entries = match value.coerce(AttributeType::Map, path)? {
                Value::Map(m) => m,
                _ => unreachable!("coerce returned non-map for map type"),
            };
            out.insert(
                format!("{}.%", path),
                FlatValue::Known(entries.len().to_string()),
            );
            let elem_type = map_elem_type(attr);
            for (k, v) in &entries {
                let key = format!("{}.{}", path, k);
                if v.is_unknown() {
                    out.insert(key, FlatValue::Unknown);
                } else {
                    let coerced = v.coerce(elem_type, &key)?;
                    out.insert(key, FlatValue::Known(coerced.flat_string()));
                }
            }
        }
    }
    Ok(())
}

fn flatten_element(
    attr: &Attribute,
    path: &str,
    value: &Value,
    out: &mut BTreeMap<String, FlatValue>,
) -> Result<(), ProviderError> {
    match attr.elem.as_ref() {
        Some(Elem::Attribute(inner)) => flatten_attribute(inner, path, value, out),
        Some(Elem::Schema(schema)) => {
            if value.is_unknown() {
                return Ok(());
            }
            let map = match value {
                Value::Map(m) => m,
                other => {
                    return Err(ProviderError::TypeMismatch {
                        path: path.to_string(),
                        expected: "object",
                        actual: other.type_name().to_string(),
                    })
                }
            };
            flatten_object(schema, path, map, out)
        }
        None => Err(ProviderError::SchemaDeclaration(format!(
            "{}: container type requires an elem",
            path
        ))),
    }
}

/// Compute the stable hash key for one set element.
///
/// Uses the attribute's `set_hash` when supplied; otherwise hashes the
/// element's canonical flattened string form.
pub fn set_element_hash(
    attr: &Attribute,
    value: &Value,
    path: &str,
) -> Result<u64, ProviderError> {
    if let Some(f) = &attr.set_hash {
        return Ok(f(value));
    }

    let canonical = match attr.elem.as_ref() {
        Some(Elem::Attribute(inner)) => value.coerce(inner.attr_type, path)?.flat_string(),
        Some(Elem::Schema(schema)) => {
            let mut flat = BTreeMap::new();
            if let Value::Map(m) = value {
                flatten_object(schema, "", m, &mut flat)?;
            }
            let mut s = String::new();
            for (k, v) in &flat {
                s.push_str(k);
                s.push('=');
                if let FlatValue::Known(v) = v {
                    s.push_str(v);
                }
                s.push('\n');
            }
            s
        }
        None => value.flat_string(),
    };

    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    Ok(hasher.finish())
}

/// Rebuild the typed value of one attribute from a flat map.
///
/// Returns `None` when the flat map holds nothing for the path, which
/// callers translate into defaults or zero values.
pub fn expand_attribute(
    attr: &Attribute,
    path: &str,
    flat: &BTreeMap<String, String>,
) -> Option<Value> {
    match attr.attr_type {
        AttributeType::Int | AttributeType::Bool | AttributeType::String => flat
            .get(path)
            .map(|s| Value::parse_flat(s, attr.attr_type)),
        AttributeType::List => {
            let count = container_count(flat, path, '#')?;
            let mut items = Vec::with_capacity(count);
            for i in 0..count {
                items.push(expand_element(attr, &format!("{}.{}", path, i), flat));
            }
            Some(Value::List(items))
        }
        AttributeType::Set => {
            let keys = child_segments(flat, path);
            if keys.is_empty() && !flat.contains_key(&format!("{}.#", path)) {
                return None;
            }
            let items = keys
                .iter()
                .filter(|k| k.as_str() != "#")
                .map(|k| expand_element(attr, &format!("{}.{}", path, k), flat))
                .collect();
            Some(Value::List(items))
        }
        AttributeType::Map => {
            let keys = child_segments(flat, path);
            if keys.is_empty() && !flat.contains_key(&format!("{}.%", path)) {
                return None;
            }
            let elem_type = map_elem_type(attr);
            let entries = keys
                .iter()
                .filter(|k| k.as_str() != "%")
                .filter_map(|k| {
                    flat.get(&format!("{}.{}", path, k))
                        .map(|s| (k.clone(), Value::parse_flat(s, elem_type)))
                })
                .collect();
            Some(Value::Map(entries))
        }
    }
}

/// Rebuild every attribute of a schema present in the flat map.
pub fn expand_object(
    schema: &SchemaMap,
    prefix: &str,
    flat: &BTreeMap<String, String>,
) -> Value {
    let mut out = BTreeMap::new();
    for (name, attr) in schema.iter() {
        let path = join(prefix, name);
        if let Some(v) = expand_attribute(attr, &path, flat) {
            out.insert(name.clone(), v);
        }
    }
    Value::Map(out)
}

fn expand_element(attr: &Attribute, path: &str, flat: &BTreeMap<String, String>) -> Value {
    match attr.elem.as_ref() {
        Some(Elem::Attribute(inner)) => expand_attribute(inner, path, flat)
            .unwrap_or_else(|| Value::zero(inner.attr_type)),
        Some(Elem::Schema(schema)) => expand_object(schema, path, flat),
        None => Value::Null,
    }
}

/// The flat key that stands for the attribute as a whole: the path itself
/// for scalars, the count entry for containers.
pub fn root_key(path: &str, ty: AttributeType) -> String {
    match ty {
        AttributeType::Map => format!("{}.%", path),
        AttributeType::List | AttributeType::Set => format!("{}.#", path),
        _ => path.to_string(),
    }
}

fn container_count(flat: &BTreeMap<String, String>, path: &str, marker: char) -> Option<usize> {
    match flat.get(&format!("{}.{}", path, marker)) {
        Some(s) => s.parse().ok().or(Some(0)),
        // No count entry: infer from whatever element keys exist.
        None => {
            let segments = child_segments(flat, path);
            if segments.is_empty() {
                None
            } else {
                segments
                    .iter()
                    .filter_map(|s| s.parse::<usize>().ok())
                    .max()
                    .map(|m| m + 1)
            }
        }
    }
}

/// Distinct first path segments directly under `path.` in the flat map.
fn child_segments(flat: &BTreeMap<String, String>, path: &str) -> BTreeSet<String> {
    let prefix = format!("{}.", path);
    flat.range(prefix.clone()..)
        .take_while(|(k, _)| k.starts_with(&prefix))
        .map(|(k, _)| {
            let rest = &k[prefix.len()..];
            rest.split('.').next().unwrap_or(rest).to_string()
        })
        .collect()
}

fn map_elem_type(attr: &Attribute) -> AttributeType {
    match attr.elem.as_ref() {
        Some(Elem::Attribute(inner)) => inner.attr_type,
        _ => AttributeType::String,
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}
