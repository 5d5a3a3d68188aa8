//! The typed read/write facade handed to CRUD callbacks.
//!
//! A [`ResourceData`] layers pending writes over the diff over prior
//! state, with schema defaults and type zeros underneath, so a callback
//! reads effective values and writes results without ever touching the
//! flat form directly. All writes are buffered; the caller materializes
//! them into a new [`ResourceState`] only after the callback succeeds.

use crate::diff::InstanceDiff;
use crate::error::ProviderError;
use crate::flatmap::{self, FlatValue};
use crate::schema::{Attribute, Elem, SchemaMap};
use crate::state::ResourceState;
use crate::value::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Per-callback view over (state, diff, pending writes).
///
/// Not thread-safe and not meant to outlive the callback it was built
/// for; the provider reads inputs and records outputs through it, then
/// the core projects a new state.
#[derive(Debug, Clone)]
pub struct ResourceData {
    schema: SchemaMap,
    state: Option<ResourceState>,
    diff: Option<InstanceDiff>,
    writes: BTreeMap<String, String>,
    write_roots: BTreeSet<String>,
    new_id: Option<String>,
}

/// The schema shape found at a dotted path.
enum Shape<'a> {
    Attr(&'a Attribute),
    Object(&'a SchemaMap),
}

impl ResourceData {
    pub(crate) fn new(
        schema: SchemaMap,
        state: Option<ResourceState>,
        diff: Option<InstanceDiff>,
    ) -> Self {
        Self {
            schema,
            state,
            diff,
            writes: BTreeMap::new(),
            write_roots: BTreeSet::new(),
            new_id: None,
        }
    }

    /// The effective value at `path`.
    ///
    /// Layering: pending writes, then the diff's new values, then prior
    /// state, then the schema default, then the type's zero value.
    /// Containers come back reassembled into typed values.
    pub fn get(&self, path: &str) -> Value {
        self.get_ok(path).0
    }

    /// Like [`get`](Self::get), but also reports whether the value was
    /// explicitly set (as opposed to a default or zero value filling in).
    pub fn get_ok(&self, path: &str) -> (Value, bool) {
        let view = self.effective_view();
        self.read(&view, path, true)
    }

    /// The (old, new) pair for `path`: the prior-state value and the
    /// effective value. This is the canonical input for `update`
    /// callbacks.
    pub fn get_change(&self, path: &str) -> (Value, Value) {
        let old_view = self
            .state
            .as_ref()
            .map(|s| s.attributes.clone())
            .unwrap_or_default();
        let (old, _) = self.read(&old_view, path, false);
        let (new, _) = self.read(&self.effective_view(), path, true);
        (old, new)
    }

    /// True when the diff records a change at `path` or nested under it.
    pub fn has_change(&self, path: &str) -> bool {
        self.diff
            .as_ref()
            .map(|d| d.has_change(path))
            .unwrap_or(false)
    }

    /// Buffer a write of `value` at `path`.
    ///
    /// The value is coerced to the declared type first; a value that does
    /// not fit the schema is rejected without touching the buffer.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<(), ProviderError> {
        let value = value.into();
        let mut flat = BTreeMap::new();
        match self.resolve(path) {
            Some(Shape::Attr(attr)) => {
                flatmap::flatten_attribute(attr, path, &value, &mut flat)?;
            }
            Some(Shape::Object(schema)) => match &value {
                Value::Map(m) => flatmap::flatten_object(schema, path, m, &mut flat)?,
                other => {
                    return Err(ProviderError::TypeMismatch {
                        path: path.to_string(),
                        expected: "object",
                        actual: other.type_name().to_string(),
                    })
                }
            },
            None => {
                return Err(ProviderError::TypeMismatch {
                    path: path.to_string(),
                    expected: "declared attribute",
                    actual: value.type_name().to_string(),
                })
            }
        }
        for (k, v) in flat {
            if let FlatValue::Known(s) = v {
                self.writes.insert(k, s);
            }
        }
        self.write_roots.insert(path.to_string());
        Ok(())
    }

    /// The resource identity: a pending `set_id` first, then state.
    pub fn id(&self) -> String {
        match &self.new_id {
            Some(id) => id.clone(),
            None => self
                .state
                .as_ref()
                .map(|s| s.id.clone())
                .unwrap_or_default(),
        }
    }

    /// Record the resource identity. An empty id marks the resource
    /// destroyed. Unlike attribute writes, the id survives a failed
    /// callback so that partially-created resources stay tracked.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.new_id = Some(id.into());
    }

    /// Project the effective view into a new state for the given type.
    ///
    /// Diff entries whose value is still pending computation and was not
    /// filled in by the callback are left out, so a later diff sees them
    /// as still outstanding.
    pub fn to_state(&self, type_name: &str) -> ResourceState {
        ResourceState {
            id: self.id(),
            type_name: type_name.to_string(),
            attributes: self.effective_view(),
        }
    }

    /// Flatten (state ∪ diff ∪ writes) into one flat map.
    fn effective_view(&self) -> BTreeMap<String, String> {
        let mut out = self
            .state
            .as_ref()
            .map(|s| s.attributes.clone())
            .unwrap_or_default();

        if let Some(diff) = &self.diff {
            for (key, entry) in &diff.attributes {
                if entry.new_removed || entry.new_computed {
                    out.remove(key);
                } else {
                    out.insert(key.clone(), entry.new.clone());
                }
            }
        }

        // A written container replaces its old value wholesale; stale
        // element keys must not bleed through.
        for root in &self.write_roots {
            let prefix = format!("{}.", root);
            out.retain(|k, _| k != root && !k.starts_with(&prefix));
        }
        out.extend(self.writes.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }

    fn read(
        &self,
        view: &BTreeMap<String, String>,
        path: &str,
        with_default: bool,
    ) -> (Value, bool) {
        // Count entries read directly as ints.
        if path.ends_with(".#") || path.ends_with(".%") {
            return match view.get(path) {
                Some(s) => (Value::Int(s.parse().unwrap_or(0)), true),
                None => (Value::Int(0), false),
            };
        }

        match self.resolve(path) {
            Some(Shape::Attr(attr)) => {
                if let Some(v) = flatmap::expand_attribute(attr, path, view) {
                    return (v, true);
                }
                if with_default {
                    if let Some(default) = &attr.default {
                        return (default.clone(), false);
                    }
                }
                (Value::zero(attr.attr_type), false)
            }
            Some(Shape::Object(schema)) => {
                let prefix = format!("{}.", path);
                let present = view.keys().any(|k| k.starts_with(&prefix));
                (flatmap::expand_object(schema, path, view), present)
            }
            None => (Value::Null, false),
        }
    }

    /// Walk the schema along a dotted path, skipping over index, hash,
    /// and key segments as the container types dictate.
    fn resolve(&self, path: &str) -> Option<Shape<'_>> {
        let mut segments = path.split('.');
        let mut attr = self.schema.get(segments.next()?)?;

        loop {
            let Some(segment) = segments.next() else {
                return Some(Shape::Attr(attr));
            };
            if segment == "#" || segment == "%" {
                return None;
            }
            match &attr.elem {
                Some(Elem::Attribute(inner)) if attr.attr_type.is_container() => {
                    // `segment` is the index, hash, or map key.
                    attr = &**inner;
                }
                Some(Elem::Schema(schema)) if attr.attr_type.is_container() => {
                    // `segment` is the index or hash; the next one names
                    // a field of the nested object.
                    match segments.next() {
                        None => return Some(Shape::Object(schema)),
                        Some(field) => attr = schema.get(field)?,
                    }
                }
                _ => return None,
            }
        }
    }
}
