//! The desired configuration handed to the core by the engine.

use crate::value::Value;
use std::collections::BTreeSet;

/// A resolved configuration for one resource or provider block.
///
/// The surrounding engine interpolates references before handing the
/// configuration over; paths whose values depend on not-yet-applied
/// resources are carried in `computed_keys` and read as
/// [`Value::Unknown`] everywhere in the core.
#[derive(Debug, Clone, Default)]
pub struct ResourceConfig {
    raw: Value,
    computed_keys: BTreeSet<String>,
}

impl ResourceConfig {
    /// Wrap an already-typed configuration value. Anything other than a
    /// map reads as an empty configuration.
    pub fn new(raw: Value) -> Self {
        Self {
            raw,
            computed_keys: BTreeSet::new(),
        }
    }

    /// Build a configuration from a JSON value, the usual test and
    /// fixture entry point.
    pub fn from_json(raw: serde_json::Value) -> Self {
        Self::new(Value::from(raw))
    }

    /// An empty configuration.
    pub fn empty() -> Self {
        Self::new(Value::Map(Default::default()))
    }

    /// Mark a dotted path as not yet known (interpolation pending).
    pub fn mark_computed(&mut self, path: impl Into<String>) {
        self.computed_keys.insert(path.into());
    }

    /// Builder form of [`mark_computed`](Self::mark_computed).
    pub fn with_computed(mut self, path: impl Into<String>) -> Self {
        self.mark_computed(path);
        self
    }

    /// Top-level lookup by attribute name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match &self.raw {
            Value::Map(m) => m.get(key),
            _ => None,
        }
    }

    /// True when the value at `path` (or any ancestor of it) is unknown,
    /// either via `computed_keys` or an explicit [`Value::Unknown`].
    pub fn is_unknown(&self, path: &str) -> bool {
        let mut prefix = String::new();
        for segment in path.split('.') {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(segment);
            if self.computed_keys.contains(&prefix) {
                return true;
            }
            if let Some(v) = self.value_at(&prefix) {
                if v.is_unknown() {
                    return true;
                }
            }
        }
        false
    }

    /// The configuration with every computed key resolved to
    /// [`Value::Unknown`]. This is what the differ and validator walk.
    pub fn resolved(&self) -> Value {
        let mut value = match &self.raw {
            Value::Map(_) => self.raw.clone(),
            _ => Value::Map(Default::default()),
        };
        for path in &self.computed_keys {
            set_unknown(&mut value, path);
        }
        value
    }

    fn value_at(&self, path: &str) -> Option<&Value> {
        let mut current = &self.raw;
        for segment in path.split('.') {
            current = match current {
                Value::Map(m) => m.get(segment)?,
                Value::List(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Overwrite the value at a dotted path with `Unknown`, creating
/// intermediate maps as needed. List segments that do not resolve are
/// ignored; there is nothing meaningful to defer there.
fn set_unknown(value: &mut Value, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current = value;
    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        current = match current {
            Value::Map(m) => {
                if last {
                    m.insert((*segment).to_string(), Value::Unknown);
                    return;
                }
                m.entry((*segment).to_string())
                    .or_insert_with(|| Value::Map(Default::default()))
            }
            Value::List(items) => {
                let Some(idx) = segment.parse::<usize>().ok().filter(|i| *i < items.len())
                else {
                    return;
                };
                if last {
                    items[idx] = Value::Unknown;
                    return;
                }
                &mut items[idx]
            }
            _ => return,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_marked_path_reads_unknown() {
        let config = ResourceConfig::from_json(json!({"name": "app"})).with_computed("arn");

        assert!(config.is_unknown("arn"));
        assert!(!config.is_unknown("name"));

        let resolved = config.resolved();
        assert!(resolved.as_map().unwrap()["arn"].is_unknown());
    }

    #[test]
    fn test_ancestor_unknown_covers_children() {
        let config =
            ResourceConfig::from_json(json!({"net": {"cidr": "10.0.0.0/8"}})).with_computed("net");

        assert!(config.is_unknown("net.cidr"));
    }

    #[test]
    fn test_explicit_unknown_value() {
        let config = ResourceConfig::from_json(json!({"arn": "__unknown__"}));
        assert!(config.is_unknown("arn"));
    }

    #[test]
    fn test_non_map_reads_empty() {
        let config = ResourceConfig::from_json(json!("scalar"));
        assert!(config.get("anything").is_none());
        assert_eq!(config.resolved(), Value::Map(Default::default()));
    }
}
