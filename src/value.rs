//! The typed attribute value model.
//!
//! Configuration and state values travel through the core as [`Value`], a
//! tagged variant covering every shape a schema can declare. Unknown values
//! (interpolations that have not been resolved yet) are first-class: they
//! flow through validation and diffing without tripping type checks.
//!
//! Set values travel as [`Value::List`]; set membership is a schema
//! property applied by the differ, not a property of the value itself.

use crate::error::ProviderError;
use crate::schema::AttributeType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved string marking a value as unknown in serialized form.
const UNKNOWN_SENTINEL: &str = "__unknown__";

/// A configuration or state value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Explicit null; reads as absent.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit integer value.
    Int(i64),
    /// String value.
    String(String),
    /// Ordered sequence; also the carrier for set-typed attributes.
    List(Vec<Value>),
    /// String-keyed mapping. Ordered so that anything derived from it
    /// (diffs, flat paths) is deterministic.
    Map(BTreeMap<String, Value>),
    /// Not yet known; resolved by the engine after dependencies apply.
    Unknown,
}

impl Value {
    /// Returns the boolean payload, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the element slice, if this is a `List`.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the underlying map, if this is a `Map`.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for [`Value::Unknown`].
    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    /// A short name for the value's shape, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Unknown => "unknown",
        }
    }

    /// The zero value observed for an absent attribute of the given type.
    pub fn zero(ty: AttributeType) -> Value {
        match ty {
            AttributeType::Bool => Value::Bool(false),
            AttributeType::Int => Value::Int(0),
            AttributeType::String => Value::String(String::new()),
            AttributeType::List | AttributeType::Set => Value::List(Vec::new()),
            AttributeType::Map => Value::Map(BTreeMap::new()),
        }
    }

    /// Weakly coerce this value to the given declared type.
    ///
    /// Strings parse into ints and bools ("42", "true"); ints and bools
    /// render into strings. `Null` and `Unknown` pass through untouched so
    /// that absence and deferral survive the conversion.
    pub fn coerce(&self, ty: AttributeType, path: &str) -> Result<Value, ProviderError> {
        let mismatch = || ProviderError::TypeMismatch {
            path: path.to_string(),
            expected: ty.name(),
            actual: format!("{} ({})", self.flat_string(), self.type_name()),
        };

        if self.is_null() || self.is_unknown() {
            return Ok(self.clone());
        }

        match ty {
            AttributeType::Int => match self {
                Value::Int(n) => Ok(Value::Int(*n)),
                Value::String(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| mismatch()),
                _ => Err(mismatch()),
            },
            AttributeType::Bool => match self {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::String(s) => match s.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(mismatch()),
                },
                _ => Err(mismatch()),
            },
            AttributeType::String => match self {
                Value::String(s) => Ok(Value::String(s.clone())),
                Value::Int(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err(mismatch()),
            },
            AttributeType::List | AttributeType::Set => match self {
                Value::List(_) => Ok(self.clone()),
                _ => Err(mismatch()),
            },
            AttributeType::Map => match self {
                Value::Map(_) => Ok(self.clone()),
                _ => Err(mismatch()),
            },
        }
    }

    /// The canonical flat-form string for a scalar value.
    ///
    /// This is the on-disk representation: state attributes, diff entries,
    /// and set hashes are all computed over it. Containers and unknowns
    /// have no flat string and render empty.
    pub fn flat_string(&self) -> String {
        match self {
            Value::Null | Value::Unknown => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::List(_) | Value::Map(_) => String::new(),
        }
    }

    /// Rebuild a typed scalar from its flat-form string.
    ///
    /// The empty string reads as the type's zero value; a string that no
    /// longer parses is preserved verbatim rather than dropped.
    pub fn parse_flat(s: &str, ty: AttributeType) -> Value {
        if s.is_empty() {
            return Value::zero(ty);
        }
        match ty {
            AttributeType::Int => s
                .parse::<i64>()
                .map(Value::Int)
                .unwrap_or_else(|_| Value::String(s.to_string())),
            AttributeType::Bool => match s {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(s.to_string()),
            },
            _ => Value::String(s.to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::String(n.to_string()),
            },
            serde_json::Value::String(s) if s == UNKNOWN_SENTINEL => Value::Unknown,
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => items.serialize(serializer),
            Value::Map(m) => m.serialize(serializer),
            Value::Unknown => serializer.serialize_str(UNKNOWN_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};
        use std::fmt;

        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a configuration value")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_none<E: de::Error>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_bool<E: de::Error>(self, b: bool) -> Result<Value, E> {
                Ok(Value::Bool(b))
            }

            fn visit_i64<E: de::Error>(self, n: i64) -> Result<Value, E> {
                Ok(Value::Int(n))
            }

            fn visit_u64<E: de::Error>(self, n: u64) -> Result<Value, E> {
                i64::try_from(n)
                    .map(Value::Int)
                    .map_err(|_| E::custom("integer out of range"))
            }

            fn visit_f64<E: de::Error>(self, n: f64) -> Result<Value, E> {
                if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
                    Ok(Value::Int(n as i64))
                } else {
                    Ok(Value::String(n.to_string()))
                }
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
                if s == UNKNOWN_SENTINEL {
                    Ok(Value::Unknown)
                } else {
                    Ok(Value::String(s.to_string()))
                }
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element()? {
                    items.push(item);
                }
                Ok(Value::List(items))
            }

            fn visit_map<A>(self, mut access: A) -> Result<Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut map = BTreeMap::new();
                while let Some((key, value)) = access.next_entry()? {
                    map.insert(key, value);
                }
                Ok(Value::Map(map))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let v = Value::from(json!({
            "name": "app",
            "count": 3,
            "enabled": true,
            "tags": ["web", "prod"]
        }));

        let map = v.as_map().unwrap();
        assert_eq!(map["name"].as_str(), Some("app"));
        assert_eq!(map["count"].as_int(), Some(3));
        assert_eq!(map["enabled"].as_bool(), Some(true));
        assert_eq!(map["tags"].as_list().unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_sentinel_round_trip() {
        let v = Value::from(json!("__unknown__"));
        assert!(v.is_unknown());

        let encoded = serde_json::to_string(&Value::Unknown).unwrap();
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert!(decoded.is_unknown());
    }

    #[test]
    fn test_coerce_string_to_int() {
        let v = Value::String("42".to_string());
        assert_eq!(
            v.coerce(AttributeType::Int, "count").unwrap(),
            Value::Int(42)
        );

        let err = Value::String("forty-two".to_string())
            .coerce(AttributeType::Int, "count")
            .unwrap_err();
        assert!(format!("{}", err).contains("count"));
    }

    #[test]
    fn test_coerce_preserves_null_and_unknown() {
        assert_eq!(
            Value::Null.coerce(AttributeType::Int, "x").unwrap(),
            Value::Null
        );
        assert_eq!(
            Value::Unknown.coerce(AttributeType::Bool, "x").unwrap(),
            Value::Unknown
        );
    }

    #[test]
    fn test_coerce_scalars_to_string() {
        assert_eq!(
            Value::Int(8080).coerce(AttributeType::String, "port").unwrap(),
            Value::String("8080".to_string())
        );
        assert_eq!(
            Value::Bool(true).coerce(AttributeType::String, "flag").unwrap(),
            Value::String("true".to_string())
        );
    }

    #[test]
    fn test_flat_string_and_parse_round_trip() {
        assert_eq!(Value::Int(7).flat_string(), "7");
        assert_eq!(Value::Bool(false).flat_string(), "false");
        assert_eq!(Value::parse_flat("7", AttributeType::Int), Value::Int(7));
        assert_eq!(
            Value::parse_flat("false", AttributeType::Bool),
            Value::Bool(false)
        );
        assert_eq!(Value::parse_flat("", AttributeType::Int), Value::Int(0));
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(Value::zero(AttributeType::Int), Value::Int(0));
        assert_eq!(Value::zero(AttributeType::Bool), Value::Bool(false));
        assert_eq!(
            Value::zero(AttributeType::String),
            Value::String(String::new())
        );
        assert_eq!(Value::zero(AttributeType::Set), Value::List(Vec::new()));
    }
}
