//! Configuration validation against a schema.
//!
//! Validation walks the declared schema and the raw configuration in
//! lockstep and accumulates every finding; it never stops at the first
//! error. Deferred (unknown) values short-circuit all checks for their
//! path, since there is nothing concrete to judge yet.

use crate::config::ResourceConfig;
use crate::schema::{Attribute, AttributeType, Diagnostic, Elem, SchemaMap};
use crate::value::Value;

/// Validate a configuration against a schema.
///
/// Returns every finding at once: missing required attributes, unknown
/// keys, type mismatches, and anything the per-attribute validation
/// hooks report. An empty result means the configuration is valid.
pub fn validate(schema: &SchemaMap, config: &ResourceConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let resolved = config.resolved();
    let Some(map) = resolved.as_map() else {
        return diagnostics;
    };

    for (name, attr) in schema.iter() {
        if config.is_unknown(name) {
            continue;
        }
        validate_attribute(attr, map.get(name), name, &mut diagnostics);
    }

    for key in map.keys() {
        if schema.get(key).is_none() {
            diagnostics.push(
                Diagnostic::error(format!("Invalid or unknown key '{}'", key))
                    .with_attribute(key.clone()),
            );
        }
    }

    diagnostics
}

/// Convenience wrapper over [`validate`] returning `Err` on any error
/// diagnostic.
pub fn validate_result(
    schema: &SchemaMap,
    config: &ResourceConfig,
) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, config);
    if diagnostics.iter().any(Diagnostic::is_error) {
        Err(diagnostics)
    } else {
        Ok(())
    }
}

/// True when the configuration produces no error diagnostics.
pub fn is_valid(schema: &SchemaMap, config: &ResourceConfig) -> bool {
    !validate(schema, config).iter().any(Diagnostic::is_error)
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if attr.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_attribute(path),
                );
            }
        }
        Some(v) if v.is_unknown() => {}
        Some(v) => {
            if attr.computed && !attr.optional && !attr.required {
                diagnostics.push(
                    Diagnostic::error(format!("Attribute '{}' cannot be set", path))
                        .with_detail("its value is decided by the provider")
                        .with_attribute(path),
                );
                return;
            }
            validate_value(attr, v, path, diagnostics);
        }
    }
}

fn validate_value(attr: &Attribute, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    match attr.attr_type {
        AttributeType::Int | AttributeType::Bool | AttributeType::String => {
            match value.coerce(attr.attr_type, path) {
                Ok(coerced) => run_validate_func(attr, &coerced, path, diagnostics),
                Err(_) => diagnostics.push(type_error(path, attr.attr_type, value)),
            }
        }
        AttributeType::List | AttributeType::Set => match value.as_list() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if item.is_unknown() {
                        continue;
                    }
                    let item_path = format!("{}.{}", path, i);
                    match attr.elem.as_ref() {
                        Some(Elem::Attribute(inner)) => {
                            validate_value(inner, item, &item_path, diagnostics);
                        }
                        Some(Elem::Schema(schema)) => {
                            validate_object(schema, item, &item_path, diagnostics);
                        }
                        None => {}
                    }
                }
                run_validate_func(attr, value, path, diagnostics);
            }
            None => diagnostics.push(type_error(path, attr.attr_type, value)),
        },
        AttributeType::Map => match value.as_map() {
            Some(entries) => {
                let elem_type = match attr.elem.as_ref() {
                    Some(Elem::Attribute(inner)) => inner.attr_type,
                    _ => AttributeType::String,
                };
                for (key, v) in entries {
                    if v.is_unknown() {
                        continue;
                    }
                    let entry_path = format!("{}.{}", path, key);
                    if v.coerce(elem_type, &entry_path).is_err() {
                        diagnostics.push(type_error(&entry_path, elem_type, v));
                    }
                }
                run_validate_func(attr, value, path, diagnostics);
            }
            None => diagnostics.push(type_error(path, attr.attr_type, value)),
        },
    }
}

fn validate_object(
    schema: &SchemaMap,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(map) = value.as_map() else {
        diagnostics.push(
            Diagnostic::error(format!("Expected object for '{}'", path))
                .with_detail(format!("got {}", value.type_name()))
                .with_attribute(path),
        );
        return;
    };

    for (name, attr) in schema.iter() {
        let field_path = format!("{}.{}", path, name);
        validate_attribute(attr, map.get(name), &field_path, diagnostics);
    }
    for key in map.keys() {
        if schema.get(key).is_none() {
            let field_path = format!("{}.{}", path, key);
            diagnostics.push(
                Diagnostic::error(format!("Invalid or unknown key '{}'", field_path))
                    .with_attribute(field_path.clone()),
            );
        }
    }
}

fn run_validate_func(
    attr: &Attribute,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let Some(f) = &attr.validate_func {
        diagnostics.extend(f(value, path));
    }
}

fn type_error(path: &str, expected: AttributeType, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("expected {}, got {}", expected.name(), got.type_name()))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    fn errors(diags: &[Diagnostic]) -> Vec<&Diagnostic> {
        diags.iter().filter(|d| d.is_error()).collect()
    }

    #[test]
    fn test_collects_all_errors_in_one_pass() {
        let schema = SchemaMap::new()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("email", Attribute::required_string());
        let config = ResourceConfig::from_json(json!({"emial": "oops"}));

        let diags = validate(&schema, &config);
        assert_eq!(errors(&diags).len(), 3);

        let summaries: Vec<_> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert!(summaries.iter().any(|s| s.contains("'name'")));
        assert!(summaries.iter().any(|s| s.contains("'email'")));
        assert!(summaries.iter().any(|s| s.contains("unknown key 'emial'")));
    }

    #[test]
    fn test_weak_coercion_accepts_numeric_strings() {
        let schema = SchemaMap::new().with_attribute("port", Attribute::required_int());

        assert!(is_valid(&schema, &ResourceConfig::from_json(json!({"port": 80}))));
        assert!(is_valid(
            &schema,
            &ResourceConfig::from_json(json!({"port": "80"}))
        ));
        assert!(!is_valid(
            &schema,
            &ResourceConfig::from_json(json!({"port": "eighty"}))
        ));
    }

    #[test]
    fn test_unknown_value_short_circuits_checks() {
        let schema = SchemaMap::new().with_attribute("arn", Attribute::required_string());
        let config = ResourceConfig::from_json(json!({})).with_computed("arn");

        assert!(validate(&schema, &config).is_empty());
    }

    #[test]
    fn test_computed_only_attribute_rejects_user_values() {
        let schema = SchemaMap::new().with_attribute("id", Attribute::computed_string());
        let config = ResourceConfig::from_json(json!({"id": "i-decide"}));

        let diags = validate(&schema, &config);
        assert_eq!(errors(&diags).len(), 1);
        assert!(diags[0].summary.contains("cannot be set"));
    }

    #[test]
    fn test_optional_computed_accepts_user_values() {
        let schema = SchemaMap::new()
            .with_attribute("stack", Attribute::optional_string().computed());
        let config = ResourceConfig::from_json(json!({"stack": "heroku-18"}));

        assert!(validate(&schema, &config).is_empty());
    }

    #[test]
    fn test_nested_object_validation() {
        let nested = SchemaMap::new()
            .with_attribute("port", Attribute::required_int())
            .with_attribute("cidr", Attribute::required_string());
        let schema = SchemaMap::new().with_attribute(
            "ingress",
            Attribute::list(Elem::Schema(nested)).optional(),
        );

        let diags = validate(
            &schema,
            &ResourceConfig::from_json(json!({"ingress": [
                {"port": 80, "cidr": "0.0.0.0/0"},
                {"cidr": [], "protocol": "tcp"}
            ]})),
        );

        let attrs: Vec<_> = diags
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert!(attrs.contains(&"ingress.1.port"));
        assert!(attrs.contains(&"ingress.1.cidr"));
        assert!(attrs.contains(&"ingress.1.protocol"));
        assert_eq!(errors(&diags).len(), 3);
    }

    #[test]
    fn test_map_value_types_checked_per_key() {
        let schema = SchemaMap::new().with_attribute(
            "limits",
            Attribute::map(Elem::Attribute(Box::new(Attribute::new(
                AttributeType::Int,
            ))))
            .optional(),
        );

        let diags = validate(
            &schema,
            &ResourceConfig::from_json(json!({"limits": {"cpu": 4, "mem": "lots"}})),
        );
        assert_eq!(errors(&diags).len(), 1);
        assert_eq!(diags[0].attribute.as_deref(), Some("limits.mem"));
    }

    #[test]
    fn test_validate_func_contributes_warnings_and_errors() {
        let schema = SchemaMap::new().with_attribute(
            "port",
            Attribute::required_int().with_validate_func(|v, path| {
                let mut out = Vec::new();
                match v.as_int() {
                    Some(p) if p < 1024 => out.push(
                        Diagnostic::warning(format!("'{}' is a privileged port", path))
                            .with_attribute(path),
                    ),
                    Some(p) if p > 65535 => out.push(
                        Diagnostic::error(format!("'{}' is out of range", path))
                            .with_attribute(path),
                    ),
                    _ => {}
                }
                out
            }),
        );

        let diags = validate(&schema, &ResourceConfig::from_json(json!({"port": 80})));
        assert_eq!(diags.len(), 1);
        assert!(!diags[0].is_error());

        let diags = validate(&schema, &ResourceConfig::from_json(json!({"port": 70000})));
        assert_eq!(errors(&diags).len(), 1);

        assert!(validate_result(
            &schema,
            &ResourceConfig::from_json(json!({"port": 8080}))
        )
        .is_ok());
    }

    #[test]
    fn test_validate_result_passes_on_warnings_only() {
        let schema = SchemaMap::new().with_attribute(
            "region",
            Attribute::optional_string().with_validate_func(|_, path| {
                vec![Diagnostic::warning(format!("'{}' is deprecated", path))]
            }),
        );
        let config = ResourceConfig::from_json(json!({"region": "us-east"}));

        assert!(validate_result(&schema, &config).is_ok());
        assert!(is_valid(&schema, &config));
        assert_eq!(validate(&schema, &config).len(), 1);
    }

    #[test]
    fn test_list_element_type_mismatch_is_positional() {
        let schema = SchemaMap::new().with_attribute(
            "tags",
            Attribute::list(Elem::Attribute(Box::new(Attribute::new(
                AttributeType::String,
            ))))
            .optional(),
        );

        let diags = validate(
            &schema,
            &ResourceConfig::from_json(json!({"tags": ["a", [], "c"]})),
        );
        assert_eq!(errors(&diags).len(), 1);
        assert_eq!(diags[0].attribute.as_deref(), Some("tags.1"));
    }
}
