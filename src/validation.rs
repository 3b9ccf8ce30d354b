//! Schema validation helpers.
//!
//! This module validates a `serde_json::Value` configuration against a
//! [`Schema`] before any network call is made. Failures are reported as
//! structured diagnostics referencing the offending attribute path, never as
//! errors raised mid-operation.
//!
//! Beyond type checking, validation enforces the static constraints resources
//! declare in their schemas: value validators (RFC 3339 timestamps, http(s)
//! URLs, enumerated values), duplicate-name checks across sibling nested
//! blocks, minimum/maximum block counts, and the schema-level
//! `exactly_one_of` / `conflicts_with` rules.

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, NestedBlock,
    Schema, ValueValidator,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    validate_cross_field_rules(schema, value, &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

/// Whether a config attribute counts as "set" for cross-field rules.
///
/// Null, the empty string, and zero are all treated as unset so that a config
/// carrying `dashboard_id = 0` and `uid = ""` fails an `exactly_one_of` rule
/// over those two attributes.
pub fn is_set(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(Value::Bool(_)) => true,
    }
}

fn validate_cross_field_rules(schema: &Schema, value: &Value, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        _ => return,
    };

    for group in &schema.exactly_one_of {
        let set: Vec<&String> = group.iter().filter(|name| is_set(obj.get(*name))).collect();
        match set.len() {
            1 => {}
            0 => diagnostics.push(
                Diagnostic::error(format!("must specify either {}", join_names(group)))
                    .with_detail("Exactly one of these attributes must be set"),
            ),
            _ => diagnostics.push(
                Diagnostic::error(format!(
                    "must specify either {}, but not both",
                    join_names(group)
                ))
                .with_detail("Exactly one of these attributes must be set"),
            ),
        }
    }

    for group in &schema.conflicts_with {
        let set: Vec<&String> = group.iter().filter(|name| is_set(obj.get(*name))).collect();
        if set.len() > 1 {
            diagnostics.push(Diagnostic::error(format!(
                "conflicting attributes: {} cannot be set together",
                join_names(group)
            )));
        }
    }
}

fn join_names(names: &[String]) -> String {
    names
        .iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(" or ")
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => {
            // Null is valid for optional blocks, nothing further to check
            return;
        }
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value)))
                    .with_attribute_if_not_empty(path),
            );
            return;
        }
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        let attr_value = obj.get(name);
        validate_attribute(attr, attr_value, &attr_path, diagnostics);
    }

    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        let block_value = obj.get(name);
        validate_nested_block(nested_block, block_value, &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Computed-only attributes are set by the provider
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        }
        Some(v) => {
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            for validator in &attr.validators {
                apply_value_validator(validator, v, path, diagnostics);
            }
        }
    }
}

fn apply_value_validator(
    validator: &ValueValidator,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let s = match value {
        Value::String(s) => s,
        // Type mismatches are reported by the type check
        _ => return,
    };

    match validator {
        ValueValidator::Rfc3339Timestamp => {
            if chrono::DateTime::parse_from_rfc3339(s).is_err() {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                        .with_detail(format!("\"{}\" is not an RFC 3339 timestamp", s))
                        .with_attribute(path),
                );
            }
        }
        ValueValidator::HttpUrl => {
            let valid = reqwest::Url::parse(s)
                .map(|u| u.scheme() == "http" || u.scheme() == "https")
                .unwrap_or(false);
            if !valid {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                        .with_detail(format!("\"{}\" is not a valid http or https URL", s))
                        .with_attribute(path),
                );
            }
        }
        ValueValidator::NonEmpty => {
            if s.is_empty() {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                        .with_detail("Value must not be empty")
                        .with_attribute(path),
                );
            }
        }
        ValueValidator::OneOf(allowed) => {
            if !allowed.iter().any(|a| a == s) {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                        .with_detail(format!(
                            "\"{}\" is not one of: {}",
                            s,
                            allowed.join(", ")
                        ))
                        .with_attribute(path),
                );
            }
        }
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        }
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        }
        AttributeType::Float64 => {
            if !value.is_number() {
                diagnostics.push(type_error(path, "float64", value));
            }
        }
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        }
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            // Sets are represented as arrays in JSON
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "list", value));
            }
        }
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "map", value));
            }
        }
        AttributeType::Object(attrs) => {
            if let Some(obj) = value.as_object() {
                validate_object_type(attrs, obj, path, diagnostics);
            } else {
                diagnostics.push(type_error(path, "object", value));
            }
        }
        AttributeType::Dynamic => {}
    }
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        let attr_path = join_path(path, name);
        if let Some(value) = obj.get(name) {
            validate_attribute_type(attr_type, value, &attr_path, diagnostics);
        }
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match nested.nesting_mode {
        BlockNestingMode::Single => {
            validate_single_block(nested, value, path, diagnostics);
        }
        BlockNestingMode::List | BlockNestingMode::Set => {
            validate_list_block(nested, value, path, diagnostics);
        }
        BlockNestingMode::Map => {
            validate_map_block(nested, value, path, diagnostics);
        }
    }
}

fn validate_single_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required block '{}'", path))
                        .with_detail("At least one block is required")
                        .with_attribute(path),
                );
            }
        }
        Some(v) => {
            validate_block(&nested.block, v, path, diagnostics);
        }
    }
}

fn validate_list_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        }
        Some(Value::Array(arr)) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            // max_items of 0 means unlimited
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            if let Some(unique_attr) = &nested.unique_by {
                check_duplicate_names(arr, unique_attr, path, diagnostics);
            }

            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        }
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        }
    }
}

fn check_duplicate_names(
    items: &[Value],
    unique_attr: &str,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut seen = HashSet::new();
    for item in items {
        let Some(name) = item.get(unique_attr).and_then(Value::as_str) else {
            continue;
        };
        if !seen.insert(name.to_string()) {
            diagnostics.push(
                Diagnostic::error(format!(
                    "Duplicate {} in block '{}'",
                    unique_attr, path
                ))
                .with_detail(format!("\"{}\" appears more than once", name))
                .with_attribute(path),
            );
        }
    }
}

fn validate_map_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        }
        Some(Value::Object(obj)) => {
            let len = obj.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (key, item) in obj {
                let item_path = format!("{}.{}", path, key);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        }
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected map for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        }
    }
}

// Helper functions

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            if n.as_i64().is_some() {
                true
            } else if let Some(f) = n.as_f64() {
                f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
            } else {
                false
            }
        }
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!("Expected {}, got {}", expected, value_type_name(got))),
        attribute: Some(path.to_string()),
    }
}

trait DiagnosticExt {
    fn with_attribute_if_not_empty(self, path: &str) -> Self;
}

impl DiagnosticExt for Diagnostic {
    fn with_attribute_if_not_empty(self, path: &str) -> Self {
        if path.is_empty() {
            self
        } else {
            self.with_attribute(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
    use serde_json::json;

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!({"name": "test"}));
        assert!(diagnostics.is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        let diagnostics = validate(&schema, &json!({"name": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_optional_attribute() {
        let schema = Schema::v0().with_attribute("count", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"count": 42})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"count": null})).is_empty());
        assert_eq!(validate(&schema, &json!({"count": "nope"})).len(), 1);
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("id", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        // Computed-only attributes are never validated against config
        assert!(validate(&schema, &json!({"id": 123})).is_empty());
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute("count", Attribute::required_int64());

        assert!(validate(&schema, &json!({"count": 42})).is_empty());
        assert!(validate(&schema, &json!({"count": 42.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"count": 42.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"count": "42"})).len(), 1);
    }

    #[test]
    fn test_validate_list() {
        let schema = Schema::v0().with_attribute(
            "tags",
            Attribute::new(
                AttributeType::list(AttributeType::String),
                AttributeFlags::required(),
            ),
        );

        assert!(validate(&schema, &json!({"tags": ["a", "b"]})).is_empty());
        assert!(validate(&schema, &json!({"tags": []})).is_empty());

        let diagnostics = validate(&schema, &json!({"tags": ["a", 123]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("tags.1".to_string()));

        assert_eq!(validate(&schema, &json!({"tags": "not a list"})).len(), 1);
    }

    #[test]
    fn test_validate_rfc3339_validator() {
        let schema = Schema::v0().with_attribute(
            "expires_at",
            Attribute::optional_string().with_validator(ValueValidator::Rfc3339Timestamp),
        );

        assert!(validate(&schema, &json!({"expires_at": "2024-01-01T00:00:00Z"})).is_empty());

        let diagnostics = validate(&schema, &json!({"expires_at": "tomorrow"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].detail.as_deref().unwrap().contains("RFC 3339"));
    }

    #[test]
    fn test_validate_url_validator() {
        let schema = Schema::v0().with_attribute(
            "url",
            Attribute::optional_string().with_validator(ValueValidator::HttpUrl),
        );

        assert!(validate(&schema, &json!({"url": "https://grafana.example.com"})).is_empty());
        assert!(validate(&schema, &json!({"url": "http://localhost:3000"})).is_empty());
        assert_eq!(validate(&schema, &json!({"url": "ftp://host"})).len(), 1);
        assert_eq!(validate(&schema, &json!({"url": "not a url"})).len(), 1);
    }

    #[test]
    fn test_validate_one_of_validator() {
        let schema = Schema::v0().with_attribute(
            "match",
            Attribute::required_string().with_validator(ValueValidator::OneOf(vec![
                "=".to_string(),
                "!=".to_string(),
                "=~".to_string(),
                "!~".to_string(),
            ])),
        );

        assert!(validate(&schema, &json!({"match": "=~"})).is_empty());
        let diagnostics = validate(&schema, &json!({"match": "contains"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].detail.as_deref().unwrap().contains("not one of"));
    }

    #[test]
    fn test_validate_nested_block_list_with_limits() {
        let schema = Schema::v0().with_block(
            "metric",
            NestedBlock::list(Block::new().with_attribute("name", Attribute::required_string()))
                .with_min_items(1)
                .with_max_items(3),
        );

        assert!(validate(&schema, &json!({"metric": [{"name": "CPUUtilization"}]})).is_empty());

        let diagnostics = validate(&schema, &json!({"metric": []}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));

        let diagnostics = validate(
            &schema,
            &json!({"metric": [{"name": "a"}, {"name": "b"}, {"name": "c"}, {"name": "d"}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 3"));
    }

    #[test]
    fn test_validate_unique_by() {
        let schema = Schema::v0().with_block(
            "service",
            NestedBlock::list(Block::new().with_attribute("name", Attribute::required_string()))
                .unique_by("name"),
        );

        assert!(validate(
            &schema,
            &json!({"service": [{"name": "AWS/EC2"}, {"name": "AWS/RDS"}]})
        )
        .is_empty());

        let diagnostics = validate(
            &schema,
            &json!({"service": [{"name": "AWS/EC2"}, {"name": "AWS/EC2"}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Duplicate name"));
        assert!(diagnostics[0].detail.as_deref().unwrap().contains("AWS/EC2"));
    }

    #[test]
    fn test_validate_exactly_one_of() {
        let schema = Schema::v0()
            .with_attribute("dashboard_id", Attribute::optional_int64())
            .with_attribute("uid", Attribute::optional_string())
            .exactly_one_of(&["dashboard_id", "uid"]);

        assert!(validate(&schema, &json!({"uid": "abc"})).is_empty());
        assert!(validate(&schema, &json!({"dashboard_id": 7})).is_empty());

        // Zero and empty string count as unset
        let diagnostics = validate(&schema, &json!({"dashboard_id": 0, "uid": ""}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .summary
            .contains("must specify either dashboard_id or uid"));

        let diagnostics = validate(&schema, &json!({"dashboard_id": 7, "uid": "abc"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("but not both"));
    }

    #[test]
    fn test_validate_conflicts_with() {
        let schema = Schema::v0()
            .with_attribute("cloud_access_policy_token", Attribute::optional_string())
            .with_attribute("cloud_api_key", Attribute::optional_string())
            .conflicts_with(&["cloud_access_policy_token", "cloud_api_key"]);

        assert!(validate(&schema, &json!({"cloud_api_key": "key"})).is_empty());

        let diagnostics = validate(
            &schema,
            &json!({"cloud_access_policy_token": "t", "cloud_api_key": "k"}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("conflicting attributes"));
    }

    #[test]
    fn test_validate_deeply_nested() {
        let schema = Schema::v0().with_block(
            "service",
            NestedBlock::list(
                Block::new()
                    .with_attribute("name", Attribute::required_string())
                    .with_block(
                        "metric",
                        NestedBlock::list(
                            Block::new().with_attribute("name", Attribute::required_string()),
                        ),
                    ),
            ),
        );

        let diagnostics = validate(
            &schema,
            &json!({
                "service": [{
                    "name": "AWS/EC2",
                    "metric": [{"name": 5}]
                }]
            }),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("service.0.metric.0.name".to_string())
        );
    }

    #[test]
    fn test_is_set_semantics() {
        assert!(!is_set(None));
        assert!(!is_set(Some(&json!(null))));
        assert!(!is_set(Some(&json!(""))));
        assert!(!is_set(Some(&json!(0))));
        assert!(is_set(Some(&json!("x"))));
        assert!(is_set(Some(&json!(3))));
        assert!(is_set(Some(&json!(false))));
    }

    #[test]
    fn test_validate_result_helper() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate_result(&schema, &json!({"name": "test"})).is_ok());
        assert!(is_valid(&schema, &json!({"name": "test"})));

        let result = validate_result(&schema, &json!({}));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().len(), 1);
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
    }
}
