//! Structural type descriptors and the structural-validation seam.
//!
//! Contract parameters and response bodies carry a [`Schema`] descriptor.
//! Checking a concrete value against a descriptor is delegated to a
//! [`StructuralChecker`], which reports mismatches in a raw vocabulary
//! (`INVALID_TYPE`, `ENUM_MISMATCH`, ...) that the validators translate into
//! the crate's error taxonomy. [`DefaultChecker`] is the built-in
//! implementation; callers with their own JSON-schema engine can supply a
//! different one when building the cache.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Structural type descriptor for a parameter or body value.
///
/// A subset of JSON-schema structure sufficient for conformance checking:
/// type/format, enums, string and numeric bounds, object property shape, and
/// homogeneous array items. An all-default (empty) schema accepts any value.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Expected JSON type: string, integer, number, boolean, object, array.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    /// Property names that must be present on object values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,

    /// `Some(false)` forbids properties not listed in `properties`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
}

impl Schema {
    /// An empty schema accepts any value.
    pub fn accepts_anything(&self) -> bool {
        *self == Schema::default()
    }
}

/// A single structural mismatch in the checker's raw vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawIssue {
    /// Raw code, e.g. `INVALID_TYPE`, `ENUM_MISMATCH`, `MAX_LENGTH`.
    pub code: String,
    pub message: String,
    /// Dotted path into the checked value (`""` for the root).
    pub path: String,
}

impl RawIssue {
    pub fn new(code: impl Into<String>, message: impl Into<String>, path: impl Into<String>) -> Self {
        RawIssue {
            code: code.into(),
            message: message.into(),
            path: path.into(),
        }
    }
}

/// Seam to the structural-schema-validation collaborator.
pub trait StructuralChecker: Send + Sync {
    /// Check a concrete value against a schema, reporting every mismatch.
    fn check(&self, schema: &Schema, value: &Value) -> Vec<RawIssue>;
}

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

static DATE_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[Tt]\d{2}:\d{2}:\d{2}(\.\d+)?([Zz]|[+-]\d{2}:\d{2})$").unwrap()
});

/// Built-in recursive structural checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultChecker;

impl StructuralChecker for DefaultChecker {
    fn check(&self, schema: &Schema, value: &Value) -> Vec<RawIssue> {
        let mut issues = Vec::new();
        check_value(schema, value, "", &mut issues);
        issues
    }
}

fn check_value(schema: &Schema, value: &Value, path: &str, issues: &mut Vec<RawIssue>) {
    if let Some(kind) = schema.kind.as_deref() {
        if !type_matches(kind, value) {
            issues.push(RawIssue::new(
                "INVALID_TYPE",
                format!("expected type {kind}, found {}", json_type_name(value)),
                path,
            ));
            // No point checking bounds or shape against the wrong type.
            return;
        }
    }

    if !schema.enum_values.is_empty() {
        check_enum(schema, value, path, issues);
    }

    match value {
        Value::String(s) => check_string(schema, s, path, issues),
        Value::Number(n) => check_number(schema, n.as_f64(), path, issues),
        Value::Object(map) => check_object(schema, map, path, issues),
        Value::Array(items) => {
            if let Some(item_schema) = &schema.items {
                for (idx, item) in items.iter().enumerate() {
                    check_value(item_schema, item, &format!("{path}[{idx}]"), issues);
                }
            }
        }
        _ => {}
    }
}

fn check_enum(schema: &Schema, value: &Value, path: &str, issues: &mut Vec<RawIssue>) {
    if schema.enum_values.contains(value) {
        return;
    }

    // A string that matches an allowed value except for casing is a distinct,
    // softer finding than a plain enum miss.
    if let Value::String(s) = value {
        let case_insensitive_hit = schema.enum_values.iter().any(|allowed| {
            allowed
                .as_str()
                .map(|a| a.eq_ignore_ascii_case(s))
                .unwrap_or(false)
        });
        if case_insensitive_hit {
            issues.push(RawIssue::new(
                "ENUM_CASE_MISMATCH",
                format!("value '{s}' differs from an allowed enum value only by case"),
                path,
            ));
            return;
        }
    }

    issues.push(RawIssue::new(
        "ENUM_MISMATCH",
        format!(
            "value {value} is not one of the allowed values {}",
            Value::Array(schema.enum_values.clone())
        ),
        path,
    ));
}

fn check_string(schema: &Schema, s: &str, path: &str, issues: &mut Vec<RawIssue>) {
    let len = s.chars().count() as u64;

    if let Some(max) = schema.max_length {
        if len > max {
            issues.push(RawIssue::new(
                "MAX_LENGTH",
                format!("string length {len} exceeds maxLength {max}"),
                path,
            ));
        }
    }

    if let Some(min) = schema.min_length {
        if len < min {
            issues.push(RawIssue::new(
                "MIN_LENGTH",
                format!("string length {len} is below minLength {min}"),
                path,
            ));
        }
    }

    if let Some(pattern) = &schema.pattern {
        // An unparsable pattern in the contract is the contract author's bug;
        // it cannot fail live traffic.
        if let Ok(re) = Regex::new(pattern) {
            if !re.is_match(s) {
                issues.push(RawIssue::new(
                    "PATTERN",
                    format!("value '{s}' does not match pattern '{pattern}'"),
                    path,
                ));
            }
        }
    }

    if let Some(format) = schema.format.as_deref() {
        let ok = match format {
            "uuid" => UUID_RE.is_match(s),
            "date" => DATE_RE.is_match(s),
            "date-time" => DATE_TIME_RE.is_match(s),
            "byte" => s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')),
            // Unknown string formats are not checkable here.
            _ => true,
        };
        if !ok {
            issues.push(RawIssue::new(
                "INVALID_FORMAT",
                format!("value '{s}' does not conform to format '{format}'"),
                path,
            ));
        }
    }
}

fn check_number(schema: &Schema, n: Option<f64>, path: &str, issues: &mut Vec<RawIssue>) {
    let Some(n) = n else { return };

    if let Some(max) = schema.maximum {
        if n > max {
            issues.push(RawIssue::new(
                "MAXIMUM",
                format!("value {n} exceeds maximum {max}"),
                path,
            ));
        }
    }

    if let Some(min) = schema.minimum {
        if n < min {
            issues.push(RawIssue::new(
                "MINIMUM",
                format!("value {n} is below minimum {min}"),
                path,
            ));
        }
    }

    if let Some(format) = schema.format.as_deref() {
        let ok = match format {
            "int32" => n.fract() == 0.0 && (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&n),
            "int64" => n.fract() == 0.0,
            _ => true,
        };
        if !ok {
            issues.push(RawIssue::new(
                "INVALID_FORMAT",
                format!("value {n} does not conform to format '{format}'"),
                path,
            ));
        }
    }
}

fn check_object(
    schema: &Schema,
    map: &serde_json::Map<String, Value>,
    path: &str,
    issues: &mut Vec<RawIssue>,
) {
    for required in &schema.required {
        if !map.contains_key(required) {
            issues.push(RawIssue::new(
                "OBJECT_MISSING_REQUIRED_PROPERTY",
                format!("missing required property '{required}'"),
                join_path(path, required),
            ));
        }
    }

    if schema.additional_properties == Some(false) {
        for key in map.keys() {
            if !schema.properties.contains_key(key) {
                issues.push(RawIssue::new(
                    "OBJECT_ADDITIONAL_PROPERTIES",
                    format!("property '{key}' is not declared and additional properties are forbidden"),
                    join_path(path, key),
                ));
            }
        }
    }

    for (name, property_schema) in &schema.properties {
        if let Some(property_value) = map.get(name) {
            check_value(property_schema, property_value, &join_path(path, name), issues);
        }
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn type_matches(kind: &str, value: &Value) -> bool {
    match kind {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
        }
        "number" => value.is_number(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        // Unknown declared types are not checkable.
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
