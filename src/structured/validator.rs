//! Output validation against the caller's declared schema.
//!
//! Covers the constraint subset the completion pipeline needs: types,
//! required fields, nested properties, array items and enums. Local `$ref`s
//! (as produced by schemars) are resolved against the root schema.

use std::fmt;

use serde_json::Value;

/// Validation error with location information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// What went wrong.
    pub message: String,
    /// JSON path to the error location (e.g., "points[0].x").
    pub path: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            message: message.into(),
            path: if path.is_empty() { None } else { Some(path) },
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validator for structured output.
pub struct OutputValidator {
    root: Value,
}

impl OutputValidator {
    pub fn new(schema: Value) -> Self {
        Self { root: schema }
    }

    /// Validate data against the schema.
    pub fn validate(&self, data: &Value) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        self.check(data, &self.root, "", &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Resolve a local `#/...` reference against the root schema.
    fn resolve<'a>(&'a self, schema: &'a Value) -> &'a Value {
        if let Some(reference) = schema.get("$ref").and_then(|r| r.as_str()) {
            if let Some(pointer) = reference.strip_prefix('#') {
                if let Some(target) = self.root.pointer(pointer) {
                    return target;
                }
            }
        }
        schema
    }

    fn check(&self, data: &Value, schema: &Value, path: &str, errors: &mut Vec<ValidationError>) {
        let schema = self.resolve(schema);

        if let Some(expected) = schema.get("type").and_then(|t| t.as_str()) {
            if !type_matches(data, expected) {
                errors.push(ValidationError::new(
                    format!("expected type '{}', got '{}'", expected, type_name(data)),
                    path,
                ));
                return;
            }
        }

        if let Some(variants) = schema.get("enum").and_then(|e| e.as_array()) {
            if !variants.contains(data) {
                errors.push(ValidationError::new(
                    format!("value not in enum {:?}", variants),
                    path,
                ));
            }
        }

        if let Value::Object(map) = data {
            if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
                for field in required.iter().filter_map(|f| f.as_str()) {
                    if !map.contains_key(field) {
                        errors.push(ValidationError::new(
                            format!("missing required field '{}'", field),
                            path,
                        ));
                    }
                }
            }
            if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
                for (name, property_schema) in properties {
                    if let Some(value) = map.get(name) {
                        let child = join_path(path, name);
                        self.check(value, property_schema, &child, errors);
                    }
                }
            }
        }

        if let Value::Array(items) = data {
            if let Some(item_schema) = schema.get("items") {
                for (index, item) in items.iter().enumerate() {
                    let child = format!("{}[{}]", path, index);
                    self.check(item, item_schema, &child, errors);
                }
            }
        }
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn type_matches(data: &Value, expected: &str) -> bool {
    match expected {
        "string" => data.is_string(),
        "integer" => data.is_i64() || data.is_u64(),
        "number" => data.is_number(),
        "boolean" => data.is_boolean(),
        "array" => data.is_array(),
        "object" => data.is_object(),
        "null" => data.is_null(),
        // Unknown type keyword: accept anything.
        _ => true,
    }
}

fn type_name(data: &Value) -> &'static str {
    match data {
        Value::String(_) => "string",
        Value::Number(_) => {
            if data.is_i64() || data.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        Value::Bool(_) => "boolean",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Null => "null",
    }
}
