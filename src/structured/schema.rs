//! Schema generation utilities.

use serde_json::json;

/// Derive a JSON schema from a Rust type via schemars.
pub fn json_schema_from_type<T: schemars::JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(&schema).unwrap_or_else(|_| json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct Answer {
        label: String,
        confidence: f64,
    }

    #[test]
    fn test_schema_from_type_declares_fields() {
        let schema = json_schema_from_type::<Answer>();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["label"].is_object());
        assert!(schema["properties"]["confidence"].is_object());
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|f| f == "label"));
    }
}
