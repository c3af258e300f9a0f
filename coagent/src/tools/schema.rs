//! Minimal JSON-Schema validation for tool inputs.
//!
//! Covers the subset the tool specs use: `type`, `required`, `properties`,
//! `enum`, and array `items`. Violations fail with `invalid_input` naming
//! the offending path.

use serde_json::Value;

use crate::error::GatewayError;

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn validate_at(schema: &Value, value: &Value, path: &str) -> Result<(), GatewayError> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !type_matches(expected, value) {
            return Err(GatewayError::InvalidInput(format!(
                "{}: expected {}, got {}",
                path,
                expected,
                type_name(value)
            )));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(GatewayError::InvalidInput(format!(
                "{}: value {} not in enum",
                path, value
            )));
        }
    }

    if let (Some(obj), Some(properties)) =
        (value.as_object(), schema.get("properties").and_then(Value::as_object))
    {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !obj.contains_key(name) {
                    return Err(GatewayError::InvalidInput(format!(
                        "{}: missing required property '{}'",
                        path, name
                    )));
                }
            }
        }
        for (name, prop_schema) in properties {
            if let Some(prop_value) = obj.get(name) {
                validate_at(prop_schema, prop_value, &format!("{}/{}", path, name))?;
            }
        }
    }

    if let (Some(items), Some(item_schema)) = (value.as_array(), schema.get("items")) {
        for (index, item) in items.iter().enumerate() {
            validate_at(item_schema, item, &format!("{}/{}", path, index))?;
        }
    }

    Ok(())
}

/// Validates a tool input against its spec schema.
pub fn validate_input(schema: &Value, input: &Value) -> Result<(), GatewayError> {
    validate_at(schema, input, "input")
}
