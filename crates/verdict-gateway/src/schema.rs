//! JSON schema helpers
//!
//! Builders for the small schemas tools declare, and the pre-dispatch
//! argument check (required fields and primitive types).

use crate::error::{GatewayError, Result};
use serde_json::{Map, Value, json};

/// Create a JSON Schema object type
///
/// ```
/// use verdict_gateway::schema::{object, string};
/// use serde_json::json;
///
/// let schema = object(
///     json!({ "ticker_symbol": string(Some("Stock ticker symbol")) }),
///     vec!["ticker_symbol"],
/// );
/// assert_eq!(schema["required"][0], "ticker_symbol");
/// ```
pub fn object(properties: Value, required: Vec<&str>) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Create a JSON Schema string type
pub fn string(description: Option<&str>) -> Value {
    typed("string", description)
}

/// Create a JSON Schema number type
pub fn number(description: Option<&str>) -> Value {
    typed("number", description)
}

/// Create an enum schema (string with allowed values)
pub fn enum_string(values: &[&str], description: Option<&str>) -> Value {
    let mut schema = typed("string", description);
    schema["enum"] = json!(values);
    schema
}

fn typed(type_name: &str, description: Option<&str>) -> Value {
    match description {
        Some(d) => json!({ "type": type_name, "description": d }),
        None => json!({ "type": type_name }),
    }
}

/// Check that a value has the schema's primitive type
///
/// Schemas without a `type`, or with a type we do not know, accept anything.
pub fn matches_type(value: &Value, schema: &Value) -> bool {
    let Some(schema_type) = schema.get("type").and_then(Value::as_str) else {
        return true;
    };

    match schema_type {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// Validate tool arguments against an object schema
///
/// Checks that every `required` property is present and non-null, and that
/// each supplied property matches its declared type. Properties absent from
/// the schema are passed through.
pub fn validate_arguments(tool: &str, arguments: &Map<String, Value>, schema: &Value) -> Result<()> {
    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for field in required.iter().filter_map(Value::as_str) {
        match arguments.get(field) {
            None | Some(Value::Null) => {
                return Err(GatewayError::SchemaViolation(format!(
                    "{tool}: missing required argument '{field}'"
                )));
            }
            Some(_) => {}
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, value) in arguments {
            if let Some(property) = properties.get(name) {
                if !matches_type(value, property) {
                    return Err(GatewayError::SchemaViolation(format!(
                        "{tool}: argument '{name}' should be of type {}",
                        property.get("type").and_then(Value::as_str).unwrap_or("unknown")
                    )));
                }
            }
        }
    }

    Ok(())
}
