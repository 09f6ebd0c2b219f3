use serde_json::Value;

pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| text.to_string())
}

/// Short description of a value's shape, for diagnostics.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
