use serde_json::{Map, Value};

/// Coerces every metadata value into the restricted schema the vector store
/// accepts: string, integer, float, boolean, or a homogeneous sequence of
/// strings. Non-conforming values are stringified deterministically, so the
/// same input always maps to the same stored metadata.
pub fn sanitize_metadata(metadata: &Map<String, Value>) -> Map<String, Value> {
    metadata
        .iter()
        .map(|(key, value)| (key.clone(), sanitize_value(value)))
        .collect()
}

fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => value.clone(),
        Value::Array(items) => {
            if items.iter().all(Value::is_string) {
                value.clone()
            } else {
                Value::Array(items.iter().map(stringify_item).collect())
            }
        }
        other => Value::String(render(other)),
    }
}

fn stringify_item(value: &Value) -> Value {
    Value::String(render(value))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        // lowercase "true"/"false", not Python-style "True"/"False"
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}
