//! Runtime values for the artifact interpreter.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value as JsonValue;

/// A runtime value bound in a template scope.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The null value. Undefined variables and missing members evaluate to this.
    #[default]
    Null,
    /// A string value.
    String(String),
    /// A numeric value (always f64).
    Number(f64),
    /// A boolean value.
    Boolean(bool),
    /// An array of values.
    Array(Vec<Value>),
    /// An object with string keys, ordered by key.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Coerce this value to the text it renders as.
    ///
    /// Null renders as empty text so that missing data degrades to nothing
    /// in the output instead of a literal marker.
    pub fn to_string_value(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            Value::Array(arr) => {
                let items: Vec<String> = arr.iter().map(|v| v.to_string_value()).collect();
                items.join(", ")
            }
            Value::Object(_) => "[object]".to_string(),
        }
    }

    /// Coerce this value to a boolean.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Boolean(b) => *b,
            Value::Array(arr) => !arr.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of this value's type, as reported by `typeof()` and in errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Look up a member of an object. Anything else has no members.
    pub fn member(&self, name: &str) -> Value {
        match self {
            Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Parse a JSON string into a Value.
    pub fn from_json(s: &str) -> Result<Value, String> {
        let json: JsonValue = serde_json::from_str(s)
            .map_err(|e| format!("JSON parse error: {}", e))?;
        Ok(Value::from(json))
    }

    /// Convert this Value to a compact JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.to_json_value()).unwrap_or_else(|_| "null".to_string())
    }

    /// Convert this Value to a serde_json Value.
    pub fn to_json_value(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Number(n) if *n == n.trunc() && n.abs() < 1e15 => {
                JsonValue::Number(serde_json::Number::from(*n as i64))
            }
            Value::Number(n) => {
                serde_json::Number::from_f64(*n)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null)
            }
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Array(arr) => {
                JsonValue::Array(arr.iter().map(|v| v.to_json_value()).collect())
            }
            Value::Object(obj) => {
                let map: serde_json::Map<String, JsonValue> = obj.iter()
                    .map(|(k, v)| (k.clone(), v.to_json_value()))
                    .collect();
                JsonValue::Object(map)
            }
        }
    }
}

/// Integer-like numbers print without a decimal point.
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "INF" } else { "-INF" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(b),
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(arr) => Value::Array(arr.into_iter().map(Value::from).collect()),
            JsonValue::Object(obj) => {
                Value::Object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
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

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_renders_empty() {
        assert_eq!(Value::Null.to_string_value(), "");
    }

    #[test]
    fn test_integer_like_numbers() {
        assert_eq!(Value::Number(3.0).to_string_value(), "3");
        assert_eq!(Value::Number(2.5).to_string_value(), "2.5");
    }

    #[test]
    fn test_from_json_nested() {
        let value = Value::from_json(r#"{"user": {"name": "Ada", "tags": ["a", "b"]}}"#).unwrap();
        let user = value.member("user");
        assert_eq!(user.member("name"), Value::from("Ada"));
        assert_eq!(user.member("tags").to_string_value(), "a, b");
    }

    #[test]
    fn test_member_of_non_object_is_null() {
        assert!(Value::from("text").member("len").is_null());
    }

    #[test]
    fn test_json_roundtrip_keeps_structure() {
        let value = Value::from(vec![Value::from(1i64), Value::Null, Value::from(true)]);
        assert_eq!(value.to_json(), "[1,null,true]");
    }
}
