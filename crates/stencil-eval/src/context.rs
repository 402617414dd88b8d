//! Data context supplied by the caller at render time.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Error;
use crate::value::Value;

/// Name-to-value bindings made available to a template while it runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from any serializable value whose JSON form is an
    /// object; each top-level field becomes a variable.
    pub fn from_serialize<T: Serialize>(data: &T) -> Result<Self, Error> {
        let json = serde_json::to_value(data)
            .map_err(|e| Error::runtime(format!("Cannot serialize context: {}", e)))?;
        match Value::from(json) {
            Value::Object(vars) => Ok(Self { vars }),
            Value::Null => Ok(Self::default()),
            other => Err(Error::runtime(format!(
                "Context must be an object, got {}",
                other.type_name()
            ))),
        }
    }

    /// Parse a JSON object into a context.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::runtime(format!("Invalid context JSON: {}", e)))?;
        Self::from_serialize(&json)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Page {
        title: String,
        views: u32,
    }

    #[test]
    fn test_from_serialize_struct() {
        let page = Page {
            title: "Home".to_string(),
            views: 3,
        };
        let context = Context::from_serialize(&page).unwrap();
        assert_eq!(context.get("title"), Some(&Value::from("Home")));
        assert_eq!(context.get("views"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn test_from_serialize_rejects_scalars() {
        assert!(Context::from_serialize(&42).is_err());
    }

    #[test]
    fn test_from_json() {
        let context = Context::from_json(r#"{"user": {"name": "Ada"}}"#).unwrap();
        assert_eq!(context.get("user").map(|u| u.member("name")), Some(Value::from("Ada")));
    }

    #[test]
    fn test_collect() {
        let context: Context = [("a", 1i64), ("b", 2i64)].into_iter().collect();
        assert_eq!(context.len(), 2);
    }
}
