//! Interceptor properties

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{InterposeError, InterposeResult};

/// String-keyed settings handed to
/// [`Interceptor::set_properties`](crate::Interceptor::set_properties).
///
/// Values loaded from environment overrides arrive as strings, so the
/// numeric and boolean getters also accept their textual forms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
    values: Map<String, Value>,
}

impl Properties {
    /// Create an empty property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a property, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Raw value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether `key` is set
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// String value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key)?.as_str()
    }

    /// Boolean value (`true`/`false`, also as strings)
    ///
    /// # Errors
    ///
    /// Returns [`InterposeError::InvalidProperty`] if the value is present
    /// but not a boolean.
    pub fn get_bool(&self, key: &str) -> InterposeResult<Option<bool>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => s
                .parse()
                .map(Some)
                .map_err(|_| InterposeError::invalid_property(key, "expected a boolean")),
            Some(_) => Err(InterposeError::invalid_property(key, "expected a boolean")),
        }
    }

    /// Unsigned integer value
    ///
    /// # Errors
    ///
    /// Returns [`InterposeError::InvalidProperty`] if the value is present
    /// but not a non-negative integer.
    pub fn get_u64(&self, key: &str) -> InterposeResult<Option<u64>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| {
                InterposeError::invalid_property(key, "expected a non-negative integer")
            }),
            Some(v) => v.as_u64().map(Some).ok_or_else(|| {
                InterposeError::invalid_property(key, "expected a non-negative integer")
            }),
        }
    }

    /// Signed integer value
    ///
    /// # Errors
    ///
    /// Returns [`InterposeError::InvalidProperty`] if the value is present
    /// but not an integer.
    pub fn get_i64(&self, key: &str) -> InterposeResult<Option<i64>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| InterposeError::invalid_property(key, "expected an integer")),
            Some(v) => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| InterposeError::invalid_property(key, "expected an integer")),
        }
    }

    /// Deserialize a value into `T`
    ///
    /// # Errors
    ///
    /// Returns [`InterposeError::InvalidProperty`] with the deserializer's
    /// message if the value does not fit `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> InterposeResult<Option<T>> {
        self.values
            .get(key)
            .map(|v| {
                serde_json::from_value(v.clone())
                    .map_err(|e| InterposeError::invalid_property(key, e.to_string()))
            })
            .transpose()
    }

    /// Iterate over `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no properties are set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Map<String, Value>> for Properties {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_typed_getters() {
        let props = Properties::new()
            .with("label", "orders")
            .with("enabled", true)
            .with("limit", 10)
            .with("offset", -3)
            .with("from_env", "42");

        assert_eq!(props.get_str("label"), Some("orders"));
        assert_eq!(props.get_bool("enabled").unwrap(), Some(true));
        assert_eq!(props.get_u64("limit").unwrap(), Some(10));
        assert_eq!(props.get_i64("offset").unwrap(), Some(-3));
        assert_eq!(props.get_u64("from_env").unwrap(), Some(42));
        assert_eq!(props.get_u64("missing").unwrap(), None);
        assert_eq!(props.len(), 5);
    }

    #[test]
    fn test_invalid_values() {
        let props = Properties::new().with("limit", "many").with("offset", -1);
        let err = props.get_u64("limit").unwrap_err();
        assert!(matches!(err, InterposeError::InvalidProperty { ref key, .. } if key == "limit"));
        assert!(props.get_u64("offset").is_err());
        assert!(props.get_bool("offset").is_err());
    }

    #[test]
    fn test_get_as() {
        let props: Properties = [("buckets", json!([1, 5, 10]))].into_iter().collect();
        assert_eq!(
            props.get_as::<Vec<u32>>("buckets").unwrap(),
            Some(vec![1, 5, 10])
        );
        assert!(props.get_as::<String>("buckets").is_err());
    }

    #[test]
    fn test_deserializes_from_object() {
        let props: Properties = serde_json::from_value(json!({"level": "debug"})).unwrap();
        assert_eq!(props.get_str("level"), Some("debug"));
    }
}
