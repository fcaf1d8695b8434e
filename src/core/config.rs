//! Configuration system for blocks
//!
//! Named, typed, block-scoped values set before/at start. Hosts populate a
//! [`ConfigStore`] per block instance, typically from a JSON object, and
//! blocks read it through typed accessors during their lifecycle calls.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Boolean value
    Boolean(bool),
    /// Integer number
    Integer(i64),
    /// Floating point number
    Number(f64),
    /// String value
    String(String),
    /// Array of values
    Array(Vec<ConfigValue>),
    /// Object with key-value pairs
    Object(HashMap<String, ConfigValue>),
    /// Null value
    Null,
}

impl ConfigValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    /// Try to convert to string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to convert to integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            ConfigValue::Number(n) => Some(*n as i64),
            _ => None,
        }
    }

    /// Try to convert to a non-negative size
    pub fn as_usize(&self) -> Option<usize> {
        self.as_i64().and_then(|i| usize::try_from(i).ok())
    }

    /// Try to convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to convert to array
    pub fn as_array(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to convert to object
    pub fn as_object(&self) -> Option<&HashMap<String, ConfigValue>> {
        match self {
            ConfigValue::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Integer(i)
    }
}

impl From<usize> for ConfigValue {
    fn from(i: usize) -> Self {
        ConfigValue::Integer(i as i64)
    }
}

impl From<f64> for ConfigValue {
    fn from(n: f64) -> Self {
        ConfigValue::Number(n)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Boolean(b)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(values: Vec<ConfigValue>) -> Self {
        ConfigValue::Array(values)
    }
}

/// Named configuration for one block instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigStore {
    values: HashMap<String, ConfigValue>,
}

impl ConfigStore {
    /// Create a new empty configuration store
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Parse a configuration store from a JSON object
    ///
    /// # Example
    /// ```
    /// use fnblock::core::config::ConfigStore;
    ///
    /// let cfg = ConfigStore::from_json(r#"{ "stacksize": 65536 }"#).unwrap();
    /// assert_eq!(cfg.get("stacksize").and_then(|v| v.as_usize()), Some(65536));
    /// ```
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let values: HashMap<String, ConfigValue> = serde_json::from_str(json)?;
        Ok(Self { values })
    }

    /// Set a configuration value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style `set`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Get a raw configuration value
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    /// Get a string value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_str)
    }

    /// Get an integer value
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ConfigValue::as_i64)
    }

    /// Get a size value
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(ConfigValue::as_usize)
    }

    /// Get an array value
    pub fn get_array(&self, key: &str) -> Option<&[ConfigValue]> {
        self.get(key).and_then(ConfigValue::as_array)
    }

    /// Check if a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of configured values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
