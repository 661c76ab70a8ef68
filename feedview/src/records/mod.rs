//! Typed records read from the episode and view tables.
//!
//! Stores hand back untyped attribute maps. Each record type names the
//! attributes it understands and keeps everything else in an explicit
//! pass-through map for templates.

mod episode;
mod repository;
mod view;

pub use episode::{EpisodeKey, EpisodeRecord};
pub use repository::{EpisodeRepository, ViewRepository};
pub use view::{ViewKey, ViewRecord};

use serde_json::Value;

use crate::errors::ConfigError;

/// An item as stored in the key-value store.
pub type AttributeMap = serde_json::Map<String, Value>;

/// Attribute holding the feed id, the partition key of both tables.
pub const FEED_ID: &str = "feedId";

/// A record that can be decoded from a stored attribute map.
pub trait Record: Sized + Send {
    /// Record type name used in errors.
    const ENTITY: &'static str;

    /// Decodes a record from its stored attributes.
    fn from_attributes(attributes: AttributeMap) -> Result<Self, ConfigError>;
}

/// Stored type of a sort key attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyType {
    /// Stored as a string.
    #[default]
    String,
    /// Stored as a number.
    Number,
}

/// Reads a partition key attribute. Partition keys are strings.
pub(crate) fn key_attribute(
    attributes: &AttributeMap,
    name: &str,
) -> Result<String, String> {
    match attributes.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(format!("attribute '{name}' is empty")),
        Some(other) => Err(format!("attribute '{name}' must be a string, got {}", type_name(other))),
        None => Err(format!("missing attribute '{name}'")),
    }
}

/// Reads a sort key attribute, keeping whether it was stored as a number.
pub(crate) fn sort_key_attribute(
    attributes: &AttributeMap,
    name: &str,
) -> Result<(String, KeyType), String> {
    match attributes.get(name) {
        Some(Value::Number(n)) => Ok((n.to_string(), KeyType::Number)),
        _ => key_attribute(attributes, name).map(|s| (s, KeyType::String)),
    }
}

/// Returns a sort key in store form.
pub(crate) fn sort_key_value(id: &str, key_type: KeyType) -> Value {
    match key_type {
        KeyType::Number => id
            .parse::<serde_json::Number>()
            .map_or_else(|_| Value::String(id.to_string()), Value::Number),
        KeyType::String => Value::String(id.to_string()),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> AttributeMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_key_attribute_string_and_number() {
        let map = attrs(json!({"feedId": "f1", "viewId": 42, "episodeId": "e1"}));
        assert_eq!(key_attribute(&map, "feedId").unwrap(), "f1");
        assert!(key_attribute(&map, "viewId").unwrap_err().contains("must be a string"));
        assert_eq!(
            sort_key_attribute(&map, "viewId").unwrap(),
            ("42".to_string(), KeyType::Number)
        );
        assert_eq!(
            sort_key_attribute(&map, "episodeId").unwrap(),
            ("e1".to_string(), KeyType::String)
        );
    }

    #[test]
    fn test_sort_key_value_keeps_type() {
        assert_eq!(sort_key_value("42", KeyType::Number), json!(42));
        assert_eq!(sort_key_value("42", KeyType::String), json!("42"));
        assert_eq!(sort_key_value("1.5", KeyType::Number), json!(1.5));
    }

    #[test]
    fn test_key_attribute_rejects_missing_and_empty() {
        let map = attrs(json!({"feedId": "", "viewId": [1]}));
        assert!(key_attribute(&map, "feedId").unwrap_err().contains("empty"));
        assert!(key_attribute(&map, "viewId").unwrap_err().contains("array"));
        assert!(key_attribute(&map, "episodeId").unwrap_err().contains("missing"));
    }
}
