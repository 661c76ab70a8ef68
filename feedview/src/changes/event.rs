//! Stream-record change events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;
use crate::records::AttributeMap;

/// One invocation's worth of change events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeBatch {
    /// Events in stream order.
    #[serde(rename = "Records", default)]
    pub records: Vec<ChangeEvent>,
}

impl ChangeBatch {
    /// Creates a batch from events.
    #[must_use]
    pub fn new(records: Vec<ChangeEvent>) -> Self {
        Self { records }
    }

    /// Parses a batch from its JSON wire form.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::invalid_event(0, e.to_string()))
    }

    /// Returns the number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the batch has no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The kind of change an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A new item.
    Insert,
    /// An existing item changed.
    Modify,
    /// An item was deleted.
    Remove,
}

impl EventKind {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Modify => "MODIFY",
            Self::Remove => "REMOVE",
        }
    }
}

impl FromStr for EventKind {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "INSERT" => Ok(Self::Insert),
            "MODIFY" => Ok(Self::Modify),
            "REMOVE" => Ok(Self::Remove),
            other => Err(ConfigError::UnrecognizedEvent {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys and images of a changed item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Primary key of the changed item.
    #[serde(rename = "Keys", default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<AttributeMap>,
    /// Item after the change (INSERT, MODIFY).
    #[serde(rename = "NewImage", default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<AttributeMap>,
    /// Item before the change (MODIFY, REMOVE).
    #[serde(rename = "OldImage", default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<AttributeMap>,
}

/// A single change notification.
///
/// The event name stays raw until classification so that an unknown name
/// fails the batch instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Raw event name.
    #[serde(rename = "eventName")]
    pub event_name: String,
    /// Stream-assigned event id.
    #[serde(rename = "eventID", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Keys and images.
    #[serde(default)]
    pub dynamodb: StreamRecord,
}

impl ChangeEvent {
    /// Creates an event with the given raw name and keys.
    #[must_use]
    pub fn new(event_name: impl Into<String>, keys: AttributeMap) -> Self {
        Self {
            event_name: event_name.into(),
            event_id: None,
            dynamodb: StreamRecord {
                keys: Some(keys),
                ..StreamRecord::default()
            },
        }
    }

    /// Creates an INSERT event.
    #[must_use]
    pub fn insert(keys: AttributeMap, new_image: AttributeMap) -> Self {
        Self::new(EventKind::Insert.as_str(), keys).with_new_image(new_image)
    }

    /// Creates a MODIFY event.
    #[must_use]
    pub fn modify(keys: AttributeMap, old_image: AttributeMap, new_image: AttributeMap) -> Self {
        Self::new(EventKind::Modify.as_str(), keys)
            .with_old_image(old_image)
            .with_new_image(new_image)
    }

    /// Creates a REMOVE event.
    #[must_use]
    pub fn remove(keys: AttributeMap, old_image: AttributeMap) -> Self {
        Self::new(EventKind::Remove.as_str(), keys).with_old_image(old_image)
    }

    /// Sets the new image.
    #[must_use]
    pub fn with_new_image(mut self, image: AttributeMap) -> Self {
        self.dynamodb.new_image = Some(image);
        self
    }

    /// Sets the old image.
    #[must_use]
    pub fn with_old_image(mut self, image: AttributeMap) -> Self {
        self.dynamodb.old_image = Some(image);
        self
    }

    /// Sets the event id.
    #[must_use]
    pub fn with_event_id(mut self, id: impl Into<String>) -> Self {
        self.event_id = Some(id.into());
        self
    }

    /// Classifies the event name.
    pub fn kind(&self) -> Result<EventKind, ConfigError> {
        self.event_name.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_stream_batch() {
        let batch = ChangeBatch::from_json_str(
            r#"{
                "Records": [
                    {
                        "eventID": "1",
                        "eventName": "MODIFY",
                        "dynamodb": {
                            "Keys": {"feedId": "f1", "viewId": "v1"},
                            "OldImage": {"feedId": "f1", "viewId": "v1", "template": "a"},
                            "NewImage": {"feedId": "f1", "viewId": "v1", "template": "b"}
                        }
                    },
                    {"eventName": "REMOVE", "dynamodb": {"Keys": {"feedId": "f1", "viewId": "v2"}}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.records[0].kind().unwrap(), EventKind::Modify);
        assert_eq!(batch.records[0].event_id.as_deref(), Some("1"));
        assert_eq!(
            batch.records[0].dynamodb.new_image.as_ref().unwrap()["template"],
            json!("b")
        );
        assert!(batch.records[1].dynamodb.old_image.is_none());
    }

    #[test]
    fn test_unknown_event_name_survives_parsing() {
        let batch =
            ChangeBatch::from_json_str(r#"{"Records": [{"eventName": "UPSERT"}]}"#).unwrap();
        assert_eq!(
            batch.records[0].kind().unwrap_err(),
            ConfigError::UnrecognizedEvent {
                name: "UPSERT".to_string()
            }
        );
    }

    #[test]
    fn test_empty_batch() {
        assert!(ChangeBatch::from_json_str("{}").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_batch_is_config_error() {
        let err = ChangeBatch::from_json_str(r#"{"Records": 3}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEvent { .. }));
    }

    #[test]
    fn test_builders_round_trip_wire_names() {
        let keys = json!({"feedId": "f1", "episodeId": "e1"}).as_object().cloned().unwrap();
        let event = ChangeEvent::remove(keys.clone(), keys).with_event_id("42");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["eventName"], "REMOVE");
        assert_eq!(value["eventID"], "42");
        assert!(value["dynamodb"].get("OldImage").is_some());
        assert!(value["dynamodb"].get("NewImage").is_none());
    }
}
