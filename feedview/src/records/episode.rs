//! Episode records.

use serde_json::Value;
use std::fmt;

use super::{
    key_attribute, sort_key_attribute, sort_key_value, AttributeMap, KeyType, Record, FEED_ID,
};
use crate::errors::ConfigError;

const EPISODE_ID: &str = "episodeId";

/// Identity of an episode: `(feedId, episodeId)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeKey {
    /// Partition key.
    pub feed_id: String,
    /// Sort key within the feed.
    pub episode_id: String,
    /// Stored type of the sort key.
    pub id_type: KeyType,
}

impl EpisodeKey {
    /// Creates a new episode key.
    #[must_use]
    pub fn new(feed_id: impl Into<String>, episode_id: impl Into<String>) -> Self {
        Self {
            feed_id: feed_id.into(),
            episode_id: episode_id.into(),
            id_type: KeyType::String,
        }
    }

    /// Sets the stored type of the sort key.
    #[must_use]
    pub fn with_id_type(mut self, id_type: KeyType) -> Self {
        self.id_type = id_type;
        self
    }

    /// Reads the key from stored attributes.
    pub fn from_attributes(attributes: &AttributeMap) -> Result<Self, String> {
        let feed_id = key_attribute(attributes, FEED_ID)?;
        let (episode_id, id_type) = sort_key_attribute(attributes, EPISODE_ID)?;
        Ok(Self {
            feed_id,
            episode_id,
            id_type,
        })
    }

    /// Returns the key in store form.
    #[must_use]
    pub fn to_attributes(&self) -> AttributeMap {
        let mut map = AttributeMap::new();
        map.insert(FEED_ID.to_string(), Value::String(self.feed_id.clone()));
        map.insert(EPISODE_ID.to_string(), sort_key_value(&self.episode_id, self.id_type));
        map
    }
}

impl fmt::Display for EpisodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.feed_id, self.episode_id)
    }
}

/// A single podcast episode. Everything but the key is opaque metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRecord {
    /// The episode identity.
    pub key: EpisodeKey,
    /// All stored attributes, key attributes included.
    attributes: AttributeMap,
}

impl EpisodeRecord {
    /// Returns an attribute by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Returns all stored attributes.
    #[must_use]
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Returns the episode as a template context value.
    #[must_use]
    pub fn to_context(&self) -> Value {
        Value::Object(self.attributes.clone())
    }
}

impl Record for EpisodeRecord {
    const ENTITY: &'static str = "episode";

    fn from_attributes(attributes: AttributeMap) -> Result<Self, ConfigError> {
        let key = EpisodeKey::from_attributes(&attributes)
            .map_err(|reason| ConfigError::invalid_record(Self::ENTITY, reason))?;
        Ok(Self { key, attributes })
    }
}
