//! Record and change event fixtures.

use serde_json::{json, Value};
use std::sync::Arc;

use super::memory::{InMemoryBlobStore, InMemoryKeyValueStore};
use crate::changes::ChangeEvent;
use crate::config::PipelineSettings;
use crate::events::CollectingEventSink;
use crate::pipeline::ChangeEventDispatcher;
use crate::records::{AttributeMap, EpisodeKey, ViewKey, ViewRecord};

/// Builds an episode item. `extra` must be a JSON object or null.
#[must_use]
pub fn episode_attributes(feed_id: &str, episode_id: &str, extra: Value) -> AttributeMap {
    let mut attributes = EpisodeKey::new(feed_id, episode_id).to_attributes();
    if let Value::Object(extra) = extra {
        attributes.extend(extra);
    }
    attributes
}

fn titled(feed_id: &str, episode_id: &str) -> AttributeMap {
    episode_attributes(feed_id, episode_id, json!({"title": format!("Episode {episode_id}")}))
}

/// An INSERT of an episode into a feed.
#[must_use]
pub fn episode_insert(feed_id: &str, episode_id: &str) -> ChangeEvent {
    ChangeEvent::insert(
        EpisodeKey::new(feed_id, episode_id).to_attributes(),
        titled(feed_id, episode_id),
    )
}

/// A REMOVE of an episode from a feed.
#[must_use]
pub fn episode_remove(feed_id: &str, episode_id: &str) -> ChangeEvent {
    ChangeEvent::remove(
        EpisodeKey::new(feed_id, episode_id).to_attributes(),
        titled(feed_id, episode_id),
    )
}

/// A MODIFY that moves an episode from one feed to another.
#[must_use]
pub fn episode_move(episode_id: &str, from_feed: &str, to_feed: &str) -> ChangeEvent {
    ChangeEvent::modify(
        EpisodeKey::new(to_feed, episode_id).to_attributes(),
        titled(from_feed, episode_id),
        titled(to_feed, episode_id),
    )
}

/// An INSERT of a view definition.
#[must_use]
pub fn view_insert(view: &ViewRecord) -> ChangeEvent {
    ChangeEvent::insert(view.key.to_attributes(), view.to_attributes())
}

/// A MODIFY of a view definition.
#[must_use]
pub fn view_modify(view: &ViewRecord) -> ChangeEvent {
    ChangeEvent::modify(view.key.to_attributes(), view.to_attributes(), view.to_attributes())
}

/// A REMOVE of a view definition, carrying its last image.
#[must_use]
pub fn view_remove(view: &ViewRecord) -> ChangeEvent {
    ChangeEvent::remove(view.key.to_attributes(), view.to_attributes())
}

/// A dispatcher wired to in-memory stores and a collecting sink.
#[derive(Debug)]
pub struct TestPipeline {
    /// Settings the dispatcher is built with.
    pub settings: PipelineSettings,
    /// Episode and view tables.
    pub store: Arc<InMemoryKeyValueStore>,
    /// Artifact storage.
    pub blobs: Arc<InMemoryBlobStore>,
    /// Lifecycle events.
    pub sink: Arc<CollectingEventSink>,
}

impl Default for TestPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPipeline {
    /// Creates a harness whose default bucket is `podcasts`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(PipelineSettings::default().with_default_bucket("podcasts"))
    }

    /// Creates a harness with custom settings.
    #[must_use]
    pub fn with_settings(settings: PipelineSettings) -> Self {
        Self {
            settings,
            store: Arc::new(InMemoryKeyValueStore::new()),
            blobs: Arc::new(InMemoryBlobStore::new()),
            sink: Arc::new(CollectingEventSink::new()),
        }
    }

    /// Replaces the key-value store. Call before adding records.
    #[must_use]
    pub fn with_store(mut self, store: InMemoryKeyValueStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    /// Adds an episode. `extra` must be a JSON object or null.
    pub fn add_episode(&self, feed_id: &str, episode_id: &str, extra: Value) {
        self.store.put_item(
            &self.settings.episodes_table,
            EpisodeKey::new(feed_id, episode_id).to_attributes(),
            episode_attributes(feed_id, episode_id, extra),
        );
    }

    /// Adds or replaces a view definition.
    pub fn add_view(&self, view: &ViewRecord) {
        self.store.put_item(
            &self.settings.views_table,
            view.key.to_attributes(),
            view.to_attributes(),
        );
    }

    /// Deletes a view definition.
    pub fn delete_view(&self, key: &ViewKey) -> bool {
        self.store
            .delete_item(&self.settings.views_table, &key.to_attributes())
    }

    /// Builds a dispatcher over the harness stores.
    #[must_use]
    pub fn dispatcher(&self) -> ChangeEventDispatcher {
        ChangeEventDispatcher::new(&self.settings, self.store.clone(), self.blobs.clone())
            .with_event_sink(self.sink.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::EventKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_episode_move_images() {
        let event = episode_move("e1", "A", "B");
        assert_eq!(event.kind().unwrap(), EventKind::Modify);
        assert_eq!(event.dynamodb.old_image.unwrap()["feedId"], "A");
        assert_eq!(event.dynamodb.new_image.unwrap()["feedId"], "B");
    }

    #[test]
    fn test_harness_tables() {
        let pipeline = TestPipeline::new();
        pipeline.add_episode("f1", "e1", json!({"title": "Pilot"}));
        pipeline.add_view(&ViewRecord::new(ViewKey::new("f1", "index"), "x"));

        assert_eq!(pipeline.store.item_count("podcast-episodes"), 1);
        assert_eq!(pipeline.store.item_count("podcast-views"), 1);
        assert!(pipeline.delete_view(&ViewKey::new("f1", "index")));
    }
}
