//! Deduplicated sets of affected views and feeds.

use std::collections::{HashMap, HashSet};

use super::event::{ChangeBatch, ChangeEvent, EventKind};
use crate::errors::ConfigError;
use crate::records::{key_attribute, AttributeMap, ViewKey, FEED_ID};

/// What to do with a changed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewAction {
    /// Re-render the view.
    Update,
    /// Delete the view's artifact.
    Remove,
}

impl From<EventKind> for ViewAction {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Insert | EventKind::Modify => Self::Update,
            EventKind::Remove => Self::Remove,
        }
    }
}

/// The action for one view, plus the last known image of it.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewChange {
    /// The view.
    pub key: ViewKey,
    /// The final action for this batch.
    pub action: ViewAction,
    /// Image before the change, used when the view is already gone on removal.
    pub old_image: Option<AttributeMap>,
}

/// One action per view key. The last event for a key decides its action;
/// keys keep the order in which they were first seen.
#[derive(Debug, Clone, Default)]
pub struct ViewChangeSet {
    changes: Vec<ViewChange>,
    index: HashMap<ViewKey, usize>,
}

impl ViewChangeSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies a views-table batch. Fails on the first unrecognized or
    /// malformed event.
    pub fn from_batch(batch: &ChangeBatch) -> Result<Self, ConfigError> {
        let mut set = Self::new();
        for (index, event) in batch.records.iter().enumerate() {
            let kind = event.kind()?;
            let keys = event
                .dynamodb
                .keys
                .as_ref()
                .ok_or_else(|| ConfigError::invalid_event(index, "missing Keys"))?;
            let key =
                ViewKey::from_attributes(keys).map_err(|r| ConfigError::invalid_event(index, r))?;
            set.insert(key, kind.into(), event.dynamodb.old_image.clone());
        }
        Ok(set)
    }

    /// Records an action for a key. A later action for the same key
    /// replaces the earlier one.
    pub fn insert(&mut self, key: ViewKey, action: ViewAction, old_image: Option<AttributeMap>) {
        if let Some(&position) = self.index.get(&key) {
            let change = &mut self.changes[position];
            change.action = action;
            if old_image.is_some() {
                change.old_image = old_image;
            }
            return;
        }
        self.index.insert(key.clone(), self.changes.len());
        self.changes.push(ViewChange {
            key,
            action,
            old_image,
        });
    }

    /// Returns the action recorded for a key.
    #[must_use]
    pub fn get(&self, key: &ViewKey) -> Option<ViewAction> {
        self.index.get(key).map(|&i| self.changes[i].action)
    }

    /// Returns the number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns true if no key was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Iterates changes in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &ViewChange> {
        self.changes.iter()
    }
}

impl IntoIterator for ViewChangeSet {
    type Item = ViewChange;
    type IntoIter = std::vec::IntoIter<ViewChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

/// Distinct feed ids affected by an episodes-table batch, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSet {
    feeds: Vec<String>,
    seen: HashSet<String>,
}

impl FeedSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies an episodes-table batch.
    ///
    /// INSERT marks the new image's feed, REMOVE the old image's feed and
    /// MODIFY both when an episode moved between feeds. INSERT and REMOVE
    /// fall back to the event's keys when the image has no feed id. MODIFY
    /// needs a feed id in both images.
    pub fn from_batch(batch: &ChangeBatch) -> Result<Self, ConfigError> {
        let mut set = Self::new();
        for (index, event) in batch.records.iter().enumerate() {
            let images = &event.dynamodb;
            match event.kind()? {
                EventKind::Insert => {
                    set.insert(image_feed(index, event, images.new_image.as_ref(), true)?);
                }
                EventKind::Remove => {
                    set.insert(image_feed(index, event, images.old_image.as_ref(), true)?);
                }
                EventKind::Modify => {
                    let old = image_feed(index, event, images.old_image.as_ref(), false)?;
                    let new = image_feed(index, event, images.new_image.as_ref(), false)?;
                    set.insert(old);
                    set.insert(new);
                }
            }
        }
        Ok(set)
    }

    /// Adds a feed id. Returns false if it was already present.
    pub fn insert(&mut self, feed_id: String) -> bool {
        if self.seen.contains(&feed_id) {
            return false;
        }
        self.seen.insert(feed_id.clone());
        self.feeds.push(feed_id);
        true
    }

    /// Returns true if the feed id is present.
    #[must_use]
    pub fn contains(&self, feed_id: &str) -> bool {
        self.seen.contains(feed_id)
    }

    /// Returns the number of distinct feeds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    /// Returns true if no feed was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    /// Iterates feed ids in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.feeds.iter().map(String::as_str)
    }
}

impl IntoIterator for FeedSet {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.feeds.into_iter()
    }
}

fn image_feed(
    index: usize,
    event: &ChangeEvent,
    image: Option<&AttributeMap>,
    use_keys: bool,
) -> Result<String, ConfigError> {
    if let Some(feed) = image.and_then(|i| key_attribute(i, FEED_ID).ok()) {
        return Ok(feed);
    }
    event
        .dynamodb
        .keys
        .as_ref()
        .filter(|_| use_keys)
        .and_then(|k| key_attribute(k, FEED_ID).ok())
        .ok_or_else(|| {
            ConfigError::invalid_event(index, format!("{} event has no feedId", event.event_name))
        })
}
