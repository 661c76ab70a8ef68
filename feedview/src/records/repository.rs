//! Data-store accessors for episodes and views.

use std::sync::Arc;
use tracing::debug;

use super::{EpisodeKey, EpisodeRecord, Record, ViewKey, ViewRecord, FEED_ID};
use crate::config::PipelineSettings;
use crate::errors::{PipelineError, StoreError};
use crate::paging::PagedReader;
use crate::store::KeyValueStore;

/// Reads episodes from the episodes table.
#[derive(Clone)]
pub struct EpisodeRepository {
    store: Arc<dyn KeyValueStore>,
    reader: PagedReader,
}

impl std::fmt::Debug for EpisodeRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeRepository")
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}

impl EpisodeRepository {
    /// Creates a repository over the configured episodes table.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, settings: &PipelineSettings) -> Self {
        let reader = PagedReader::new(store.clone(), &settings.episodes_table, FEED_ID)
            .with_page_size(settings.page_size)
            .with_max_pages(settings.max_pages);
        Self { store, reader }
    }

    /// Finds an episode by id. `Ok(None)` when it does not exist.
    pub async fn find_by_id(&self, key: &EpisodeKey) -> Result<Option<EpisodeRecord>, PipelineError> {
        let item = self
            .store
            .get_item(self.reader.table(), &key.to_attributes())
            .await?;
        debug!(episode = %key, found = item.is_some(), "Looked up episode");
        item.map(EpisodeRecord::from_attributes)
            .transpose()
            .map_err(PipelineError::from)
    }

    /// Returns every episode of a feed.
    pub async fn for_feed(&self, feed_id: &str) -> Result<Vec<EpisodeRecord>, PipelineError> {
        self.reader.fetch_all(feed_id).await
    }

    /// Returns the underlying paged reader.
    #[must_use]
    pub fn reader(&self) -> &PagedReader {
        &self.reader
    }
}

/// Reads view definitions from the views table.
#[derive(Clone)]
pub struct ViewRepository {
    store: Arc<dyn KeyValueStore>,
    reader: PagedReader,
}

impl std::fmt::Debug for ViewRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRepository")
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}

impl ViewRepository {
    /// Creates a repository over the configured views table.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, settings: &PipelineSettings) -> Self {
        let reader = PagedReader::new(store.clone(), &settings.views_table, FEED_ID)
            .with_page_size(settings.page_size)
            .with_max_pages(settings.max_pages);
        Self { store, reader }
    }

    /// Finds a view by id. `Ok(None)` when it does not exist.
    pub async fn find_by_id(&self, key: &ViewKey) -> Result<Option<ViewRecord>, PipelineError> {
        let item = self
            .store
            .get_item(self.reader.table(), &key.to_attributes())
            .await?;
        debug!(view = %key, found = item.is_some(), "Looked up view");
        item.map(ViewRecord::from_attributes)
            .transpose()
            .map_err(PipelineError::from)
    }

    /// Finds a view by id, failing when it does not exist.
    pub async fn get(&self, key: &ViewKey) -> Result<ViewRecord, PipelineError> {
        self.find_by_id(key)
            .await?
            .ok_or_else(|| StoreError::not_found(ViewRecord::ENTITY, key.to_string()).into())
    }

    /// Returns every view of a feed.
    pub async fn for_feed(&self, feed_id: &str) -> Result<Vec<ViewRecord>, PipelineError> {
        self.reader.fetch_all(feed_id).await
    }

    /// Returns the underlying paged reader.
    #[must_use]
    pub fn reader(&self) -> &PagedReader {
        &self.reader
    }
}
