//! Routing change batches to re-render and removal work.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::artifacts::ArtifactStore;
use crate::changes::{ChangeBatch, FeedSet, ViewAction, ViewChange, ViewChangeSet};
use crate::config::PipelineSettings;
use crate::errors::{PipelineError, StoreError};
use crate::events::{EventSink, LoggingEventSink};
use crate::fanout::{BatchReport, FanOutAggregator, InvocationResult};
use crate::records::{EpisodeRecord, EpisodeRepository, Record, ViewRecord, ViewRepository};
use crate::render::{TemplateEngine, TemplateRenderer};
use crate::store::{BlobStore, KeyValueStore};

/// The table a change batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTable {
    /// The view definitions table.
    Views,
    /// The episodes table.
    Episodes,
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Views => f.write_str("views"),
            Self::Episodes => f.write_str("episodes"),
        }
    }
}

/// Turns change batches into re-rendered or removed artifacts.
#[derive(Clone)]
pub struct ChangeEventDispatcher {
    settings: PipelineSettings,
    episodes: EpisodeRepository,
    views: ViewRepository,
    renderer: TemplateRenderer,
    artifacts: ArtifactStore,
    aggregator: FanOutAggregator,
}

impl fmt::Debug for ChangeEventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeEventDispatcher")
            .field("episodes", &self.episodes)
            .field("views", &self.views)
            .field("renderer", &self.renderer)
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}

impl ChangeEventDispatcher {
    /// Creates a dispatcher over the given stores.
    ///
    /// Lifecycle events go to a debug-level [`LoggingEventSink`] until
    /// [`with_event_sink`](Self::with_event_sink) replaces it.
    #[must_use]
    pub fn new(
        settings: &PipelineSettings,
        store: Arc<dyn KeyValueStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            settings: settings.clone(),
            episodes: EpisodeRepository::new(store.clone(), settings),
            views: ViewRepository::new(store, settings),
            renderer: TemplateRenderer::new(settings),
            artifacts: ArtifactStore::new(blobs, settings),
            aggregator: FanOutAggregator::new().with_max_concurrency(settings.max_concurrency),
        }
        .with_event_sink(Arc::new(LoggingEventSink::debug()))
    }

    /// Replaces the template engine.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.renderer = TemplateRenderer::with_engine(&self.settings, engine);
        self
    }

    /// Sets the sink receiving lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.artifacts = self.artifacts.with_event_sink(sink.clone());
        self.aggregator = self.aggregator.with_event_sink(sink);
        self
    }

    /// Processes a batch from either table.
    pub async fn handle(
        &self,
        batch: &ChangeBatch,
        table: SourceTable,
    ) -> Result<BatchReport, PipelineError> {
        match table {
            SourceTable::Views => self.process_view_changes(batch).await,
            SourceTable::Episodes => self.process_episode_changes(batch).await,
        }
    }

    /// Processes a batch and returns its serializable outcome.
    pub async fn invoke(&self, batch: &ChangeBatch, table: SourceTable) -> InvocationResult {
        InvocationResult::from_outcome(&self.handle(batch, table).await)
    }

    /// Processes a views-table batch.
    ///
    /// Each distinct view is re-rendered (INSERT, MODIFY) or has its artifact
    /// deleted (REMOVE). An unrecognized or malformed event fails the batch
    /// before any view is touched.
    pub async fn process_view_changes(
        &self,
        batch: &ChangeBatch,
    ) -> Result<BatchReport, PipelineError> {
        let changes = ViewChangeSet::from_batch(batch)?;
        info!(events = batch.len(), views = changes.len(), "Classified view changes");

        let branches = changes
            .into_iter()
            .map(|change| (change.key.to_string(), self.apply_view_change(change)));
        Ok(self.aggregator.run("views", branches).await?)
    }

    /// Processes an episodes-table batch.
    ///
    /// Every view of every affected feed is re-rendered against the feed's
    /// full episode collection.
    pub async fn process_episode_changes(
        &self,
        batch: &ChangeBatch,
    ) -> Result<BatchReport, PipelineError> {
        let feeds = FeedSet::from_batch(batch)?;
        info!(events = batch.len(), feeds = feeds.len(), "Classified episode changes");

        let branches = feeds
            .into_iter()
            .map(|feed_id| (feed_id.clone(), self.render_views_for_feed(feed_id)));
        Ok(self.aggregator.run("feeds", branches).await?)
    }

    async fn apply_view_change(&self, change: ViewChange) -> Result<(), PipelineError> {
        match change.action {
            ViewAction::Update => {
                let view = self.views.get(&change.key).await?;
                let episodes = self.episodes.for_feed(&view.key.feed_id).await?;
                self.render_and_store_view(&view, &episodes).await
            }
            ViewAction::Remove => {
                let view = match self.views.find_by_id(&change.key).await? {
                    Some(view) => view,
                    None => match change.old_image {
                        Some(image) => ViewRecord::from_attributes(image)?,
                        None => {
                            return Err(
                                StoreError::not_found(ViewRecord::ENTITY, change.key.to_string())
                                    .into(),
                            )
                        }
                    },
                };
                let location = self.renderer.removal_location(&view)?;
                self.artifacts.remove(&view.key, location).await
            }
        }
    }

    async fn render_views_for_feed(&self, feed_id: String) -> Result<(), PipelineError> {
        let (episodes, views) = futures::try_join!(
            self.episodes.for_feed(&feed_id),
            self.views.for_feed(&feed_id)
        )?;
        debug!(
            feed = %feed_id,
            episodes = episodes.len(),
            views = views.len(),
            "Loaded feed"
        );

        let episodes = &episodes;
        let branches = views
            .iter()
            .map(|view| (view.key.to_string(), self.render_and_store_view(view, episodes)));
        self.aggregator
            .run(&format!("feed {feed_id}"), branches)
            .await?;
        Ok(())
    }

    async fn render_and_store_view(
        &self,
        view: &ViewRecord,
        episodes: &[EpisodeRecord],
    ) -> Result<(), PipelineError> {
        let rendered = self.renderer.render(view, episodes)?;

        if !view.render_each {
            for artifact in rendered {
                self.artifacts.store(artifact).await?;
            }
            return Ok(());
        }

        let branches = rendered.into_iter().map(|artifact| {
            let branch = format!("{}/{}", artifact.bucket, artifact.name);
            let artifacts = &self.artifacts;
            (branch, async move {
                artifacts.store(artifact).await.map_err(PipelineError::from)
            })
        });
        self.aggregator
            .run(&format!("view {}", view.key), branches)
            .await?;
        Ok(())
    }
}
