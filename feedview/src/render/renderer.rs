//! Rendering views into artifacts.

use serde_json::{json, Value};
use std::sync::Arc;

use super::engine::{ExpressionTemplateEngine, TemplateEngine};
use crate::artifacts::ArtifactLocation;
use crate::config::PipelineSettings;
use crate::errors::{ConfigError, PipelineError, RenderError, TemplateError};
use crate::records::{EpisodeRecord, Record, ViewRecord};

/// A rendered view output, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    /// Destination bucket.
    pub bucket: String,
    /// Object key.
    pub name: String,
    /// Rendered content.
    pub content: String,
}

/// Renders views against their feed's episodes.
#[derive(Clone)]
pub struct TemplateRenderer {
    engine: Arc<dyn TemplateEngine>,
    default_filename: String,
    default_bucket: Option<String>,
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer")
            .field("default_filename", &self.default_filename)
            .field("default_bucket", &self.default_bucket)
            .finish_non_exhaustive()
    }
}

impl TemplateRenderer {
    /// Creates a renderer using the built-in expression engine.
    #[must_use]
    pub fn new(settings: &PipelineSettings) -> Self {
        Self::with_engine(settings, Arc::new(ExpressionTemplateEngine::new()))
    }

    /// Creates a renderer using a custom engine.
    #[must_use]
    pub fn with_engine(settings: &PipelineSettings, engine: Arc<dyn TemplateEngine>) -> Self {
        Self {
            engine,
            default_filename: settings.default_filename.clone(),
            default_bucket: settings.default_bucket.clone(),
        }
    }

    /// Renders a view in the mode it asks for.
    pub fn render(
        &self,
        view: &ViewRecord,
        episodes: &[EpisodeRecord],
    ) -> Result<Vec<RenderedArtifact>, PipelineError> {
        if view.render_each {
            self.render_per_item(view, episodes)
        } else {
            Ok(vec![self.render_aggregate(view, episodes)?])
        }
    }

    /// Renders one artifact from the whole episode collection.
    pub fn render_aggregate(
        &self,
        view: &ViewRecord,
        episodes: &[EpisodeRecord],
    ) -> Result<RenderedArtifact, PipelineError> {
        let bucket = self.bucket_for(view)?;
        let view_context = view.to_context();
        let name = self.expand_filename(view, &json!({ "view": view_context }))?;

        let context = json!({
            "view": view_context,
            "episodes": episodes.iter().map(EpisodeRecord::to_context).collect::<Vec<_>>(),
        });
        let content = self
            .engine
            .render(&view.template, &context)
            .map_err(|e| RenderError::new(view.key.to_string(), e))?;

        Ok(RenderedArtifact {
            bucket,
            name,
            content,
        })
    }

    /// Renders one artifact per episode. An empty collection renders nothing.
    ///
    /// The view must carry a filename template, otherwise every episode
    /// would be written to the same default name. Such a view is rejected
    /// with [`ConfigError::InvalidRecord`].
    pub fn render_per_item(
        &self,
        view: &ViewRecord,
        episodes: &[EpisodeRecord],
    ) -> Result<Vec<RenderedArtifact>, PipelineError> {
        let Some(ref filename_template) = view.filename_template else {
            return Err(ConfigError::invalid_record(
                ViewRecord::ENTITY,
                format!("view {} renders each episode but has no filenameTemplate", view.key),
            )
            .into());
        };
        let bucket = self.bucket_for(view)?;
        let view_context = view.to_context();

        episodes
            .iter()
            .map(|episode| {
                let context = json!({ "view": view_context, "episode": episode.to_context() });
                let item_error = |e: TemplateError| {
                    RenderError::new(view.key.to_string(), e).with_item(&episode.key.episode_id)
                };
                let name = self
                    .engine
                    .render(filename_template, &context)
                    .map_err(item_error)?;
                let content = self
                    .engine
                    .render(&view.template, &context)
                    .map_err(item_error)?;
                Ok::<_, PipelineError>(RenderedArtifact {
                    bucket: bucket.clone(),
                    name,
                    content,
                })
            })
            .collect()
    }

    /// Works out where a view's single artifact lives, for removal.
    ///
    /// An explicit `key` wins. Aggregate views otherwise use the name their
    /// filename template expands to; per-item views have no single key.
    pub fn removal_location(&self, view: &ViewRecord) -> Result<ArtifactLocation, PipelineError> {
        let key = match (&view.object_key, view.render_each) {
            (Some(key), _) => Some(key.clone()),
            (None, false) => Some(self.expand_filename(view, &json!({ "view": view.to_context() }))?),
            (None, true) => None,
        };
        Ok(ArtifactLocation {
            bucket: view.bucket.clone().or_else(|| self.default_bucket.clone()),
            key,
        })
    }

    fn expand_filename(&self, view: &ViewRecord, context: &Value) -> Result<String, PipelineError> {
        match view.filename_template {
            Some(ref template) => self
                .engine
                .render(template, context)
                .map_err(|e| RenderError::new(view.key.to_string(), e).into()),
            None => Ok(self.default_filename.clone()),
        }
    }

    fn bucket_for(&self, view: &ViewRecord) -> Result<String, ConfigError> {
        view.bucket
            .clone()
            .or_else(|| self.default_bucket.clone())
            .ok_or_else(|| ConfigError::MissingArtifactLocation {
                view: view.key.to_string(),
            })
    }
}
