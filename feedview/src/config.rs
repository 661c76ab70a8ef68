//! Configuration for the change-to-rerender pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::errors::ConfigError;

/// Settings shared by every component of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Table holding episode records.
    #[serde(default = "default_episodes_table")]
    pub episodes_table: String,
    /// Table holding view definitions.
    #[serde(default = "default_views_table")]
    pub views_table: String,
    /// Artifact name used when a view has no filename template.
    #[serde(default = "default_filename")]
    pub default_filename: String,
    /// Bucket used when a view has no bucket of its own.
    #[serde(default)]
    pub default_bucket: Option<String>,
    /// Page size hint passed to partition queries.
    #[serde(default)]
    pub page_size: Option<usize>,
    /// Maximum number of pages read from one partition.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Maximum number of branches in flight per fan-out. Unbounded when unset.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    /// Content types by artifact extension, consulted before the built-in table.
    /// Extensions are lowercased on load.
    #[serde(default, deserialize_with = "lowercase_extensions")]
    pub content_types: HashMap<String, String>,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogSettings,
}

fn default_episodes_table() -> String {
    "podcast-episodes".to_string()
}

fn default_views_table() -> String {
    "podcast-views".to_string()
}

fn default_filename() -> String {
    "index.html".to_string()
}

fn lowercase_extensions<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let table = HashMap::<String, String>::deserialize(deserializer)?;
    Ok(table
        .into_iter()
        .map(|(extension, content_type)| (extension.to_ascii_lowercase(), content_type))
        .collect())
}

fn default_max_pages() -> usize {
    10_000
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            episodes_table: default_episodes_table(),
            views_table: default_views_table(),
            default_filename: default_filename(),
            default_bucket: None,
            page_size: None,
            max_pages: default_max_pages(),
            max_concurrency: None,
            content_types: HashMap::new(),
            log: LogSettings::default(),
        }
    }
}

impl PipelineSettings {
    /// Creates settings with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses settings from a JSON document and validates them.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| ConfigError::InvalidSettings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a JSON file and validates them.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::InvalidSettings(format!("reading {}: {e}", path.display()))
        })?;
        Self::from_json_str(&contents)
    }

    /// Applies `FEEDVIEW_*` environment variables on top of these settings.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides from an arbitrary variable source.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FEEDVIEW_EPISODES_TABLE") {
            self.episodes_table = v;
        }
        if let Some(v) = lookup("FEEDVIEW_VIEWS_TABLE") {
            self.views_table = v;
        }
        if let Some(v) = lookup("FEEDVIEW_DEFAULT_FILENAME") {
            self.default_filename = v;
        }
        if let Some(v) = lookup("FEEDVIEW_DEFAULT_BUCKET") {
            self.default_bucket = Some(v);
        }
        if let Some(v) = lookup("FEEDVIEW_PAGE_SIZE") {
            self.page_size = Some(parse_count("FEEDVIEW_PAGE_SIZE", &v)?);
        }
        if let Some(v) = lookup("FEEDVIEW_MAX_CONCURRENCY") {
            self.max_concurrency = Some(parse_count("FEEDVIEW_MAX_CONCURRENCY", &v)?);
        }
        if let Some(v) = lookup("FEEDVIEW_LOG") {
            self.log.filter = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks the settings for values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.episodes_table.is_empty() || self.views_table.is_empty() {
            return Err(ConfigError::InvalidSettings(
                "table names must not be empty".to_string(),
            ));
        }
        if self.default_filename.is_empty() {
            return Err(ConfigError::InvalidSettings(
                "default_filename must not be empty".to_string(),
            ));
        }
        if self.page_size == Some(0) {
            return Err(ConfigError::InvalidSettings(
                "page_size must be positive".to_string(),
            ));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::InvalidSettings(
                "max_pages must be positive".to_string(),
            ));
        }
        if self.max_concurrency == Some(0) {
            return Err(ConfigError::InvalidSettings(
                "max_concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the episodes table.
    #[must_use]
    pub fn with_episodes_table(mut self, table: impl Into<String>) -> Self {
        self.episodes_table = table.into();
        self
    }

    /// Sets the views table.
    #[must_use]
    pub fn with_views_table(mut self, table: impl Into<String>) -> Self {
        self.views_table = table.into();
        self
    }

    /// Sets the default artifact name.
    #[must_use]
    pub fn with_default_filename(mut self, name: impl Into<String>) -> Self {
        self.default_filename = name.into();
        self
    }

    /// Sets the default bucket.
    #[must_use]
    pub fn with_default_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.default_bucket = Some(bucket.into());
        self
    }

    /// Sets the page size hint.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Sets the page cap per partition scan.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Caps the number of in-flight branches per fan-out.
    #[must_use]
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    /// Registers a content type for an artifact extension.
    #[must_use]
    pub fn with_content_type(
        mut self,
        extension: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        self.content_types
            .insert(extension.into().to_ascii_lowercase(), content_type.into());
        self
    }
}

fn parse_count(name: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidSettings(format!("{name} must be a number, got {value:?}")))
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}
