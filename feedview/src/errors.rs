//! Error types for the feedview pipeline.
//!
//! Errors fall into three families that decide how far a failure reaches:
//! configuration problems, store failures and render failures. The batch
//! aggregator collects branch errors into a [`BatchFailure`], which is itself
//! a [`PipelineError`] so that nested fan-outs report through their parent.

use std::collections::HashMap;
use thiserror::Error;

pub use crate::fanout::BatchFailure;

/// The main error type for feedview operations.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Malformed input or missing configuration.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A key-value or blob store operation failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Template expansion failed.
    #[error("{0}")]
    Render(#[from] RenderError),

    /// One or more branches of a fan-out failed.
    #[error("{0}")]
    Batch(#[from] BatchFailure),
}

impl PipelineError {
    /// Returns a stable identifier for the error family.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::Store(_) => "StoreError",
            Self::Render(_) => "RenderError",
            Self::Batch(_) => "BatchFailure",
        }
    }

    /// Returns true if the error was raised by local validation rather than a
    /// store or template failure.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        if let Self::Batch(failure) = self {
            map.insert(
                "errors".to_string(),
                serde_json::Value::Array(
                    failure
                        .failures
                        .iter()
                        .map(|f| serde_json::Value::Object(f.to_dict().into_iter().collect()))
                        .collect(),
                ),
            );
        }

        map
    }
}

/// Errors caused by malformed input or missing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A change event carried an event name outside INSERT/MODIFY/REMOVE.
    #[error("Unrecognized eventName \"{name}\"")]
    UnrecognizedEvent {
        /// The raw event name.
        name: String,
    },

    /// A change event lacked the keys or images needed to classify it.
    #[error("Invalid change event at index {index}: {reason}")]
    InvalidEvent {
        /// Position of the event in the batch.
        index: usize,
        /// What was missing or malformed.
        reason: String,
    },

    /// A stored record could not be parsed into its typed form.
    #[error("Invalid {entity} record: {reason}")]
    InvalidRecord {
        /// The record type ("episode" or "view").
        entity: &'static str,
        /// What was missing or malformed.
        reason: String,
    },

    /// A view has no bucket or key to address its artifact.
    #[error("View {view} is missing bucket or key")]
    MissingArtifactLocation {
        /// The view identity.
        view: String,
    },

    /// Pipeline settings failed to load or validate.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

impl ConfigError {
    /// Creates an invalid event error.
    #[must_use]
    pub fn invalid_event(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidEvent {
            index,
            reason: reason.into(),
        }
    }

    /// Creates an invalid record error.
    #[must_use]
    pub fn invalid_record(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            entity,
            reason: reason.into(),
        }
    }
}

/// Failures reported by the key-value store or the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A get or query against a table failed.
    #[error("Read from table {table} failed: {reason}")]
    Read {
        /// The table name.
        table: String,
        /// The store's failure description.
        reason: String,
    },

    /// A put or delete against a bucket failed.
    #[error("Write to {bucket}/{key} failed: {reason}")]
    Write {
        /// The bucket name.
        bucket: String,
        /// The object key.
        key: String,
        /// The store's failure description.
        reason: String,
    },

    /// A record addressed by id does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// The record type.
        entity: &'static str,
        /// The identity that was looked up.
        key: String,
    },

    /// A partition scan kept returning a cursor past the page cap.
    #[error("Scan of {table} partition {partition} exceeded {max_pages} pages")]
    PaginationLimit {
        /// The table name.
        table: String,
        /// The partition key value.
        partition: String,
        /// The configured page cap.
        max_pages: usize,
    },
}

impl StoreError {
    /// Creates a read error.
    #[must_use]
    pub fn read(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Read {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Creates a write error.
    #[must_use]
    pub fn write(
        bucket: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Write {
            bucket: bucket.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }
}

/// Error raised by a template engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TemplateError {
    /// Description of the failure.
    pub message: String,
}

impl TemplateError {
    /// Creates a new template error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Template expansion failed for a view, optionally for one of its items.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Rendering view {view}{} failed: {source}",
    .item.as_ref().map(|id| format!(" for episode {id}")).unwrap_or_default()
)]
pub struct RenderError {
    /// The view identity.
    pub view: String,
    /// The failing item in per-item mode.
    pub item: Option<String>,
    /// The underlying engine failure.
    pub source: TemplateError,
}

impl RenderError {
    /// Creates a render error for an aggregate render.
    #[must_use]
    pub fn new(view: impl Into<String>, source: TemplateError) -> Self {
        Self {
            view: view.into(),
            item: None,
            source,
        }
    }

    /// Attaches the failing item identity.
    #[must_use]
    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }
}
