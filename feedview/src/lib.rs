//! # Feedview
//!
//! Incremental materialization of rendered podcast feed views.
//!
//! Feedview reacts to change batches on two key-value tables (episodes and
//! view definitions), works out which rendered artifacts went stale, refetches
//! the data they depend on, re-renders the view templates and writes the
//! results to blob storage:
//!
//! - **Change classification**: one action per affected key, however many
//!   events in the batch reference it
//! - **Paginated reads**: complete partition scans that follow the store's
//!   continuation cursor
//! - **Rendering**: aggregate (one artifact per view) and per-item (one
//!   artifact per episode) template expansion
//! - **Fan-out**: every key or feed is processed concurrently and the batch
//!   outcome lists every failed branch
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use feedview::prelude::*;
//!
//! let settings = PipelineSettings::default().with_default_bucket("podcasts");
//! let dispatcher = ChangeEventDispatcher::new(&settings, store, blobs);
//!
//! let batch: ChangeBatch = serde_json::from_str(payload)?;
//! let outcome = dispatcher.process_episode_changes(&batch).await;
//! let result = InvocationResult::from_outcome(&outcome);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod artifacts;
pub mod changes;
pub mod config;
pub mod errors;
pub mod events;
pub mod fanout;
pub mod observability;
pub mod paging;
pub mod pipeline;
pub mod records;
pub mod render;
pub mod store;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::artifacts::{ArtifactLocation, ArtifactStore};
    pub use crate::changes::{
        ChangeBatch, ChangeEvent, EventKind, FeedSet, ViewAction, ViewChangeSet,
    };
    pub use crate::config::{LogSettings, PipelineSettings};
    pub use crate::errors::{
        ConfigError, PipelineError, RenderError, StoreError, TemplateError,
    };
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::fanout::{
        BatchContext, BatchFailure, BatchReport, BranchFailure, FanOutAggregator,
        InvocationResult,
    };
    pub use crate::pipeline::{ChangeEventDispatcher, SourceTable};
    pub use crate::records::{
        AttributeMap, EpisodeKey, EpisodeRecord, EpisodeRepository, KeyType, Record,
        ViewKey, ViewRecord, ViewRepository,
    };
    pub use crate::render::{
        ExpressionTemplateEngine, RenderedArtifact, TemplateEngine, TemplateRenderer,
    };
    pub use crate::store::{BlobStore, KeyValueStore, Page, PutObject, QueryRequest};
    pub use crate::paging::{Paged, PagedReader};
}
