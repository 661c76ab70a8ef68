//! Testing utilities for the feedview pipeline.
//!
//! This module provides:
//! - In-memory key-value and blob stores with failure injection
//! - Record and change event fixtures
//! - A wired-up pipeline harness

mod fixtures;
mod memory;

pub use fixtures::{
    episode_attributes, episode_insert, episode_move, episode_remove, view_insert, view_modify,
    view_remove, TestPipeline,
};
pub use memory::{BlobOperation, InMemoryBlobStore, InMemoryKeyValueStore};
