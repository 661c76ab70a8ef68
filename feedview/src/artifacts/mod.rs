//! Persisting rendered artifacts to blob storage.

mod store;

pub use store::{content_md5, ArtifactLocation, ArtifactStore};
