//! Interfaces to the external key-value store and blob store.
//!
//! Both stores are shared, stateless handles. No call spans more than one
//! store operation and nothing here is transactional.

mod blob;
mod kv;

pub use blob::{BlobStore, PutObject};
pub use kv::{KeyValueStore, Page, QueryRequest};

#[cfg(test)]
pub use blob::MockBlobStore;
#[cfg(test)]
pub use kv::MockKeyValueStore;
