//! Blob store interface.

use async_trait::async_trait;

use crate::errors::StoreError;

/// An object write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObject {
    /// Destination bucket.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Object body.
    pub body: String,
    /// MIME type of the body.
    pub content_type: String,
    /// Base64-encoded MD5 digest of the body.
    pub content_md5: String,
}

/// Write access to a blob store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes an object, replacing any existing one.
    async fn put_object(&self, request: PutObject) -> Result<(), StoreError>;

    /// Deletes an object. Deleting a missing object succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}
