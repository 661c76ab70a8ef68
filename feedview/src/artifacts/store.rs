//! Artifact store over a blob store.

use base64::{engine::general_purpose::STANDARD, Engine};
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::PipelineSettings;
use crate::errors::{ConfigError, PipelineError, StoreError};
use crate::events::{EventSink, NoOpEventSink};
use crate::records::ViewKey;
use crate::render::RenderedArtifact;
use crate::store::{BlobStore, PutObject};

/// Where a view's artifact lives. Either part may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactLocation {
    /// Bucket, if the view or the settings provide one.
    pub bucket: Option<String>,
    /// Object key, if it can be determined without rendering episodes.
    pub key: Option<String>,
}

/// Returns the base64 MD5 digest of a body, as sent with every put.
#[must_use]
pub fn content_md5(body: &str) -> String {
    STANDARD.encode(Md5::digest(body.as_bytes()))
}

/// Writes and deletes rendered artifacts.
#[derive(Clone)]
pub struct ArtifactStore {
    blobs: Arc<dyn BlobStore>,
    content_types: HashMap<String, String>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("content_types", &self.content_types)
            .finish_non_exhaustive()
    }
}

impl ArtifactStore {
    /// Creates an artifact store.
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>, settings: &PipelineSettings) -> Self {
        Self {
            blobs,
            content_types: settings.content_types.clone(),
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the sink receiving `artifact.*` events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Writes content under `bucket/key`.
    pub async fn put(&self, bucket: &str, key: &str, content: String) -> Result<(), StoreError> {
        let request = PutObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: self.content_type(key),
            content_md5: content_md5(&content),
            body: content,
        };
        let bytes = request.body.len();
        self.blobs.put_object(request).await?;

        debug!(bucket, key, bytes, "Stored artifact");
        self.sink.emit(
            "artifact.stored",
            Some(serde_json::json!({"bucket": bucket, "key": key, "bytes": bytes})),
        );
        Ok(())
    }

    /// Deletes `bucket/key`.
    pub async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.blobs.delete_object(bucket, key).await?;

        debug!(bucket, key, "Deleted artifact");
        self.sink.emit(
            "artifact.deleted",
            Some(serde_json::json!({"bucket": bucket, "key": key})),
        );
        Ok(())
    }

    /// Writes a rendered artifact.
    pub async fn store(&self, artifact: RenderedArtifact) -> Result<(), StoreError> {
        let RenderedArtifact {
            bucket,
            name,
            content,
        } = artifact;
        self.put(&bucket, &name, content).await
    }

    /// Deletes a view's artifact.
    ///
    /// Fails with [`ConfigError::MissingArtifactLocation`] without touching
    /// the blob store when the bucket or the key is unknown.
    pub async fn remove(&self, view: &ViewKey, location: ArtifactLocation) -> Result<(), PipelineError> {
        let (Some(bucket), Some(key)) = (location.bucket, location.key) else {
            return Err(ConfigError::MissingArtifactLocation {
                view: view.to_string(),
            }
            .into());
        };
        self.delete(&bucket, &key).await?;
        Ok(())
    }

    /// Returns the content type for an object key.
    #[must_use]
    pub fn content_type(&self, key: &str) -> String {
        let extension = key
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if let Some(configured) = self.content_types.get(&extension) {
            return configured.clone();
        }

        match extension.as_str() {
            "html" | "htm" => "text/html; charset=utf-8",
            "xml" => "application/xml",
            "rss" => "application/rss+xml",
            "json" => "application/json",
            "css" => "text/css",
            "js" => "application/javascript",
            _ => "text/plain; charset=utf-8",
        }
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::store::MockBlobStore;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    fn store_with(blobs: MockBlobStore) -> ArtifactStore {
        ArtifactStore::new(Arc::new(blobs), &PipelineSettings::default())
    }

    #[test]
    fn test_content_md5() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(content_md5(""), "1B2M2Y8AsgTpgAmY7PhCfg==");
    }

    #[tokio::test]
    async fn test_store_puts_with_digest_and_type() {
        let mut blobs = MockBlobStore::new();
        blobs
            .expect_put_object()
            .withf(|req| {
                req.bucket == "podcasts"
                    && req.key == "index.html"
                    && req.body == "<h1>2</h1>"
                    && req.content_type == "text/html; charset=utf-8"
                    && req.content_md5 == content_md5("<h1>2</h1>")
            })
            .times(1)
            .returning(|_| Ok(()));

        let store = store_with(blobs);
        assert_ok!(
            store
                .store(RenderedArtifact {
                    bucket: "podcasts".to_string(),
                    name: "index.html".to_string(),
                    content: "<h1>2</h1>".to_string(),
                })
                .await
        );
    }

    #[tokio::test]
    async fn test_remove_without_location_makes_no_call() {
        let mut blobs = MockBlobStore::new();
        blobs.expect_delete_object().times(0);

        let store = store_with(blobs);
        let view = ViewKey::new("f1", "v1");

        let err = store
            .remove(&view, ArtifactLocation::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Config(ConfigError::MissingArtifactLocation { .. })
        ));

        let err = store
            .remove(
                &view,
                ArtifactLocation {
                    bucket: Some("podcasts".to_string()),
                    key: None,
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_remove_deletes_object() {
        let mut blobs = MockBlobStore::new();
        blobs
            .expect_delete_object()
            .withf(|bucket, key| bucket.contains("podcasts") && key.contains("rss.xml"))
            .times(1)
            .returning(|_, _| Ok(()));

        let sink = Arc::new(CollectingEventSink::new());
        let store = store_with(blobs).with_event_sink(sink.clone());
        let location = ArtifactLocation {
            bucket: Some("podcasts".to_string()),
            key: Some("rss.xml".to_string()),
        };

        assert_ok!(store.remove(&ViewKey::new("f1", "rss"), location).await);
        assert_eq!(sink.events_of_type("artifact.deleted").len(), 1);
    }

    #[tokio::test]
    async fn test_put_failure_surfaces() {
        let mut blobs = MockBlobStore::new();
        blobs
            .expect_put_object()
            .returning(|req| Err(StoreError::write(req.bucket, req.key, "access denied")));

        let store = store_with(blobs);
        let err = assert_err!(store.put("b", "k.html", "x".to_string()).await);
        assert_eq!(err, StoreError::write("b", "k.html", "access denied"));
    }

    #[test]
    fn test_content_type_lookup() {
        let settings = PipelineSettings::default().with_content_type("xml", "application/rss+xml");
        let store = ArtifactStore::new(Arc::new(MockBlobStore::new()), &settings);

        assert_eq!(store.content_type("feed.XML"), "application/rss+xml");
        assert_eq!(store.content_type("data.json"), "application/json");
        assert_eq!(store.content_type("episodes/1.htm"), "text/html; charset=utf-8");
        assert_eq!(store.content_type("README"), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_content_type_from_loaded_settings() {
        let settings =
            PipelineSettings::from_json_str(r#"{"content_types": {"XML": "application/rss+xml"}}"#)
                .unwrap();
        let store = ArtifactStore::new(Arc::new(MockBlobStore::new()), &settings);
        assert_eq!(store.content_type("feed.xml"), "application/rss+xml");
    }
}
