//! In-memory store implementations.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;

use crate::errors::StoreError;
use crate::records::{key_attribute, AttributeMap};
use crate::store::{BlobStore, KeyValueStore, Page, PutObject, QueryRequest};

const OFFSET: &str = "__offset";

/// A key-value store holding tables in memory.
///
/// Items keep insertion order within a table. Queries page through matching
/// items; whenever a page comes back full a cursor is returned, so a
/// partition whose size is a multiple of the page size ends with an empty
/// page, as real stores do.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    tables: DashMap<String, Vec<(AttributeMap, AttributeMap)>>,
    page_size: Option<usize>,
    failures: RwLock<HashMap<(String, Option<String>), String>>,
    queries: Mutex<Vec<(String, String)>>,
    gets: Mutex<usize>,
}

impl InMemoryKeyValueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size used when a query carries no limit.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Stores an item under `key`, replacing any item with the same key.
    pub fn put_item(&self, table: &str, key: AttributeMap, item: AttributeMap) {
        let mut entries = self.tables.entry(table.to_string()).or_default();
        match entries.iter_mut().find(|entry| entry.0 == key) {
            Some(entry) => entry.1 = item,
            None => entries.push((key, item)),
        }
    }

    /// Deletes the item under `key`. Returns true if it existed.
    pub fn delete_item(&self, table: &str, key: &AttributeMap) -> bool {
        self.tables.get_mut(table).is_some_and(|mut entries| {
            let before = entries.len();
            entries.retain(|(k, _)| k != key);
            entries.len() != before
        })
    }

    /// Returns the number of items in a table.
    #[must_use]
    pub fn item_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |entries| entries.len())
    }

    /// Makes every read of `table` fail.
    pub fn fail_table(&self, table: &str, reason: impl Into<String>) {
        self.failures
            .write()
            .insert((table.to_string(), None), reason.into());
    }

    /// Makes queries of one partition of `table` fail.
    pub fn fail_partition(&self, table: &str, partition: &str, reason: impl Into<String>) {
        self.failures
            .write()
            .insert((table.to_string(), Some(partition.to_string())), reason.into());
    }

    /// Removes every injected failure.
    pub fn clear_failures(&self) {
        self.failures.write().clear();
    }

    /// Returns `(table, partition)` for every query issued, one entry per page.
    #[must_use]
    pub fn queries(&self) -> Vec<(String, String)> {
        self.queries.lock().clone()
    }

    /// Returns the number of `get_item` calls.
    #[must_use]
    pub fn get_count(&self) -> usize {
        *self.gets.lock()
    }

    fn check(&self, table: &str, partition: Option<&str>) -> Result<(), StoreError> {
        let failures = self.failures.read();
        let reason = failures.get(&(table.to_string(), None)).or_else(|| {
            partition.and_then(|p| failures.get(&(table.to_string(), Some(p.to_string()))))
        });
        match reason {
            Some(reason) => Err(StoreError::read(table, reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get_item(
        &self,
        table: &str,
        key: &AttributeMap,
    ) -> Result<Option<AttributeMap>, StoreError> {
        *self.gets.lock() += 1;
        self.check(table, None)?;
        Ok(self.tables.get(table).and_then(|entries| {
            entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, item)| item.clone())
        }))
    }

    async fn query(&self, table: &str, request: QueryRequest) -> Result<Page, StoreError> {
        self.queries
            .lock()
            .push((table.to_string(), request.partition_value.clone()));
        self.check(table, Some(&request.partition_value))?;

        let offset = request
            .exclusive_start
            .as_ref()
            .and_then(|cursor| cursor.get(OFFSET))
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        let limit = request.limit.or(self.page_size).unwrap_or(usize::MAX);

        let items: Vec<AttributeMap> = self.tables.get(table).map_or_else(Vec::new, |entries| {
            entries
                .iter()
                .map(|(_, item)| item)
                .filter(|item| {
                    key_attribute(item, &request.partition_attribute).ok().as_deref()
                        == Some(request.partition_value.as_str())
                })
                .skip(offset)
                .take(limit)
                .cloned()
                .collect()
        });

        if items.len() == limit {
            let mut cursor = AttributeMap::new();
            cursor.insert(OFFSET.to_string(), Value::from(offset + items.len()));
            Ok(Page::with_cursor(items, cursor))
        } else {
            Ok(Page::last(items))
        }
    }
}

/// One call recorded by [`InMemoryBlobStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobOperation {
    /// A put of `bucket/key`.
    Put {
        /// Bucket.
        bucket: String,
        /// Object key.
        key: String,
    },
    /// A delete of `bucket/key`.
    Delete {
        /// Bucket.
        bucket: String,
        /// Object key.
        key: String,
    },
}

/// A blob store holding objects in memory and recording every call.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    objects: DashMap<(String, String), PutObject>,
    operations: Mutex<Vec<BlobOperation>>,
    failures: RwLock<HashMap<String, String>>,
}

impl InMemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object without recording an operation.
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<String>) {
        let body = body.into();
        self.objects.insert(
            (bucket.to_string(), key.to_string()),
            PutObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: String::new(),
                content_md5: String::new(),
                body,
            },
        );
    }

    /// Makes every put or delete of an object key fail.
    pub fn fail_key(&self, key: &str, reason: impl Into<String>) {
        self.failures.write().insert(key.to_string(), reason.into());
    }

    /// Returns the stored object at `bucket/key`.
    #[must_use]
    pub fn object(&self, bucket: &str, key: &str) -> Option<PutObject> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Returns the body stored at `bucket/key`.
    #[must_use]
    pub fn body(&self, bucket: &str, key: &str) -> Option<String> {
        self.object(bucket, key).map(|object| object.body)
    }

    /// Returns true if an object exists at `bucket/key`.
    #[must_use]
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if no object is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Returns every recorded operation, failed ones included.
    #[must_use]
    pub fn operations(&self) -> Vec<BlobOperation> {
        self.operations.lock().clone()
    }

    /// Returns the number of put calls.
    #[must_use]
    pub fn put_count(&self) -> usize {
        self.operations
            .lock()
            .iter()
            .filter(|op| matches!(op, BlobOperation::Put { .. }))
            .count()
    }

    /// Returns the number of delete calls.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.operations
            .lock()
            .iter()
            .filter(|op| matches!(op, BlobOperation::Delete { .. }))
            .count()
    }

    fn check(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        match self.failures.read().get(key) {
            Some(reason) => Err(StoreError::write(bucket, key, reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put_object(&self, request: PutObject) -> Result<(), StoreError> {
        self.operations.lock().push(BlobOperation::Put {
            bucket: request.bucket.clone(),
            key: request.key.clone(),
        });
        self.check(&request.bucket, &request.key)?;
        self.objects
            .insert((request.bucket.clone(), request.key.clone()), request);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.operations.lock().push(BlobOperation::Delete {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        self.check(bucket, key)?;
        self.objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
