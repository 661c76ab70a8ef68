//! Key-value store interface.

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::records::AttributeMap;

/// A partition query, optionally resuming after a continuation cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Name of the partition key attribute.
    pub partition_attribute: String,
    /// Partition key value to match.
    pub partition_value: String,
    /// Cursor returned by the previous page; the query starts after it.
    pub exclusive_start: Option<AttributeMap>,
    /// Page size hint.
    pub limit: Option<usize>,
}

impl QueryRequest {
    /// Creates a query for the first page of a partition.
    #[must_use]
    pub fn new(partition_attribute: impl Into<String>, partition_value: impl Into<String>) -> Self {
        Self {
            partition_attribute: partition_attribute.into(),
            partition_value: partition_value.into(),
            exclusive_start: None,
            limit: None,
        }
    }

    /// Resumes after the given cursor.
    #[must_use]
    pub fn with_exclusive_start(mut self, cursor: Option<AttributeMap>) -> Self {
        self.exclusive_start = cursor;
        self
    }

    /// Sets the page size hint.
    #[must_use]
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Items in store order.
    pub items: Vec<AttributeMap>,
    /// Present when more results may follow.
    pub cursor: Option<AttributeMap>,
}

impl Page {
    /// Creates a final page.
    #[must_use]
    pub fn last(items: Vec<AttributeMap>) -> Self {
        Self { items, cursor: None }
    }

    /// Creates a page that is followed by more results.
    #[must_use]
    pub fn with_cursor(items: Vec<AttributeMap>, cursor: AttributeMap) -> Self {
        Self {
            items,
            cursor: Some(cursor),
        }
    }
}

/// Read access to a key-value store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetches one item by its full key. `Ok(None)` when it does not exist.
    async fn get_item(
        &self,
        table: &str,
        key: &AttributeMap,
    ) -> Result<Option<AttributeMap>, StoreError>;

    /// Fetches one page of a partition.
    async fn query(&self, table: &str, request: QueryRequest) -> Result<Page, StoreError>;
}
