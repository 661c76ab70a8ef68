//! Paginated partition reader.

use futures::{Stream, TryStreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

use crate::errors::{PipelineError, StoreError};
use crate::records::{AttributeMap, Record};
use crate::store::{KeyValueStore, QueryRequest};

/// A scanned record plus whether it is the final record of the whole scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Paged<T> {
    /// The record.
    pub item: T,
    /// True only for the final record of the final page.
    pub last: bool,
}

/// Reads every record of a partition by following the store's cursor.
///
/// Each call starts a fresh scan. Records are decoded lazily as the stream is
/// polled; a read or decode failure ends the stream with that error, and the
/// records delivered before it must not be treated as a complete result.
#[derive(Clone)]
pub struct PagedReader {
    store: Arc<dyn KeyValueStore>,
    table: String,
    partition_attribute: String,
    page_size: Option<usize>,
    max_pages: usize,
}

impl std::fmt::Debug for PagedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedReader")
            .field("table", &self.table)
            .field("partition_attribute", &self.partition_attribute)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}

struct Scan {
    partition: String,
    buffer: VecDeque<AttributeMap>,
    cursor: Option<AttributeMap>,
    exhausted: bool,
    pages: usize,
}

impl Scan {
    fn new(partition: &str) -> Self {
        Self {
            partition: partition.to_string(),
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
            pages: 0,
        }
    }

    /// The front item can be released once its `last` flag is known: another
    /// item follows it in the buffer, or no page follows at all.
    fn ready(&self) -> bool {
        self.buffer.len() > 1 || self.exhausted
    }
}

impl PagedReader {
    /// Creates a reader over one table partitioned by `partition_attribute`.
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        table: impl Into<String>,
        partition_attribute: impl Into<String>,
    ) -> Self {
        Self {
            store,
            table: table.into(),
            partition_attribute: partition_attribute.into(),
            page_size: None,
            max_pages: 10_000,
        }
    }

    /// Sets the page size hint.
    #[must_use]
    pub fn with_page_size(mut self, page_size: Option<usize>) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the maximum number of pages read per scan.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Returns the table this reader scans.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Streams every record of a partition, tagging the final one.
    pub fn stream<'a, R>(
        &'a self,
        partition: &str,
    ) -> impl Stream<Item = Result<Paged<R>, PipelineError>> + 'a
    where
        R: Record + 'a,
    {
        futures::stream::try_unfold(Scan::new(partition), move |scan| {
            self.next_record::<R>(scan)
        })
    }

    /// Calls `f` with every record of a partition and whether it is the last.
    ///
    /// Returns the number of records delivered.
    pub async fn for_each<R, F>(&self, partition: &str, mut f: F) -> Result<usize, PipelineError>
    where
        R: Record,
        F: FnMut(R, bool),
    {
        let mut stream = std::pin::pin!(self.stream::<R>(partition));
        let mut delivered = 0;
        while let Some(paged) = stream.try_next().await? {
            f(paged.item, paged.last);
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Reads a whole partition into memory. Never returns a partial result.
    pub async fn fetch_all<R: Record>(&self, partition: &str) -> Result<Vec<R>, PipelineError> {
        self.stream::<R>(partition)
            .map_ok(|paged| paged.item)
            .try_collect()
            .await
    }

    async fn next_record<R: Record>(
        &self,
        mut scan: Scan,
    ) -> Result<Option<(Paged<R>, Scan)>, PipelineError> {
        loop {
            if scan.ready() {
                let Some(attributes) = scan.buffer.pop_front() else {
                    return Ok(None);
                };
                let last = scan.exhausted && scan.buffer.is_empty();
                let item = R::from_attributes(attributes)?;
                return Ok(Some((Paged { item, last }, scan)));
            }
            self.read_page(&mut scan).await?;
        }
    }

    async fn read_page(&self, scan: &mut Scan) -> Result<(), StoreError> {
        if scan.pages >= self.max_pages {
            return Err(StoreError::PaginationLimit {
                table: self.table.clone(),
                partition: scan.partition.clone(),
                max_pages: self.max_pages,
            });
        }

        let request = QueryRequest::new(&self.partition_attribute, &scan.partition)
            .with_exclusive_start(scan.cursor.take())
            .with_limit(self.page_size);
        let page = self.store.query(&self.table, request).await?;
        scan.pages += 1;

        debug!(
            table = %self.table,
            partition = %scan.partition,
            page = scan.pages,
            items = page.items.len(),
            more = page.cursor.is_some(),
            "Read partition page"
        );

        scan.exhausted = page.cursor.is_none();
        scan.cursor = page.cursor;
        scan.buffer.extend(page.items);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::EpisodeRecord;
    use crate::store::{MockKeyValueStore, Page};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn episode(id: usize) -> AttributeMap {
        json!({"feedId": "f1", "episodeId": format!("e{id}"), "title": format!("Episode {id}")})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn cursor(n: usize) -> AttributeMap {
        json!({"feedId": "f1", "episodeId": format!("e{n}")})
            .as_object()
            .cloned()
            .unwrap()
    }

    fn paged_store(pages: Vec<Page>) -> Arc<dyn KeyValueStore> {
        let mut pages = pages.into_iter();
        let mut store = MockKeyValueStore::new();
        store
            .expect_query()
            .returning(move |_, _| Ok(pages.next().unwrap_or_default()));
        Arc::new(store)
    }

    fn reader(store: Arc<dyn KeyValueStore>) -> PagedReader {
        PagedReader::new(store, "podcast-episodes", "feedId")
    }

    #[tokio::test]
    async fn test_last_flag_once_across_pages() {
        let store = paged_store(vec![
            Page::with_cursor(vec![episode(1), episode(2)], cursor(2)),
            Page::with_cursor(vec![episode(3), episode(4)], cursor(4)),
            Page::last(vec![episode(5)]),
        ]);
        let reader = reader(store);

        let mut seen = Vec::new();
        let delivered = reader
            .for_each("f1", |episode: EpisodeRecord, last| {
                seen.push((episode.key.episode_id, last));
            })
            .await
            .unwrap();

        assert_eq!(delivered, 5);
        assert_eq!(
            seen,
            vec![
                ("e1".to_string(), false),
                ("e2".to_string(), false),
                ("e3".to_string(), false),
                ("e4".to_string(), false),
                ("e5".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_trailing_empty_page_still_flags_last() {
        let store = paged_store(vec![
            Page::with_cursor(vec![episode(1), episode(2)], cursor(2)),
            Page::last(Vec::new()),
        ]);
        let reader = reader(store);

        let items: Vec<Paged<EpisodeRecord>> = reader.stream("f1").try_collect().await.unwrap();
        let flags: Vec<bool> = items.iter().map(|p| p.last).collect();
        assert_eq!(flags, vec![false, true]);
    }

    #[tokio::test]
    async fn test_empty_partition() {
        let reader = reader(paged_store(vec![Page::last(Vec::new())]));

        let mut calls = 0;
        let delivered = reader
            .for_each("f1", |_: EpisodeRecord, _| calls += 1)
            .await
            .unwrap();
        assert_eq!(delivered, 0);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn test_cursor_passed_as_exclusive_start() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_query()
            .withf(|table, request| {
                table.contains("podcast-episodes")
                    && request.partition_attribute == "feedId"
                    && request.partition_value == "f1"
                    && request.exclusive_start.is_none()
                    && request.limit == Some(2)
            })
            .times(1)
            .returning(|_, _| Ok(Page::with_cursor(vec![episode(1), episode(2)], cursor(2))));
        store
            .expect_query()
            .withf(|_, request| request.exclusive_start == Some(cursor(2)))
            .times(1)
            .returning(|_, _| Ok(Page::last(vec![episode(3)])));

        let reader = reader(Arc::new(store)).with_page_size(Some(2));
        let episodes: Vec<EpisodeRecord> = reader.fetch_all("f1").await.unwrap();
        assert_eq!(episodes.len(), 3);
    }

    #[tokio::test]
    async fn test_read_failure_aborts_scan() {
        let mut calls = 0;
        let mut store = MockKeyValueStore::new();
        store.expect_query().times(2).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Ok(Page::with_cursor(vec![episode(1), episode(2)], cursor(2)))
            } else {
                Err(StoreError::read("podcast-episodes", "throttled"))
            }
        });
        let reader = reader(Arc::new(store));

        let mut delivered = Vec::new();
        let err = reader
            .for_each("f1", |episode: EpisodeRecord, last| {
                delivered.push((episode.key.episode_id, last));
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Store(StoreError::Read { .. })));
        // The first item was released before the failing look-ahead read.
        assert_eq!(delivered, vec![("e1".to_string(), false)]);
    }

    #[tokio::test]
    async fn test_fetch_all_returns_no_partial_result() {
        let mut calls = 0;
        let mut store = MockKeyValueStore::new();
        store.expect_query().returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Ok(Page::with_cursor(vec![episode(1)], cursor(1)))
            } else {
                Err(StoreError::read("podcast-episodes", "timeout"))
            }
        });

        let result: Result<Vec<EpisodeRecord>, _> = reader(Arc::new(store)).fetch_all("f1").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_pagination_limit() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_query()
            .times(3)
            .returning(|_, _| Ok(Page::with_cursor(vec![episode(1)], cursor(1))));

        let reader = reader(Arc::new(store)).with_max_pages(3);
        let err = reader.fetch_all::<EpisodeRecord>("f1").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Store(StoreError::PaginationLimit { max_pages: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_undecodable_record_fails_scan() {
        let bad = json!({"feedId": "f1"}).as_object().cloned().unwrap();
        let reader = reader(paged_store(vec![Page::last(vec![episode(1), bad])]));

        let err = reader.fetch_all::<EpisodeRecord>("f1").await.unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_each_call_restarts_scan() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_query()
            .times(2)
            .returning(|_, _| Ok(Page::last(vec![episode(1), episode(2)])));
        let reader = reader(Arc::new(store));

        assert_eq!(reader.fetch_all::<EpisodeRecord>("f1").await.unwrap().len(), 2);
        assert_eq!(reader.fetch_all::<EpisodeRecord>("f1").await.unwrap().len(), 2);
    }
}
