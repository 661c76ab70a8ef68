//! Fan-out execution and per-batch aggregation state.

use futures::StreamExt;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::outcome::{BatchFailure, BatchReport, BranchFailure};
use crate::errors::PipelineError;
use crate::events::{EventSink, NoOpEventSink};
use crate::observability::{BatchSpanAttributes, SpanTimer};
use crate::utils::generate_batch_id;

/// Aggregation state of one aggregator run.
///
/// Owned by exactly one [`FanOutAggregator::run`] call; branches never see it.
#[derive(Debug)]
pub struct BatchContext {
    batch_id: Uuid,
    label: String,
    total: usize,
    completed: usize,
    failures: Vec<BranchFailure>,
    timer: SpanTimer,
}

impl BatchContext {
    /// Starts a batch of `total` branches.
    #[must_use]
    pub fn new(label: impl Into<String>, total: usize) -> Self {
        let label = label.into();
        Self {
            batch_id: generate_batch_id(),
            timer: SpanTimer::start(label.clone()),
            label,
            total,
            completed: 0,
            failures: Vec::new(),
        }
    }

    /// Returns the batch id.
    #[must_use]
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Returns the batch label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the number of branches in the batch.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns the number of successful branches so far.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Returns the failures recorded so far.
    #[must_use]
    pub fn failures(&self) -> &[BranchFailure] {
        &self.failures
    }

    /// Returns true once every branch has reported.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.completed + self.failures.len() >= self.total
    }

    /// Records one branch outcome.
    pub fn record(&mut self, branch: String, outcome: Result<(), PipelineError>) {
        match outcome {
            Ok(()) => self.completed += 1,
            Err(error) => self.failures.push(BranchFailure::new(branch, error)),
        }
    }

    /// Returns span attributes describing the current state.
    #[must_use]
    pub fn span_attributes(&self) -> BatchSpanAttributes {
        BatchSpanAttributes::new()
            .with_batch_id(self.batch_id.to_string())
            .with_label(self.label.clone())
            .with_counts(self.total, self.completed, self.failures.len())
            .with_duration_ms(self.timer.elapsed_ms())
    }

    /// Closes the batch: success iff no branch failed.
    pub fn finish(self) -> Result<BatchReport, BatchFailure> {
        if self.failures.is_empty() {
            Ok(BatchReport {
                batch_id: self.batch_id,
                label: self.label,
                completed: self.completed,
                duration_ms: self.timer.finish(),
            })
        } else {
            Err(BatchFailure {
                batch_id: self.batch_id,
                label: self.label,
                total: self.total,
                failures: self.failures,
            })
        }
    }
}

/// Runs independent branches concurrently and aggregates their outcomes.
///
/// Branches run on the caller's task. A panic in a branch is not caught.
#[derive(Clone)]
pub struct FanOutAggregator {
    max_concurrency: Option<usize>,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for FanOutAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutAggregator")
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

impl Default for FanOutAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl FanOutAggregator {
    /// Creates an aggregator with unbounded concurrency.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_concurrency: None,
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Caps the number of branches in flight. `None` is unbounded.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: Option<usize>) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Sets the sink receiving `batch.*` and `branch.failed` events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Runs every branch to completion.
    ///
    /// Succeeds iff every branch succeeded; an empty batch succeeds at once.
    /// On failure the error lists every failed branch.
    pub async fn run<I, F>(&self, label: &str, branches: I) -> Result<BatchReport, BatchFailure>
    where
        I: IntoIterator<Item = (String, F)>,
        F: Future<Output = Result<(), PipelineError>>,
    {
        let branches: Vec<(String, F)> = branches.into_iter().collect();
        let mut ctx = BatchContext::new(label, branches.len());

        info!(batch_id = %ctx.batch_id(), label, total = ctx.total(), "Fan-out started");
        self.sink.emit(
            "batch.started",
            Some(json!({"batchId": ctx.batch_id(), "label": label, "total": ctx.total()})),
        );

        let limit = self.max_concurrency.unwrap_or(usize::MAX).max(1);
        let mut outcomes = std::pin::pin!(futures::stream::iter(
            branches
                .into_iter()
                .map(|(branch, fut)| async move { (branch, fut.await) })
        )
        .buffer_unordered(limit));

        while let Some((branch, outcome)) = outcomes.next().await {
            if let Err(ref error) = outcome {
                warn!(
                    batch_id = %ctx.batch_id(),
                    label,
                    branch = %branch,
                    kind = error.kind(),
                    error = %error,
                    "Branch failed"
                );
                self.sink.emit(
                    "branch.failed",
                    Some(json!({
                        "batchId": ctx.batch_id(),
                        "label": label,
                        "branch": branch,
                        "kind": error.kind(),
                        "error": error.to_string(),
                    })),
                );
            }
            ctx.record(branch, outcome);
        }

        let attributes = ctx.span_attributes();
        let result = ctx.finish();
        match &result {
            Ok(report) => {
                info!(
                    batch_id = %report.batch_id,
                    label,
                    completed = report.completed,
                    duration_ms = report.duration_ms,
                    "Fan-out completed"
                );
                self.sink.emit("batch.completed", Some(json!(attributes.to_otel_attributes())));
            }
            Err(failure) => {
                warn!(
                    batch_id = %failure.batch_id,
                    label,
                    failed = failure.failures.len(),
                    total = failure.total,
                    "Fan-out failed"
                );
                self.sink.emit("batch.failed", Some(json!(attributes.to_otel_attributes())));
            }
        }
        result
    }
}
