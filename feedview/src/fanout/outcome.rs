//! Batch outcomes and their serializable form.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::utils::iso_timestamp;

/// One failed branch of a fan-out.
#[derive(Debug, Clone)]
pub struct BranchFailure {
    /// Branch label, e.g. a view key or a feed id.
    pub branch: String,
    /// The error the branch returned.
    pub error: PipelineError,
    /// When the failure was recorded (RFC 3339).
    pub occurred_at: String,
}

impl BranchFailure {
    /// Records a failure now.
    #[must_use]
    pub fn new(branch: impl Into<String>, error: PipelineError) -> Self {
        Self {
            branch: branch.into(),
            error,
            occurred_at: iso_timestamp(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("branch".to_string(), serde_json::json!(self.branch));
        map.insert("error".to_string(), serde_json::json!(self.error.to_string()));
        map.insert("kind".to_string(), serde_json::json!(self.error.kind()));
        map.insert("occurredAt".to_string(), serde_json::json!(self.occurred_at));
        map
    }
}

/// A fan-out in which at least one branch failed.
#[derive(Debug, Clone, Error)]
#[error("{} failed: {} of {} branches failed", .label, .failures.len(), .total)]
pub struct BatchFailure {
    /// Id of the aggregator run.
    pub batch_id: Uuid,
    /// Label of the fan-out, e.g. `views` or `feeds`.
    pub label: String,
    /// Number of branches launched.
    pub total: usize,
    /// Every failed branch, in completion order.
    pub failures: Vec<BranchFailure>,
}

impl BatchFailure {
    /// Number of branches that succeeded.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.total.saturating_sub(self.failures.len())
    }

    /// Returns the labels of the failed branches.
    #[must_use]
    pub fn failed_branches(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.branch.as_str()).collect()
    }
}

/// A fan-out in which every branch succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Id of the aggregator run.
    pub batch_id: Uuid,
    /// Label of the fan-out.
    pub label: String,
    /// Number of branches that completed.
    pub completed: usize,
    /// Wall time of the run in milliseconds.
    pub duration_ms: f64,
}

impl BatchReport {
    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("batchId".to_string(), serde_json::json!(self.batch_id.to_string()));
        map.insert("label".to_string(), serde_json::json!(self.label));
        map.insert("completed".to_string(), serde_json::json!(self.completed));
        map.insert("durationMs".to_string(), serde_json::json!(self.duration_ms));
        map
    }
}

/// Overall status of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    /// Every branch succeeded.
    Succeeded,
    /// Classification failed or at least one branch failed.
    Failed,
}

/// One error entry of an [`InvocationResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationError {
    /// Failed branch, or `batch` when the batch failed before fan-out.
    pub branch: String,
    /// Error message.
    pub error: String,
    /// Error family, see [`PipelineError::kind`].
    pub kind: String,
    /// When the failure was recorded.
    pub occurred_at: String,
}

/// Serializable outcome of one invocation, returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    /// Overall status.
    pub status: InvocationStatus,
    /// Id of the top-level aggregator run, absent when classification failed.
    pub batch_id: Option<Uuid>,
    /// Number of top-level branches that succeeded.
    pub completed: usize,
    /// Every top-level failure.
    pub errors: Vec<InvocationError>,
}

impl InvocationResult {
    /// Builds the outbound form of a dispatcher outcome.
    #[must_use]
    pub fn from_outcome(outcome: &Result<BatchReport, PipelineError>) -> Self {
        match outcome {
            Ok(report) => Self {
                status: InvocationStatus::Succeeded,
                batch_id: Some(report.batch_id),
                completed: report.completed,
                errors: Vec::new(),
            },
            Err(PipelineError::Batch(failure)) => Self {
                status: InvocationStatus::Failed,
                batch_id: Some(failure.batch_id),
                completed: failure.completed(),
                errors: failure
                    .failures
                    .iter()
                    .map(|f| InvocationError {
                        branch: f.branch.clone(),
                        error: f.error.to_string(),
                        kind: f.error.kind().to_string(),
                        occurred_at: f.occurred_at.clone(),
                    })
                    .collect(),
            },
            Err(other) => Self {
                status: InvocationStatus::Failed,
                batch_id: None,
                completed: 0,
                errors: vec![InvocationError {
                    branch: "batch".to_string(),
                    error: other.to_string(),
                    kind: other.kind().to_string(),
                    occurred_at: iso_timestamp(),
                }],
            },
        }
    }

    /// Returns true if the invocation succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Succeeded
    }
}
