//! Concurrent fan-out with full error collection.
//!
//! A [`FanOutAggregator`] runs N independent branches, waits for all of them,
//! and reports one outcome for the batch. There is no fail-fast and no
//! cancellation: a failing branch never stops its siblings, and the
//! resulting [`BatchFailure`] lists every branch that failed.

mod aggregator;
mod outcome;

pub use aggregator::{BatchContext, FanOutAggregator};
pub use outcome::{
    BatchFailure, BatchReport, BranchFailure, InvocationError, InvocationResult, InvocationStatus,
};
