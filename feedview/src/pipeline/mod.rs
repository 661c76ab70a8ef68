//! Change batch processing.
//!
//! [`ChangeEventDispatcher`] is the entry point: it classifies a batch,
//! fans out one branch per affected view or feed, and reports the batch
//! outcome.

mod dispatcher;

pub use dispatcher::{ChangeEventDispatcher, SourceTable};
