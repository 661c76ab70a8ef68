//! Change batches and their classification into dedup sets.
//!
//! A batch arrives in stream-record form. Classification walks every event
//! before any work starts, so one unrecognized or malformed event fails the
//! whole batch, and produces one entry per affected view or feed.

mod dedup;
mod event;

pub use dedup::{FeedSet, ViewAction, ViewChange, ViewChangeSet};
pub use event::{ChangeBatch, ChangeEvent, EventKind, StreamRecord};
