//! Lifecycle event sinks.
//!
//! The dispatcher reports batch, branch and artifact lifecycle through an
//! [`EventSink`]. Sinks never fail the pipeline; emission is fire and forget.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
