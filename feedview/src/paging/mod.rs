//! Cursor-following partition scans.

mod reader;

pub use reader::{Paged, PagedReader};
