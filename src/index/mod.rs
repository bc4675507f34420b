//! The path database: on-disk format, atomic replacement, and the
//! crawl-to-commit update pipeline.

pub mod build;
pub mod reader;
pub mod stats;
pub mod store;
pub mod types;
pub mod writer;

pub use build::{IndexSummary, Indexer};
pub use reader::{EntryRef, PathCursor, StoreReader};
pub use stats::{get_stats, DbStats};
pub use store::PathStore;
pub use types::*;
pub use writer::{Committed, StoreWriter};
