//! # flocate - locate-style path index
//!
//! flocate crawls directory trees into a single-file database of absolute
//! paths and answers glob queries against it without touching the
//! filesystem again.
//!
//! ## Architecture
//!
//! - [`crawl`] - Parallel directory walker with symlink cycle detection and prune rules
//! - [`index`] - Database format, atomic replacement, and the update pipeline
//! - [`query`] - Glob and regex matching over a stored generation
//! - [`utils`] - Configuration, binary encoding, and progress helpers
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! let db = Path::new("/tmp/paths.db");
//! let indexed = flocate::index_directory(db, &["/usr/share"]).unwrap();
//! println!("indexed {} paths", indexed);
//!
//! for path in flocate::search_files(db, "*.conf", Some(20)).unwrap() {
//!     println!("{}", path);
//! }
//!
//! let (entries, bytes) = flocate::get_stats(db).unwrap();
//! println!("{} entries in {} bytes", entries, bytes);
//! ```
//!
//! ## Database
//!
//! Paths are kept sorted and front-coded, so long shared directory prefixes
//! cost a few bytes per entry. Every update writes a complete new file and
//! renames it into place: readers see either the previous generation or the
//! new one, never a mix. Concurrent updates of one database must be
//! serialized by the caller.

pub mod crawl;
pub mod error;
pub mod index;
pub mod query;
pub mod utils;

pub use crawl::{CrawlOptions, CrawlReport, Crawler};
pub use error::{Error, Result};
pub use index::{get_stats, DbStats, IndexSummary, Indexer, PathStore, UpdatePolicy};
pub use query::{MatchOptions, PathMatcher, SearchOptions};

use std::path::Path;

/// Index `paths` into the database at `db_path`, replacing its contents.
///
/// Returns the number of paths committed. An empty `paths` list indexes
/// nothing and leaves the database as it was.
pub fn index_directory<P: AsRef<Path>>(db_path: &Path, paths: &[P]) -> Result<usize> {
    let indexer = Indexer::new(CrawlOptions::default(), UpdatePolicy::Replace)?;
    let summary = indexer.update(db_path, paths)?;
    Ok(summary.indexed as usize)
}

/// Glob search with default matching; `limit` of `None` or `Some(0)`
/// returns every match
pub fn search_files(db_path: &Path, pattern: &str, limit: Option<usize>) -> Result<Vec<String>> {
    query::search(db_path, pattern, &SearchOptions::with_limit(limit))
}
