//! Filesystem crawler.
//!
//! A crawl walks its roots one after another on a background thread, each
//! with the `ignore` crate's parallel walker, and hands the discovered paths
//! to the caller as a lazy [`CrawlStream`]. Every walker thread gathers
//! entries in its own buffer and sends them as one batch, so workers never
//! contend on a shared sink while listing directories.
//!
//! Unreadable entries are skipped and counted; a root that cannot be opened
//! is recorded in the [`CrawlReport`] and the remaining roots are still
//! walked. Symlinks are recorded but only descended when
//! [`CrawlOptions::follow_symlinks`] is set, guarded by a per-root visited
//! set and a hop limit.

pub mod prune;
pub mod visited;
mod walker;

pub use prune::PruneRules;
pub use visited::{DirKey, VisitedSet};

use crate::error::{Error, Result};
use crate::index::types::IndexedPath;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;
use walker::WalkContext;

/// Batches buffered between the walkers and the consumer
const CHANNEL_CAPACITY: usize = 64;

/// Crawl policy
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Walker threads; 0 picks a count from the available CPUs
    pub threads: usize,
    /// Descend into symlinked directories
    pub follow_symlinks: bool,
    /// Maximum number of symlink hops on any path from a root
    pub max_link_depth: u32,
    /// Directory base names that are recorded but not descended
    pub prune_names: Vec<String>,
    /// Absolute path globs that are recorded but not descended
    pub prune_paths: Vec<String>,
    /// Set by the caller to abort the crawl
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            follow_symlinks: false,
            max_link_depth: 8,
            prune_names: Vec::new(),
            prune_paths: Vec::new(),
            cancel: None,
        }
    }
}

/// Outcome of a finished crawl
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Paths emitted, roots included
    pub entries: usize,
    /// Directories listed
    pub directories: usize,
    /// Entries skipped because they could not be read
    pub entry_errors: usize,
    /// Directories not descended because of prune rules
    pub pruned: usize,
    pub links_followed: usize,
    /// Symlinks not descended (already visited or too deep)
    pub links_skipped: usize,
    /// Roots that could not be opened, as [`Error::Crawl`]
    pub root_errors: Vec<Error>,
    /// Absolute roots that were walked
    pub roots: Vec<PathBuf>,
    /// The cancel flag was raised during the crawl
    pub cancelled: bool,
}

impl CrawlReport {
    /// Total number of skipped roots and entries
    pub fn error_count(&self) -> usize {
        self.entry_errors + self.root_errors.len()
    }
}

/// Walks roots into a stream of absolute paths
#[derive(Debug, Clone)]
pub struct Crawler {
    options: CrawlOptions,
    prune: PruneRules,
}

impl Crawler {
    /// Validate the options; fails only on malformed prune globs
    pub fn new(options: CrawlOptions) -> Result<Self> {
        let prune = PruneRules::new(&options.prune_names, &options.prune_paths)?;
        Ok(Self { options, prune })
    }

    /// Start crawling `roots` in the background.
    ///
    /// The returned stream yields every path once; it is finite and cannot
    /// be restarted.
    pub fn crawl<P: AsRef<Path>>(&self, roots: &[P]) -> CrawlStream {
        let roots: Vec<PathBuf> = roots.iter().map(|r| r.as_ref().to_path_buf()).collect();
        let (tx, rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
        let ctx = WalkContext::new(self.options.clone(), self.prune.clone(), tx);

        let handle = std::thread::spawn(move || {
            ctx.walk_roots(&roots);
            ctx.into_report()
        });

        CrawlStream {
            rx: Some(rx),
            batch: Vec::new().into_iter(),
            handle: Some(handle),
        }
    }
}

/// Lazy sequence of crawled paths
pub struct CrawlStream {
    rx: Option<Receiver<Vec<IndexedPath>>>,
    batch: std::vec::IntoIter<IndexedPath>,
    handle: Option<JoinHandle<CrawlReport>>,
}

impl CrawlStream {
    /// Next batch of paths as produced by one worker
    pub fn next_batch(&mut self) -> Option<Vec<IndexedPath>> {
        let rest: Vec<IndexedPath> = self.batch.by_ref().collect();
        if !rest.is_empty() {
            return Some(rest);
        }
        let rx = self.rx.as_ref()?;
        match rx.recv() {
            Ok(batch) => Some(batch),
            Err(_) => {
                self.rx = None;
                None
            }
        }
    }

    /// Stop consuming and wait for the walkers. Paths not yet pulled are
    /// dropped; the walkers stop at their next send.
    pub fn finish(mut self) -> CrawlReport {
        self.join()
    }

    fn join(&mut self) -> CrawlReport {
        self.rx = None;
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(report)) => report,
            Some(Err(panic)) => std::panic::resume_unwind(panic),
            None => CrawlReport::default(),
        }
    }
}

impl Iterator for CrawlStream {
    type Item = IndexedPath;

    fn next(&mut self) -> Option<IndexedPath> {
        loop {
            if let Some(path) = self.batch.next() {
                return Some(path);
            }
            let batch = self.next_batch()?;
            self.batch = batch.into_iter();
        }
    }
}

impl Drop for CrawlStream {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.join();
        }
    }
}
