use crate::crawl::{CrawlOptions, CrawlReport, Crawler};
use crate::error::{Error, Result};
use crate::index::store::PathStore;
use crate::index::types::{Generation, IndexedPath, UpdatePolicy};
use crate::index::writer::{Committed, StoreWriter};
use crate::utils::progress::ProgressBar;
use rayon::prelude::*;
use std::path::{is_separator, Path};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation is polled once per this many written entries
const CANCEL_CHECK_INTERVAL: u64 = 16 * 1024;

/// Outcome of one update
#[derive(Debug)]
pub struct IndexSummary {
    /// Paths found by this crawl and committed
    pub indexed: u64,
    /// Entries in the committed database, including merged ones
    pub total_entries: u64,
    /// Generation that became visible; 0 if nothing was committed
    pub generation: Generation,
    pub report: CrawlReport,
    pub elapsed: Duration,
}

/// Drives crawls into atomic database updates
#[derive(Debug, Clone)]
pub struct Indexer {
    crawler: Crawler,
    policy: UpdatePolicy,
    cancel: Option<Arc<AtomicBool>>,
}

impl Indexer {
    pub fn new(options: CrawlOptions, policy: UpdatePolicy) -> Result<Self> {
        let cancel = options.cancel.clone();
        Ok(Self {
            crawler: Crawler::new(options)?,
            policy,
            cancel,
        })
    }

    /// Crawl `roots` and commit the result to `db_path` as one generation.
    ///
    /// An empty root list indexes nothing and leaves the database untouched.
    /// Roots that cannot be opened are reported in the summary; the update
    /// still commits what the other roots produced.
    pub fn update<P: AsRef<Path>>(&self, db_path: &Path, roots: &[P]) -> Result<IndexSummary> {
        self.update_with_progress(db_path, roots, None)
    }

    /// [`Indexer::update`] with a spinner showing the number of paths found
    pub fn update_with_progress<P: AsRef<Path>>(
        &self,
        db_path: &Path,
        roots: &[P],
        progress: Option<&ProgressBar>,
    ) -> Result<IndexSummary> {
        let start = Instant::now();

        if roots.is_empty() {
            tracing::debug!(db = %db_path.display(), "no roots given, database untouched");
            return Ok(IndexSummary {
                indexed: 0,
                total_entries: 0,
                generation: 0,
                report: CrawlReport::default(),
                elapsed: start.elapsed(),
            });
        }

        let mut stream = self.crawler.crawl(roots);
        let mut paths: Vec<String> = Vec::new();
        while let Some(batch) = stream.next_batch() {
            paths.extend(batch.into_iter().map(|p| p.path));
            if let Some(pb) = progress {
                pb.set_message(format!("Crawling... {} paths", paths.len()));
            }
        }
        let report = stream.finish();

        if report.cancelled {
            tracing::info!(db = %db_path.display(), "update cancelled before commit");
            return Err(Error::Cancelled);
        }
        if !report.root_errors.is_empty() && report.roots.is_empty() {
            tracing::warn!(
                db = %db_path.display(),
                errors = report.root_errors.len(),
                "no root could be crawled"
            );
        }

        if let Some(pb) = progress {
            pb.set_message(format!("Writing {} paths...", paths.len()));
        }
        paths.par_sort_unstable();
        paths.dedup();

        let store = PathStore::new(db_path);
        let scanned: Vec<String> = report
            .roots
            .iter()
            .map(|r| r.to_string_lossy().into_owned())
            .collect();

        let committed = match self.policy {
            UpdatePolicy::Replace => store.replace_with(scanned, |writer| {
                for path in &paths {
                    self.check_cancel(writer)?;
                    writer.push(path)?;
                }
                Ok(())
            })?,
            UpdatePolicy::Merge => self.merge(&store, scanned, &paths)?,
        };

        let summary = IndexSummary {
            indexed: paths.len() as u64,
            total_entries: committed.entries,
            generation: committed.generation,
            report,
            elapsed: start.elapsed(),
        };

        tracing::info!(
            db = %db_path.display(),
            indexed = summary.indexed,
            total = summary.total_entries,
            generation = summary.generation,
            errors = summary.report.error_count(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "index updated"
        );
        Ok(summary)
    }

    /// Replace the scanned subtrees and keep every other stored entry
    fn merge(
        &self,
        store: &PathStore,
        scanned: Vec<String>,
        fresh: &[String],
    ) -> Result<Committed> {
        // Load the previous generation fully so its mapping is gone before
        // the new file is renamed over it
        let (kept, mut roots) = match store.open() {
            Ok(reader) => {
                let roots = reader.header().roots.clone();
                let kept: Vec<IndexedPath> = reader
                    .read_entries()?
                    .into_iter()
                    .filter(|e| !scanned.iter().any(|root| is_within(&e.path, root)))
                    .collect();
                (kept, roots)
            }
            Err(e) if e.is_not_found() => (Vec::new(), Vec::new()),
            Err(e) => return Err(e),
        };

        roots.extend(scanned);
        roots.sort();
        roots.dedup();

        tracing::debug!(kept = kept.len(), fresh = fresh.len(), "merging with previous generation");

        store.replace_with(roots, |writer| {
            let mut kept = kept.into_iter().peekable();
            for path in fresh {
                while let Some(old) = kept.next_if(|old| old.path < *path) {
                    self.check_cancel(writer)?;
                    writer.push_entry(&old.path, old.generation)?;
                }
                // A path in both lists is re-observed; the fresh entry wins
                kept.next_if(|old| old.path == *path);
                self.check_cancel(writer)?;
                writer.push(path)?;
            }
            for old in kept {
                self.check_cancel(writer)?;
                writer.push_entry(&old.path, old.generation)?;
            }
            Ok(())
        })
    }

    fn check_cancel(&self, writer: &StoreWriter) -> Result<()> {
        if writer.len() % CANCEL_CHECK_INTERVAL == 0
            && self
                .cancel
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// True if `path` is `root` or lies below it
fn is_within(path: &str, root: &str) -> bool {
    match path.strip_prefix(root) {
        Some("") => true,
        Some(rest) => root.ends_with(is_separator) || rest.starts_with(is_separator),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/nested")).unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a/one.txt"), b"1").unwrap();
        fs::write(dir.path().join("a/nested/two.txt"), b"2").unwrap();
        fs::write(dir.path().join("b/three.md"), b"3").unwrap();
        dir
    }

    fn indexer(policy: UpdatePolicy) -> Indexer {
        Indexer::new(CrawlOptions::default(), policy).unwrap()
    }

    #[test]
    fn test_update_counts_every_path() {
        let fs_root = tree();
        let db_dir = tempfile::tempdir().unwrap();
        let db = db_dir.path().join("paths.db");

        let summary = indexer(UpdatePolicy::Replace).update(&db, &[fs_root.path()]).unwrap();
        // root, a, a/nested, a/one.txt, a/nested/two.txt, b, b/three.md
        assert_eq!(summary.indexed, 7);
        assert_eq!(summary.total_entries, 7);
        assert_eq!(summary.generation, 1);
        assert_eq!(PathStore::new(&db).stats().unwrap().entry_count, 7);
    }

    #[test]
    fn test_empty_roots_leave_database_untouched() {
        let db_dir = tempfile::tempdir().unwrap();
        let db = db_dir.path().join("paths.db");
        let roots: [&Path; 0] = [];

        let summary = indexer(UpdatePolicy::Replace).update(&db, &roots).unwrap();
        assert_eq!(summary.indexed, 0);
        assert!(!db.exists());
    }

    #[test]
    fn test_merge_keeps_unscanned_subtrees() {
        let fs_root = tree();
        let db_dir = tempfile::tempdir().unwrap();
        let db = db_dir.path().join("paths.db");
        let store = PathStore::new(&db);

        indexer(UpdatePolicy::Replace).update(&db, &[fs_root.path()]).unwrap();
        fs::remove_file(fs_root.path().join("a/one.txt")).unwrap();
        fs::write(fs_root.path().join("a/new.txt"), b"n").unwrap();
        fs::write(fs_root.path().join("b/four.md"), b"4").unwrap();

        let summary = indexer(UpdatePolicy::Merge)
            .update(&db, &[fs_root.path().join("a")])
            .unwrap();
        // a, a/nested, a/nested/two.txt, a/new.txt
        assert_eq!(summary.indexed, 4);

        let paths = store.read_all().unwrap();
        let has = |rel: &str| {
            let full = fs_root.path().join(rel).to_string_lossy().into_owned();
            paths.contains(&full)
        };
        assert!(has("a/new.txt"));
        assert!(!has("a/one.txt"));
        // b was not rescanned, so four.md is not known yet
        assert!(has("b/three.md"));
        assert!(!has("b/four.md"));
        assert_eq!(paths.len(), 7);

        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn test_merge_keeps_generation_of_old_entries() {
        let fs_root = tree();
        let db_dir = tempfile::tempdir().unwrap();
        let db = db_dir.path().join("paths.db");

        indexer(UpdatePolicy::Replace).update(&db, &[fs_root.path()]).unwrap();
        let summary = indexer(UpdatePolicy::Merge)
            .update(&db, &[fs_root.path().join("b")])
            .unwrap();
        assert_eq!(summary.generation, 2);

        let entries = PathStore::new(&db).open().unwrap().read_entries().unwrap();
        for entry in entries {
            let in_b = is_within(&entry.path, &fs_root.path().join("b").to_string_lossy());
            assert_eq!(entry.generation, if in_b { 2 } else { 1 }, "{}", entry.path);
        }
    }

    #[test]
    fn test_cancelled_update_keeps_previous_database() {
        let fs_root = tree();
        let db_dir = tempfile::tempdir().unwrap();
        let db = db_dir.path().join("paths.db");
        indexer(UpdatePolicy::Replace).update(&db, &[fs_root.path()]).unwrap();
        let before = PathStore::new(&db).read_all().unwrap();

        let flag = Arc::new(AtomicBool::new(true));
        let options = CrawlOptions {
            cancel: Some(flag),
            ..Default::default()
        };
        let result = Indexer::new(options, UpdatePolicy::Replace)
            .unwrap()
            .update(&db, &[fs_root.path()]);

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(PathStore::new(&db).read_all().unwrap(), before);
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("/a/b", "/a/b"));
        assert!(is_within("/a/b/c", "/a/b"));
        assert!(is_within("/a/b/c", "/"));
        assert!(!is_within("/a/bc", "/a/b"));
        assert!(!is_within("/a", "/a/b"));
    }
}
