//! Path store: the single-file database behind every index and search.
//!
//! The file is replaced wholesale on every update. Writers build the next
//! generation in a temporary file beside the database and rename it into
//! place once synced, so readers only ever see a complete generation.
//! Concurrent updates of the same database are not coordinated; callers
//! serialize them.

use crate::error::{Error, Result};
use crate::index::reader::StoreReader;
use crate::index::stats::DbStats;
use crate::index::types::*;
use crate::index::writer::{Committed, StoreWriter};
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Handle on a database location
#[derive(Debug, Clone)]
pub struct PathStore {
    path: PathBuf,
}

impl PathStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Open the committed generation for reading
    pub fn open(&self) -> Result<StoreReader> {
        StoreReader::open(&self.path)
    }

    /// All stored paths in storage order
    pub fn read_all(&self) -> Result<Vec<String>> {
        self.open()?.read_all()
    }

    /// Entry count and on-disk size plus header metadata
    pub fn stats(&self) -> Result<DbStats> {
        let reader = self.open()?;
        Ok(DbStats::from_reader(&reader))
    }

    /// Replace the database with `paths`, sorted and deduplicated.
    /// Returns the number of committed entries.
    pub fn write<I, S>(&self, paths: I) -> Result<u64>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        paths.par_sort_unstable();
        paths.dedup();

        let committed = self.replace_with(Vec::new(), |writer| {
            for path in &paths {
                writer.push(path)?;
            }
            Ok(())
        })?;
        Ok(committed.entries)
    }

    /// Build the next generation through `fill` and commit it atomically.
    ///
    /// If `fill` fails, the temporary file is discarded and the previous
    /// generation (or the absence of a database) stays visible.
    pub fn replace_with<F>(&self, roots: Vec<String>, fill: F) -> Result<Committed>
    where
        F: FnOnce(&mut StoreWriter) -> Result<()>,
    {
        let now = unix_now();
        let (generation, created_at) = match self.previous_header() {
            Some(prev) => (prev.generation + 1, prev.created_at),
            None => (1, now),
        };

        let mut writer = StoreWriter::create(&self.path, DbHeader::new(generation, created_at, now, roots))?;
        if let Err(e) = fill(&mut writer) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "update aborted, keeping previous database"
            );
            return Err(e);
        }
        writer.commit()
    }

    /// Header of the committed generation, if there is a readable one
    pub(crate) fn previous_header(&self) -> Option<DbHeader> {
        match StoreReader::open(&self.path) {
            Ok(reader) => Some(reader.header().clone()),
            Err(Error::NotFound { .. }) => None,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "ignoring unreadable previous database"
                );
                None
            }
        }
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_sorts_and_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = PathStore::new(dir.path().join("db"));

        let count = store.write(["/b", "/a", "/c", "/a"]).unwrap();
        assert_eq!(count, 3);
        assert_eq!(store.read_all().unwrap(), vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn test_generation_advances_per_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = PathStore::new(dir.path().join("db"));

        store.write(["/a"]).unwrap();
        let first = store.stats().unwrap();
        store.write(["/a", "/b"]).unwrap();
        let second = store.stats().unwrap();

        assert_eq!(first.generation, 1);
        assert_eq!(second.generation, 2);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.entry_count, 2);
    }

    #[test]
    fn test_failed_fill_keeps_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let store = PathStore::new(dir.path().join("db"));
        store.write(["/keep/me"]).unwrap();
        let before = store.stats().unwrap();

        let result = store.replace_with(Vec::new(), |writer| {
            writer.push("/new/one")?;
            writer.push("/new/two")?;
            Err(Error::storage(
                "/simulated",
                std::io::Error::other("disk full"),
            ))
        });

        assert!(matches!(result, Err(Error::Storage { .. })));
        assert_eq!(store.read_all().unwrap(), vec!["/keep/me"]);
        assert_eq!(store.stats().unwrap(), before);
        // Only the database itself remains in the directory
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_first_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = PathStore::new(dir.path().join("db"));

        let result = store.replace_with(Vec::new(), |writer| {
            writer.push("/half")?;
            Err(Error::Cancelled)
        });

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(!store.exists());
        assert!(store.stats().unwrap_err().is_not_found());
    }

    #[test]
    fn test_unwritable_destination_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the database directory should be
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let store = PathStore::new(blocker.join("db"));
        assert!(matches!(store.write(["/a"]), Err(Error::Storage { .. })));
    }
}
