use crate::error::Result;
use crate::index::reader::StoreReader;
use crate::query::matcher::{MatchOptions, PathMatcher};
use std::path::Path;

/// Options for one search
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub matching: MatchOptions,
    /// Stop after this many matches; `None` or `Some(0)` returns all
    pub limit: Option<usize>,
}

impl SearchOptions {
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }
}

/// Runs compiled matchers over one committed database generation
pub struct QueryExecutor<'a> {
    reader: &'a StoreReader,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(reader: &'a StoreReader) -> Self {
        Self { reader }
    }

    /// Matching paths in storage order, stopping once `limit` are found
    pub fn execute(&self, matcher: &PathMatcher, limit: Option<usize>) -> Result<Vec<String>> {
        let limit = limit.filter(|&l| l > 0);
        let mut results = Vec::with_capacity(limit.unwrap_or(64).min(4096));

        let mut cursor = self.reader.cursor();
        while let Some(entry) = cursor.next_entry()? {
            if matcher.is_match(entry.path) {
                results.push(entry.path.to_string());
                if limit.is_some_and(|l| results.len() >= l) {
                    break;
                }
            }
        }
        Ok(results)
    }

    /// Number of matching paths
    pub fn count(&self, matcher: &PathMatcher) -> Result<u64> {
        let mut count = 0;
        let mut cursor = self.reader.cursor();
        while let Some(entry) = cursor.next_entry()? {
            if matcher.is_match(entry.path) {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Search the database at `db_path` for `pattern`.
///
/// An existing database without matches yields an empty list; a missing
/// one is [`Error::NotFound`](crate::Error::NotFound).
pub fn search(db_path: &Path, pattern: &str, options: &SearchOptions) -> Result<Vec<String>> {
    let matcher = PathMatcher::new(pattern, &options.matching)?;
    let reader = StoreReader::open(db_path)?;
    let results = QueryExecutor::new(&reader).execute(&matcher, options.limit)?;

    tracing::debug!(
        db = %db_path.display(),
        pattern,
        matches = results.len(),
        "search finished"
    );
    Ok(results)
}

/// Count the paths in the database at `db_path` matching `pattern`
pub fn count(db_path: &Path, pattern: &str, options: &MatchOptions) -> Result<u64> {
    let matcher = PathMatcher::new(pattern, options)?;
    let reader = StoreReader::open(db_path)?;
    QueryExecutor::new(&reader).count(&matcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::index::store::PathStore;

    fn db_with(paths: &[&str]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("paths.db");
        PathStore::new(&db).write(paths.iter().copied()).unwrap();
        (dir, db)
    }

    #[test]
    fn test_extension_search() {
        let (_dir, db) = db_with(&["/a/b.txt", "/a/b.md"]);
        let results = search(&db, "*.txt", &SearchOptions::default()).unwrap();
        assert_eq!(results, vec!["/a/b.txt"]);
    }

    #[test]
    fn test_limit_returns_prefix_of_full_results() {
        let paths: Vec<String> = (0..10).map(|i| format!("/data/f{}", i)).collect();
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        let (_dir, db) = db_with(&refs);

        let all = search(&db, "*", &SearchOptions::default()).unwrap();
        let limited = search(&db, "*", &SearchOptions::with_limit(Some(3))).unwrap();
        assert_eq!(all.len(), 10);
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[..], all[..3]);

        let zero = search(&db, "*", &SearchOptions::with_limit(Some(0))).unwrap();
        assert_eq!(zero.len(), 10);
    }

    #[test]
    fn test_empty_database_has_no_matches() {
        let (_dir, db) = db_with(&[]);
        assert!(search(&db, "*", &SearchOptions::default()).unwrap().is_empty());
        assert_eq!(count(&db, "*", &MatchOptions::default()).unwrap(), 0);
    }

    #[test]
    fn test_missing_database_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = search(&dir.path().join("nope.db"), "*", &SearchOptions::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_count_matches() {
        let (_dir, db) = db_with(&["/a/x.log", "/a/y.log", "/a/z.txt"]);
        assert_eq!(count(&db, "*.log", &MatchOptions::default()).unwrap(), 2);
    }
}
