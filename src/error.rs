//! Error types for the indexing and search engine.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the crawler, the path store and the matcher.
#[derive(Debug, Error)]
pub enum Error {
    /// An entry or root could not be read during a crawl.
    ///
    /// Never returned from an update; collected in the crawl report instead.
    #[error("cannot crawl {path}: {source}")]
    Crawl {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The database file could not be read or written.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The database has never been created.
    #[error("database not found: {path}")]
    NotFound { path: PathBuf },

    /// The database exists but its contents are not a valid path database.
    #[error("corrupt database {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// A search pattern could not be compiled.
    #[error("invalid pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },

    /// An entry handed to the store violates the database invariants.
    #[error("invalid entry {path:?}: {reason}")]
    InvalidEntry { path: String, reason: String },

    /// The update was aborted before it committed.
    #[error("indexing cancelled")]
    Cancelled,
}

impl Error {
    pub fn crawl(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Crawl {
            path: path.into(),
            source,
        }
    }

    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Map an I/O error on the database file, turning a missing file into
    /// [`Error::NotFound`].
    pub fn from_db_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::storage(path, source)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let err = Error::from_db_io(
            Path::new("/nowhere/db"),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert!(err.to_string().contains("/nowhere/db"));
    }

    #[test]
    fn test_other_io_maps_to_storage() {
        let err = Error::from_db_io(
            Path::new("/db"),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, Error::Storage { .. }));
        assert!(err.to_string().contains("/db"));
    }
}
