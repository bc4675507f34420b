use crate::error::Result;
use crate::index::reader::StoreReader;
use crate::index::store::PathStore;
use crate::index::types::Generation;
use serde::Serialize;
use std::path::Path;

/// Summary of a committed database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbStats {
    /// Number of stored paths
    pub entry_count: u64,
    /// Size of the database file on disk
    pub byte_size: u64,
    /// Total bytes of stored path strings
    pub path_bytes: u64,
    pub generation: Generation,
    pub created_at: u64,
    pub updated_at: u64,
    pub roots: Vec<String>,
}

impl DbStats {
    pub fn from_reader(reader: &StoreReader) -> Self {
        let header = reader.header();
        Self {
            entry_count: header.entry_count,
            byte_size: reader.file_size(),
            path_bytes: header.path_bytes,
            generation: header.generation,
            created_at: header.created_at,
            updated_at: header.updated_at,
            roots: header.roots.clone(),
        }
    }
}

/// Entry count and on-disk byte size of the database at `db_path`
pub fn get_stats(db_path: &Path) -> Result<(u64, u64)> {
    let stats = PathStore::new(db_path).stats()?;
    Ok((stats.entry_count, stats.byte_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_reflect_committed_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db");
        PathStore::new(&db).write(["/one", "/two", "/three"]).unwrap();

        let (count, size) = get_stats(&db).unwrap();
        assert_eq!(count, 3);
        assert_eq!(size, std::fs::metadata(&db).unwrap().len());
    }

    #[test]
    fn test_stats_on_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        assert!(get_stats(&dir.path().join("nope")).unwrap_err().is_not_found());
    }
}
