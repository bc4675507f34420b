use rustc_hash::FxHashSet;
use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Identity of a directory, independent of the path used to reach it
#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirKey {
    dev: u64,
    ino: u64,
}

#[cfg(not(unix))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirKey(std::path::PathBuf);

impl DirKey {
    /// Identity of `path`, given metadata obtained by following symlinks
    #[cfg(unix)]
    pub fn new(_path: &Path, meta: &Metadata) -> io::Result<Self> {
        use std::os::unix::fs::MetadataExt;
        Ok(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn new(path: &Path, _meta: &Metadata) -> io::Result<Self> {
        Ok(Self(std::fs::canonicalize(path)?))
    }

    /// Stat `path` (following symlinks) and return its identity
    pub fn of(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Self::new(path, &meta)
    }
}

/// Directories already reached during one root's traversal.
/// The lock is held only for the set operation, never across a syscall.
#[derive(Debug, Default)]
pub struct VisitedSet {
    inner: Mutex<FxHashSet<DirKey>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key`; returns false if it was already present
    pub fn insert(&self, key: DirKey) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_directory_has_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();

        let direct = DirKey::of(&sub).unwrap();
        let dotted = DirKey::of(&dir.path().join("sub/../sub")).unwrap();
        assert_eq!(direct, dotted);
        assert_ne!(direct, DirKey::of(dir.path()).unwrap());
    }

    #[test]
    fn test_visited_set_reports_revisits() {
        let dir = tempfile::tempdir().unwrap();
        let set = VisitedSet::new();
        let key = DirKey::of(dir.path()).unwrap();

        assert!(set.insert(key.clone()));
        assert!(!set.insert(key));
        assert!(set.insert(DirKey::of(&std::env::temp_dir()).unwrap()));
    }
}
