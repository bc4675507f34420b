use crate::error::{Error, Result};
use crate::index::types::*;
use crate::utils::{common_prefix_len, encode_varint};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Streaming writer for one database generation.
///
/// Entries go to a temporary file in the destination directory. Nothing is
/// visible at the destination until [`StoreWriter::commit`] renames the
/// fully synced file over it; dropping the writer removes the temporary file.
pub struct StoreWriter {
    db_path: PathBuf,
    header: DbHeader,
    out: BufWriter<NamedTempFile>,
    /// Last path written, used for ordering checks and front coding
    previous: String,
    scratch: Vec<u8>,
}

impl StoreWriter {
    pub(crate) fn create(db_path: &Path, header: DbHeader) -> Result<Self> {
        let dir = match db_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix(".flocate-").suffix(".tmp");
        // Masked by the umask like any created file, not tempfile's 0600
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }
        let temp = builder
            .tempfile_in(dir)
            .map_err(|e| Error::storage(db_path, e))?;

        let mut out = BufWriter::with_capacity(256 * 1024, temp);
        header
            .write_to(&mut out)
            .map_err(|e| Error::storage(db_path, e))?;

        Ok(Self {
            db_path: db_path.to_path_buf(),
            header,
            out,
            previous: String::new(),
            scratch: Vec::with_capacity(64),
        })
    }

    /// Number of entries written so far
    pub fn len(&self) -> u64 {
        self.header.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.header.entry_count == 0
    }

    /// Append a path observed by the current generation
    pub fn push(&mut self, path: &str) -> Result<bool> {
        let generation = self.header.generation;
        self.push_entry(path, generation)
    }

    /// Append a path with an explicit generation tag.
    ///
    /// Paths must arrive in strictly increasing byte order; an exact repeat of
    /// the previous path is skipped and reported as `Ok(false)`.
    pub fn push_entry(&mut self, path: &str, generation: Generation) -> Result<bool> {
        if !Path::new(path).is_absolute() {
            return Err(Error::InvalidEntry {
                path: path.to_string(),
                reason: "path is not absolute".to_string(),
            });
        }

        if self.header.entry_count > 0 {
            match path.cmp(self.previous.as_str()) {
                std::cmp::Ordering::Equal => return Ok(false),
                std::cmp::Ordering::Less => {
                    return Err(Error::InvalidEntry {
                        path: path.to_string(),
                        reason: format!("out of order after {:?}", self.previous),
                    });
                }
                std::cmp::Ordering::Greater => {}
            }
        }

        // Entry: shared_prefix:varint suffix_len:varint generation:varint suffix
        let shared = common_prefix_len(&self.previous, path);
        let suffix = &path.as_bytes()[shared..];

        self.scratch.clear();
        encode_varint(shared as u64, &mut self.scratch);
        encode_varint(suffix.len() as u64, &mut self.scratch);
        encode_varint(generation, &mut self.scratch);

        self.out
            .write_all(&self.scratch)
            .and_then(|_| self.out.write_all(suffix))
            .map_err(|e| Error::storage(&self.db_path, e))?;

        self.previous.truncate(shared);
        self.previous.push_str(&path[shared..]);
        self.header.entry_count += 1;
        self.header.path_bytes += path.len() as u64;
        Ok(true)
    }

    /// Finalize the header, flush, fsync and atomically move the file into place.
    pub fn commit(self) -> Result<Committed> {
        let Self {
            db_path,
            header,
            out,
            ..
        } = self;

        let mut temp = out
            .into_inner()
            .map_err(|e| Error::storage(&db_path, e.into_error()))?;

        temp.seek(SeekFrom::Start(0))
            .and_then(|_| header.write_fixed(&mut temp))
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| Error::storage(&db_path, e))?;

        temp.persist(&db_path)
            .map_err(|e| Error::storage(&db_path, e.error))?;

        sync_parent_dir(&db_path);

        tracing::debug!(
            path = %db_path.display(),
            entries = header.entry_count,
            generation = header.generation,
            "committed database"
        );

        Ok(Committed {
            entries: header.entry_count,
            generation: header.generation,
        })
    }
}

/// What a successful commit made visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Committed {
    pub entries: u64,
    pub generation: Generation,
}

/// Make the rename durable. Failure only weakens crash durability, the
/// committed file is already visible.
#[cfg(unix)]
fn sync_parent_dir(db_path: &Path) {
    let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return;
    };
    if let Err(e) = std::fs::File::open(parent).and_then(|dir| dir.sync_all()) {
        tracing::debug!(path = %parent.display(), error = %e, "failed to sync database directory");
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_db_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer_in(dir: &Path) -> StoreWriter {
        StoreWriter::create(&dir.join("db"), DbHeader::new(1, 0, 0, Vec::new())).unwrap()
    }

    #[test]
    fn test_rejects_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(dir.path());
        let err = writer.push("relative/path").unwrap_err();
        assert!(matches!(err, Error::InvalidEntry { .. }));
    }

    #[test]
    fn test_skips_duplicates_and_rejects_unsorted() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(dir.path());
        assert!(writer.push("/a/b").unwrap());
        assert!(!writer.push("/a/b").unwrap());
        assert!(writer.push("/a/c").unwrap());
        assert!(writer.push("/a/a").is_err());
        assert_eq!(writer.len(), 2);
    }

    #[test]
    fn test_nothing_visible_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db");
        let mut writer = writer_in(dir.path());
        writer.push("/x").unwrap();
        assert!(!db.exists());

        assert_eq!(writer.commit().unwrap().entries, 1);
        assert!(db.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_committed_file_follows_umask() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mut writer = writer_in(dir.path());
        writer.push("/x").unwrap();
        writer.commit().unwrap();

        let plain = dir.path().join("plain");
        std::fs::File::create(&plain).unwrap();
        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dir.path().join("db")), mode(&plain));
    }

    #[test]
    fn test_dropped_writer_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut writer = writer_in(dir.path());
            writer.push("/x").unwrap();
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
