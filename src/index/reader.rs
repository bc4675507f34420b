use crate::error::{Error, Result};
use crate::index::types::*;
use crate::utils::decode_varint;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Memory-mapped reader over one committed database generation.
///
/// The mapping stays valid after a concurrent update renames a new file over
/// `db_path`; the reader keeps seeing the generation it opened.
pub struct StoreReader {
    path: PathBuf,
    mmap: Mmap,
    header: DbHeader,
    body_offset: usize,
    file_size: u64,
}

impl StoreReader {
    /// Open and validate the database header
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::from_db_io(path, e))?;
        let file_size = file
            .metadata()
            .map_err(|e| Error::storage(path, e))?
            .len();

        if (file_size as usize) < FIXED_HEADER_LEN {
            return Err(Error::corrupt(
                path,
                format!("file too short ({} bytes)", file_size),
            ));
        }

        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::storage(path, e))?;
        let (header, body_offset) =
            DbHeader::parse(&mmap).map_err(|reason| Error::corrupt(path, reason))?;

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            header,
            body_offset,
            file_size,
        })
    }

    pub fn header(&self) -> &DbHeader {
        &self.header
    }

    /// Number of stored entries
    pub fn len(&self) -> u64 {
        self.header.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.header.entry_count == 0
    }

    /// Size of the database file in bytes
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Streaming cursor over the entries in storage order
    pub fn cursor(&self) -> PathCursor<'_> {
        PathCursor {
            db_path: &self.path,
            data: &self.mmap[self.body_offset..],
            pos: 0,
            remaining: self.header.entry_count,
            current: String::new(),
        }
    }

    /// Materialize every stored path
    pub fn read_all(&self) -> Result<Vec<String>> {
        let mut paths = Vec::with_capacity(self.header.entry_count.min(1 << 24) as usize);
        let mut cursor = self.cursor();
        while let Some(entry) = cursor.next_entry()? {
            paths.push(entry.path.to_string());
        }
        Ok(paths)
    }

    /// Materialize every stored entry with its generation tag
    pub fn read_entries(&self) -> Result<Vec<IndexedPath>> {
        let mut entries = Vec::with_capacity(self.header.entry_count.min(1 << 24) as usize);
        let mut cursor = self.cursor();
        while let Some(entry) = cursor.next_entry()? {
            entries.push(entry.to_indexed());
        }
        Ok(entries)
    }
}

/// Borrowed view of one entry, valid until the cursor advances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef<'a> {
    pub path: &'a str,
    pub generation: Generation,
}

impl EntryRef<'_> {
    pub fn to_indexed(&self) -> IndexedPath {
        IndexedPath::with_generation(self.path, self.generation)
    }
}

/// Decodes front-coded entries one at a time into a reused buffer
pub struct PathCursor<'a> {
    db_path: &'a Path,
    data: &'a [u8],
    pos: usize,
    remaining: u64,
    current: String,
}

impl<'a> PathCursor<'a> {
    /// Advance to the next entry. Returns `Ok(None)` once all entries were read.
    pub fn next_entry(&mut self) -> Result<Option<EntryRef<'_>>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let shared = self.varint()? as usize;
        let suffix_len = self.varint()? as usize;
        let generation = self.varint()?;

        let end = self
            .pos
            .checked_add(suffix_len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| self.truncated())?;
        let suffix = std::str::from_utf8(&self.data[self.pos..end])
            .map_err(|_| Error::corrupt(self.db_path, "entry is not valid UTF-8"))?;

        if shared > self.current.len() || !self.current.is_char_boundary(shared) {
            return Err(Error::corrupt(self.db_path, "invalid shared prefix"));
        }

        self.current.truncate(shared);
        self.current.push_str(suffix);
        self.pos = end;
        self.remaining -= 1;

        Ok(Some(EntryRef {
            path: &self.current,
            generation,
        }))
    }

    fn varint(&mut self) -> Result<u64> {
        let (value, used) = decode_varint(&self.data[self.pos..]).ok_or_else(|| self.truncated())?;
        self.pos += used;
        Ok(value)
    }

    fn truncated(&self) -> Error {
        Error::corrupt(
            self.db_path,
            format!("truncated with {} entries missing", self.remaining),
        )
    }
}
