use crate::utils::{decode_varint, encode_varint, read_u32_at, read_u64_at, write_u32_le, write_u64_le};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Generation counter of a committed database
pub type Generation = u64;

/// File magic at offset 0 of every database
pub const MAGIC: &[u8; 8] = b"FLOCATE\0";

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Size of the fixed part of the header (magic, version, flags, five u64 fields)
pub const FIXED_HEADER_LEN: usize = 8 + 4 + 4 + 8 * 5;

/// A single indexed entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexedPath {
    /// Absolute path, stored verbatim
    pub path: String,
    /// Generation of the update that last observed this path
    pub generation: Generation,
}

impl IndexedPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            generation: 0,
        }
    }

    pub fn with_generation(path: impl Into<String>, generation: Generation) -> Self {
        Self {
            path: path.into(),
            generation,
        }
    }

    /// Byte length of the path string
    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// How an update combines freshly crawled paths with the stored ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePolicy {
    /// The new database holds exactly the crawled paths
    #[default]
    Replace,
    /// Stored paths outside the crawled roots survive; paths inside them
    /// are replaced by the crawl result
    Merge,
}

/// Database header
///
/// Layout (little-endian):
///
/// ```text
/// magic[8] version:u32 flags:u32 generation:u64 entry_count:u64
/// path_bytes:u64 created_at:u64 updated_at:u64
/// root_count:varint (root_len:varint root_bytes)*
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbHeader {
    pub version: u32,
    pub generation: Generation,
    pub entry_count: u64,
    /// Sum of the byte lengths of all stored paths
    pub path_bytes: u64,
    pub created_at: u64,
    pub updated_at: u64,
    /// Absolute roots covered by the database
    pub roots: Vec<String>,
}

impl DbHeader {
    pub fn new(generation: Generation, created_at: u64, updated_at: u64, roots: Vec<String>) -> Self {
        Self {
            version: FORMAT_VERSION,
            generation,
            entry_count: 0,
            path_bytes: 0,
            created_at,
            updated_at,
            roots,
        }
    }

    /// Write the fixed-width part. Rewritten in place when the writer commits.
    pub fn write_fixed<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(MAGIC)?;
        write_u32_le(w, self.version)?;
        write_u32_le(w, 0)?;
        write_u64_le(w, self.generation)?;
        write_u64_le(w, self.entry_count)?;
        write_u64_le(w, self.path_bytes)?;
        write_u64_le(w, self.created_at)?;
        write_u64_le(w, self.updated_at)
    }

    /// Write the complete header
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.write_fixed(w)?;
        let mut buf = Vec::new();
        encode_varint(self.roots.len() as u64, &mut buf);
        for root in &self.roots {
            encode_varint(root.len() as u64, &mut buf);
            buf.extend_from_slice(root.as_bytes());
        }
        w.write_all(&buf)
    }

    /// Parse a header from the start of `buf`.
    /// Returns the header and the offset of the first entry.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), String> {
        if buf.len() < FIXED_HEADER_LEN {
            return Err(format!("file too short ({} bytes)", buf.len()));
        }
        if &buf[..8] != MAGIC {
            return Err("bad magic".to_string());
        }

        let field = |offset| read_u64_at(buf, offset).ok_or_else(|| "truncated header".to_string());
        let version = read_u32_at(buf, 8).ok_or("truncated header")?;
        if version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {} (expected {})",
                version, FORMAT_VERSION
            ));
        }

        let mut header = Self {
            version,
            generation: field(16)?,
            entry_count: field(24)?,
            path_bytes: field(32)?,
            created_at: field(40)?,
            updated_at: field(48)?,
            roots: Vec::new(),
        };

        let mut pos = FIXED_HEADER_LEN;
        let (root_count, used) = decode_varint(&buf[pos..]).ok_or("truncated root list")?;
        pos += used;
        for _ in 0..root_count {
            let (len, used) = decode_varint(&buf[pos..]).ok_or("truncated root list")?;
            pos += used;
            let end = pos
                .checked_add(len as usize)
                .filter(|&end| end <= buf.len())
                .ok_or("truncated root list")?;
            let root = std::str::from_utf8(&buf[pos..end]).map_err(|_| "root is not valid UTF-8")?;
            header.roots.push(root.to_string());
            pos = end;
        }

        Ok((header, pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parse_after_write() {
        let mut header = DbHeader::new(3, 100, 200, vec!["/home".into(), "/usr".into()]);
        header.entry_count = 42;
        header.path_bytes = 1234;

        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        let (parsed, offset) = DbHeader::parse(&buf).unwrap();

        assert_eq!(parsed, header);
        assert_eq!(offset, buf.len());
    }

    #[test]
    fn test_header_rejects_bad_magic() {
        let mut buf = vec![0u8; FIXED_HEADER_LEN + 1];
        buf[..8].copy_from_slice(b"NOTLOCAT");
        assert!(DbHeader::parse(&buf).unwrap_err().contains("magic"));
    }

    #[test]
    fn test_header_rejects_future_version() {
        let header = DbHeader::new(1, 0, 0, Vec::new());
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        buf[8] = 99;
        assert!(DbHeader::parse(&buf).unwrap_err().contains("version"));
    }

    #[test]
    fn test_update_policy_serde() {
        let policy: UpdatePolicy = serde_json::from_str("\"merge\"").unwrap();
        assert_eq!(policy, UpdatePolicy::Merge);
        assert_eq!(UpdatePolicy::default(), UpdatePolicy::Replace);
    }
}
