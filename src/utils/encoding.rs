use std::io::{self, Write};

/// Encode a u64 as a LEB128 variable-length integer
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        if value < 0x80 {
            buf.push(value as u8);
            break;
        }
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
}

/// Decode a variable-length integer from a slice
/// Returns (value, bytes_consumed), or None on truncated/overlong input
pub fn decode_varint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 64 {
            return None;
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }

        shift += 7;
    }

    None
}

/// Write a u32 in little-endian format
pub fn write_u32_le<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Write a u64 in little-endian format
pub fn write_u64_le<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read a little-endian u32 at `offset`, if the slice is long enough
pub fn read_u32_at(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

/// Read a little-endian u64 at `offset`, if the slice is long enough
pub fn read_u64_at(buf: &[u8], offset: usize) -> Option<u64> {
    let bytes = buf.get(offset..offset + 8)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

/// Length of the longest common prefix of `a` and `b` that ends on a
/// char boundary of both
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    let mut len = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .take_while(|(x, y)| x == y)
        .count();
    while !a.is_char_boundary(len) {
        len -= 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_roundtrip() {
        let values = [0, 1, 127, 128, 16383, 16384, u32::MAX as u64, u64::MAX];
        for value in values {
            let mut buf = Vec::new();
            encode_varint(value, &mut buf);
            let (decoded, used) = decode_varint(&buf).unwrap();
            assert_eq!(value, decoded);
            assert_eq!(used, buf.len());
        }
    }

    #[test]
    fn test_varint_truncated() {
        assert_eq!(decode_varint(&[0x80, 0x80]), None);
        assert_eq!(decode_varint(&[]), None);
    }

    #[test]
    fn test_fixed_width_reads() {
        let mut buf = Vec::new();
        write_u32_le(&mut buf, 7).unwrap();
        write_u64_le(&mut buf, 1 << 40).unwrap();
        assert_eq!(read_u32_at(&buf, 0), Some(7));
        assert_eq!(read_u64_at(&buf, 4), Some(1 << 40));
        assert_eq!(read_u64_at(&buf, 8), None);
    }

    #[test]
    fn test_common_prefix_respects_char_boundaries() {
        assert_eq!(common_prefix_len("/usr/lib", "/usr/local"), 6);
        assert_eq!(common_prefix_len("/a", "/a"), 2);
        // 'é' and 'è' share their first UTF-8 byte
        assert_eq!(common_prefix_len("/é", "/è"), 1);
    }
}
