//! Structured-stream framing and the per-row offset codec
//!
//! Persisted column data is wrapped in a tagged frame: a length-prefixed
//! implementation tag plus a version at the start, and a fixed end marker.
//! A reader that sees a different tag or a missing end marker knows the
//! stream is corrupt rather than merely outdated.

use crate::{Result, TableError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// End-of-frame marker
const END_MARK: u32 = 0x454E_4446; // "ENDF"

/// Offset values above this boundary take the escaped 12-byte form
const OFFSET_BOUNDARY: u64 = 1 << 31;
/// Sentinel announcing an 8-byte true offset follows
const OFFSET_ESCAPE: u32 = (OFFSET_BOUNDARY + 1) as u32;

/// Write the frame header: tag string plus format version
pub fn put_start<W: Write>(w: &mut W, tag: &str, version: u32) -> Result<()> {
    w.write_u32::<LittleEndian>(tag.len() as u32)?;
    w.write_all(tag.as_bytes())?;
    w.write_u32::<LittleEndian>(version)?;
    Ok(())
}

/// Read and check the frame header, returning the stored version
pub fn get_start<R: Read>(r: &mut R, expected_tag: &str) -> Result<u32> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    if len != expected_tag.len() {
        return Err(TableError::InvalidFileFormat);
    }
    let mut tag = vec![0u8; len];
    r.read_exact(&mut tag)?;
    if tag != expected_tag.as_bytes() {
        return Err(TableError::InvalidFileFormat);
    }
    Ok(r.read_u32::<LittleEndian>()?)
}

/// Write the frame end marker
pub fn put_end<W: Write>(w: &mut W) -> Result<()> {
    w.write_u32::<LittleEndian>(END_MARK)?;
    Ok(())
}

/// Read and check the frame end marker
pub fn get_end<R: Read>(r: &mut R) -> Result<()> {
    if r.read_u32::<LittleEndian>()? != END_MARK {
        return Err(TableError::InvalidFileFormat);
    }
    Ok(())
}

/// Encode one per-row file offset.
///
/// `None` (no array for the row) is a 4-byte zero. An offset at or below
/// 2^31 is written in 4 bytes; larger offsets are escaped with a sentinel
/// and carried in a trailing 8-byte field, keeping the common case compact
/// while staying correct beyond 32-bit addressing.
pub fn write_offset<W: Write>(w: &mut W, offset: Option<u64>) -> Result<()> {
    match offset {
        None => w.write_u32::<LittleEndian>(0)?,
        Some(off) if off <= OFFSET_BOUNDARY => w.write_u32::<LittleEndian>(off as u32)?,
        Some(off) => {
            w.write_u32::<LittleEndian>(OFFSET_ESCAPE)?;
            w.write_u64::<LittleEndian>(off)?;
        }
    }
    Ok(())
}

/// Decode one per-row file offset written by [`write_offset`]
pub fn read_offset<R: Read>(r: &mut R) -> Result<Option<u64>> {
    let short = r.read_u32::<LittleEndian>()?;
    if short == OFFSET_ESCAPE {
        return Ok(Some(r.read_u64::<LittleEndian>()?));
    }
    if short == 0 {
        return Ok(None);
    }
    Ok(Some(short as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(offset: Option<u64>) -> (Option<u64>, usize) {
        let mut buf = Vec::new();
        write_offset(&mut buf, offset).unwrap();
        let len = buf.len();
        let decoded = read_offset(&mut Cursor::new(buf)).unwrap();
        (decoded, len)
    }

    #[test]
    fn test_offset_round_trip() {
        for off in [1u64, 42, u32::MAX as u64 / 2, 1 << 20] {
            assert_eq!(round_trip(Some(off)), (Some(off), 4));
        }
        assert_eq!(round_trip(None), (None, 4));
    }

    #[test]
    fn test_offset_boundary() {
        // Exactly at the boundary: still the compact form.
        let at = 1u64 << 31;
        assert_eq!(round_trip(Some(at)), (Some(at), 4));
        // Just above: escaped form.
        assert_eq!(round_trip(Some(at + 1)), (Some(at + 1), 12));
        let big = 0x1234_5678_9abcu64;
        assert_eq!(round_trip(Some(big)), (Some(big), 12));
    }

    #[test]
    fn test_frame_round_trip() {
        let mut buf = Vec::new();
        put_start(&mut buf, "IndirectArrayColumn", 2).unwrap();
        put_end(&mut buf).unwrap();
        let mut cur = Cursor::new(buf);
        assert_eq!(get_start(&mut cur, "IndirectArrayColumn").unwrap(), 2);
        get_end(&mut cur).unwrap();
    }

    #[test]
    fn test_frame_wrong_tag() {
        let mut buf = Vec::new();
        put_start(&mut buf, "SomethingElse", 2).unwrap();
        let res = get_start(&mut Cursor::new(buf), "IndirectArrayColumn");
        assert!(matches!(res, Err(TableError::InvalidFileFormat)));
    }
}
