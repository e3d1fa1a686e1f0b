//! The 36-byte big-endian dedup header and index-entry flag bits. All
//! multi-byte integers are big-endian on the wire, host-native in memory;
//! the conversion happens only here, via `byteorder`.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::consts::{INDEX_MASK, RABIN_HDR_SIZE, REF_FLAG, SIM_FLAG};
use crate::error::DedupeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupeHeader {
    pub blknum: u32,
    pub original_size: u64,
    pub compressed_index_size: u64,
    pub deduped_size: u64,
    pub compressed_data_size: u64,
}

impl DedupeHeader {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.write_u32::<BigEndian>(self.blknum).unwrap();
        out.write_u64::<BigEndian>(self.original_size).unwrap();
        out.write_u64::<BigEndian>(self.compressed_index_size).unwrap();
        out.write_u64::<BigEndian>(self.deduped_size).unwrap();
        out.write_u64::<BigEndian>(self.compressed_data_size).unwrap();
    }
}

/// Parses the fixed header at the front of `buf`.
pub fn parse_dedupe_hdr(buf: &[u8]) -> Result<DedupeHeader, DedupeError> {
    if buf.len() < RABIN_HDR_SIZE {
        return Err(DedupeError::ShortData);
    }
    let mut c = Cursor::new(buf);
    let blknum = c.read_u32::<BigEndian>().map_err(|_| DedupeError::ShortData)?;
    let original_size = c.read_u64::<BigEndian>().map_err(|_| DedupeError::ShortData)?;
    let compressed_index_size = c.read_u64::<BigEndian>().map_err(|_| DedupeError::ShortData)?;
    let deduped_size = c.read_u64::<BigEndian>().map_err(|_| DedupeError::ShortData)?;
    let compressed_data_size = c.read_u64::<BigEndian>().map_err(|_| DedupeError::ShortData)?;
    Ok(DedupeHeader {
        blknum,
        original_size,
        compressed_index_size,
        deduped_size,
        compressed_data_size,
    })
}

/// Patches `compressed_index_size` and `compressed_data_size` in place
/// after the outer driver has compressed the index/data sections —
/// those two fields are unknown at the time the Encoder first emits
/// the header.
pub fn update_dedupe_hdr(buf: &mut [u8], cmp_index_size: u64, cmp_data_size: u64) -> Result<(), DedupeError> {
    if buf.len() < RABIN_HDR_SIZE {
        return Err(DedupeError::ShortData);
    }
    (&mut buf[12..20]).write_u64::<BigEndian>(cmp_index_size).unwrap();
    (&mut buf[28..36]).write_u64::<BigEndian>(cmp_data_size).unwrap();
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexEntry {
    /// A plain length-prefixed data block; nothing deduped.
    Raw(u32),
    /// An exact-duplicate reference to an earlier slot.
    ExactRef(u32),
    /// A binary-diff reference to an earlier slot.
    SimilarRef(u32),
}

pub fn encode_raw(len: u32) -> u32 {
    debug_assert_eq!(len & (REF_FLAG | SIM_FLAG), 0, "raw length must not collide with flag bits");
    len
}

pub fn encode_exact_ref(slot: u32) -> u32 {
    REF_FLAG | (slot & INDEX_MASK)
}

pub fn encode_similar_ref(slot: u32) -> u32 {
    REF_FLAG | SIM_FLAG | (slot & INDEX_MASK)
}

pub fn decode_entry(raw: u32) -> IndexEntry {
    if raw & REF_FLAG == 0 {
        IndexEntry::Raw(raw)
    } else if raw & SIM_FLAG != 0 {
        IndexEntry::SimilarRef(raw & INDEX_MASK)
    } else {
        IndexEntry::ExactRef(raw & INDEX_MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let hdr = DedupeHeader {
            blknum: 42,
            original_size: 1 << 20,
            compressed_index_size: 0,
            deduped_size: 1234,
            compressed_data_size: 0,
        };
        let mut buf = Vec::new();
        hdr.write_to(&mut buf);
        assert_eq!(buf.len(), RABIN_HDR_SIZE);

        let parsed = parse_dedupe_hdr(&buf).unwrap();
        assert_eq!(parsed, hdr);

        update_dedupe_hdr(&mut buf, 99, 77).unwrap();
        let parsed = parse_dedupe_hdr(&buf).unwrap();
        assert_eq!(parsed.compressed_index_size, 99);
        assert_eq!(parsed.compressed_data_size, 77);
    }

    #[test]
    fn entry_flags_round_trip() {
        assert_eq!(decode_entry(encode_raw(4096)), IndexEntry::Raw(4096));
        assert_eq!(decode_entry(encode_exact_ref(7)), IndexEntry::ExactRef(7));
        assert_eq!(decode_entry(encode_similar_ref(7)), IndexEntry::SimilarRef(7));
    }
}
