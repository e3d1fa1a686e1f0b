//! Parses the header and index, then reconstructs the original chunk
//! in a second pass.

use crate::consts::RABIN_HDR_SIZE;
use crate::delta;
use crate::error::DedupeError;
use crate::header::{self, IndexEntry};

#[derive(Debug, Clone, Copy)]
enum Slot {
    Raw { offset: usize, length: u32 },
    ExactRef { ref_index: u32 },
    DiffRef { offset: usize, diff_len: u32, ref_index: u32 },
}

/// Parses the header + index and reconstructs the original buffer,
/// checking the final size against `original_size` from the header.
pub fn decode(buf: &[u8]) -> Result<Vec<u8>, DedupeError> {
    let hdr = header::parse_dedupe_hdr(buf)?;
    let index_start = RABIN_HDR_SIZE;
    let index_end = index_start + hdr.blknum as usize * 4;
    if buf.len() < index_end {
        return Err(DedupeError::ShortData);
    }

    // First pass: walk the index, assigning each slot its data cursor.
    let mut slots = Vec::with_capacity(hdr.blknum as usize);
    let mut cursor = index_end;
    for i in 0..hdr.blknum as usize {
        let raw = u32::from_be_bytes(buf[index_start + i * 4..index_start + i * 4 + 4].try_into().unwrap());
        match header::decode_entry(raw) {
            IndexEntry::Raw(length) => {
                slots.push(Slot::Raw { offset: cursor, length });
                cursor = cursor.checked_add(length as usize).ok_or(DedupeError::DataOverflow)?;
                if cursor > buf.len() {
                    return Err(DedupeError::DataOverflow);
                }
            }
            IndexEntry::ExactRef(ref_index) => {
                slots.push(Slot::ExactRef { ref_index });
            }
            IndexEntry::SimilarRef(ref_index) => {
                if cursor > buf.len() {
                    return Err(DedupeError::DataOverflow);
                }
                let diff_len = delta::get_bsdiff_sz(&buf[cursor..])? as u32;
                slots.push(Slot::DiffRef { offset: cursor, diff_len, ref_index });
                cursor = cursor.checked_add(diff_len as usize).ok_or(DedupeError::DataOverflow)?;
                if cursor > buf.len() {
                    return Err(DedupeError::DataOverflow);
                }
            }
        }
    }

    // Second pass: reconstruct slot bytes in order. References must
    // point to an already-materialized earlier slot.
    let mut out_slots: Vec<Vec<u8>> = Vec::with_capacity(slots.len());
    for slot in &slots {
        let bytes = match *slot {
            Slot::Raw { offset, length } => buf[offset..offset + length as usize].to_vec(),
            Slot::ExactRef { ref_index } => {
                let referenced = out_slots.get(ref_index as usize).ok_or(DedupeError::CorruptedChunk)?;
                referenced.clone()
            }
            Slot::DiffRef { offset, diff_len, ref_index } => {
                let referenced = out_slots.get(ref_index as usize).ok_or(DedupeError::CorruptedChunk)?;
                let diff_bytes = &buf[offset..offset + diff_len as usize];
                delta::bspatch(referenced, diff_bytes)?
            }
        };
        out_slots.push(bytes);
    }

    let mut out = Vec::with_capacity(hdr.original_size as usize);
    for s in &out_slots {
        out.extend_from_slice(s);
    }

    if out.len() as u64 != hdr.original_size {
        return Err(DedupeError::DataOverflow);
    }
    Ok(out)
}
