//! The encoder: merges runs of unique adjacent blocks, then emits
//! `[header | index[blknum] | data...]`.

use crate::block::{BlockEntry, Similarity};
use crate::consts::RAB_POLYNOMIAL_MAX_BLOCK_SIZE;
use crate::delta;
use crate::header::{self, DedupeHeader};

enum EncodedSlot {
    Raw { offset: u64, length: u32 },
    ExactRef { other_orig: u32 },
    PartialRef { offset: u64, length: u32, other_orig: u32 },
}

/// Stage A: walks blocks in emission order, absorbing consecutive
/// `NONE`-classified blocks into merged runs bounded by `MAX_BLK`, and
/// builds the mapping from original block index to final emitted slot.
fn merge_runs(blocks: &[BlockEntry]) -> (Vec<EncodedSlot>, Vec<u32>) {
    let n = blocks.len();
    let mut new_slot_of = vec![u32::MAX; n];
    let mut entries = Vec::new();
    let max_blk = RAB_POLYNOMIAL_MAX_BLOCK_SIZE as u64;

    let mut i = 0;
    while i < n {
        if blocks[i].similar == Similarity::None {
            let mut j = i;
            let mut merged_len = blocks[i].length as u64;
            while j + 1 < n
                && blocks[j + 1].similar == Similarity::None
                && merged_len + blocks[j + 1].length as u64 <= max_blk
            {
                merged_len += blocks[j + 1].length as u64;
                j += 1;
            }
            let slot = entries.len() as u32;
            for k in i..=j {
                new_slot_of[k] = slot;
            }
            entries.push(EncodedSlot::Raw {
                offset: blocks[i].offset,
                length: merged_len as u32,
            });
            i = j + 1;
        } else {
            let slot = entries.len() as u32;
            new_slot_of[i] = slot;
            match blocks[i].similar {
                Similarity::Ref => entries.push(EncodedSlot::Raw {
                    offset: blocks[i].offset,
                    length: blocks[i].length,
                }),
                Similarity::Exact => entries.push(EncodedSlot::ExactRef {
                    other_orig: blocks[i].other.expect("EXACT block must carry `other`"),
                }),
                Similarity::Partial => entries.push(EncodedSlot::PartialRef {
                    offset: blocks[i].offset,
                    length: blocks[i].length,
                    other_orig: blocks[i].other.expect("PARTIAL block must carry `other`"),
                }),
                Similarity::None => unreachable!(),
            }
            i += 1;
        }
    }
    (entries, new_slot_of)
}

/// Stage B + full layout: `[header | index | data]`. Returns the
/// complete encoded buffer and the on-wire index size in bytes.
pub fn encode(buf: &[u8], blocks: &[BlockEntry]) -> (Vec<u8>, u32) {
    let (entries, new_slot_of) = merge_runs(blocks);

    let mut index = Vec::with_capacity(entries.len());
    let mut data = Vec::new();

    for entry in &entries {
        match entry {
            EncodedSlot::Raw { offset, length } => {
                index.push(header::encode_raw(*length));
                data.extend_from_slice(&buf[*offset as usize..(*offset + *length as u64) as usize]);
            }
            EncodedSlot::ExactRef { other_orig } => {
                let other_slot = new_slot_of[*other_orig as usize];
                index.push(header::encode_exact_ref(other_slot));
            }
            EncodedSlot::PartialRef { offset, length, other_orig } => {
                let other_slot = new_slot_of[*other_orig as usize];
                let other_block = &blocks[*other_orig as usize];
                let other_bytes =
                    &buf[other_block.offset as usize..(other_block.offset + other_block.length as u64) as usize];
                let this_bytes = &buf[*offset as usize..(*offset + *length as u64) as usize];

                match delta::bsdiff(other_bytes, this_bytes) {
                    Some(diff) => {
                        index.push(header::encode_similar_ref(other_slot));
                        data.extend_from_slice(&diff);
                    }
                    None => {
                        index.push(header::encode_raw(*length));
                        data.extend_from_slice(this_bytes);
                    }
                }
            }
        }
    }

    let index_size_bytes = (index.len() * 4) as u32;
    let hdr = DedupeHeader {
        blknum: entries.len() as u32,
        original_size: buf.len() as u64,
        compressed_index_size: 0,
        deduped_size: data.len() as u64,
        compressed_data_size: 0,
    };

    let mut out = Vec::with_capacity(36 + index.len() * 4 + data.len());
    hdr.write_to(&mut out);
    for entry in &index {
        out.extend_from_slice(&entry.to_be_bytes());
    }
    out.extend_from_slice(&data);

    (out, index_size_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockEntry;

    #[test]
    fn unique_blocks_merge_up_to_max_blk() {
        let blocks = vec![
            BlockEntry::new(0, 32, 0),
            BlockEntry::new(32, 32, 1),
            BlockEntry::new(64, 32, 2),
        ];
        let buf = vec![0u8; 96];
        let (out, index_size) = encode(&buf, &blocks);
        assert_eq!(index_size, 4); // merged into a single slot
        let hdr = crate::header::parse_dedupe_hdr(&out).unwrap();
        assert_eq!(hdr.blknum, 1);
        assert_eq!(hdr.deduped_size, 96);
    }

    #[test]
    fn exact_ref_emits_no_data() {
        let mut b0 = BlockEntry::new(0, 32, 0);
        b0.similar = Similarity::Ref;
        let mut b1 = BlockEntry::new(32, 32, 1);
        b1.similar = Similarity::Exact;
        b1.other = Some(0);
        let blocks = vec![b0, b1];
        let buf = vec![7u8; 64];

        let (out, _) = encode(&buf, &blocks);
        let hdr = crate::header::parse_dedupe_hdr(&out).unwrap();
        assert_eq!(hdr.blknum, 2);
        assert_eq!(hdr.deduped_size, 32); // only the Ref block's raw bytes
    }
}
