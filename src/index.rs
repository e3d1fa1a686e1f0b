//! The dedup indexer: Stage A computes a content hash per block
//! (optionally in parallel), Stage B classifies each block as unique,
//! exact duplicate, or partial/similar duplicate using a bucket-chained
//! hashtable carved out of scratch memory.

use xxhash_rust::xxh32::xxh32;

use crate::block::{BlockEntry, Similarity};
use crate::config::DedupeConfig;
use crate::consts::RABIN_ENTRY_SIZE;
use crate::scratch::BucketTable;

/// Stage A: fill in `hash` (and, when delta mode is off, `similarity_hash`)
/// for every block. Embarrassingly parallel over blocks; runs through
/// `rayon` when the `mt` feature is enabled and the caller asks for it.
pub fn hash_blocks(buf: &[u8], blocks: &mut [BlockEntry], delta_flag: u8, mt: bool) {
    #[cfg(feature = "mt")]
    {
        if mt {
            use rayon::prelude::*;
            blocks.par_iter_mut().for_each(|b| {
                let bytes = &buf[b.offset as usize..(b.offset + b.length as u64) as usize];
                b.hash = xxh32(bytes, 0);
                if delta_flag == 0 {
                    b.similarity_hash = b.hash;
                }
            });
            return;
        }
    }
    let _ = mt;
    for b in blocks.iter_mut() {
        let bytes = &buf[b.offset as usize..(b.offset + b.length as u64) as usize];
        b.hash = xxh32(bytes, 0);
        if delta_flag == 0 {
            b.similarity_hash = b.hash;
        }
    }
}

/// Stage B: sequential bucket-chain classification. Returns the
/// accumulated estimate of bytes saved by dedup ("matchlen"), used for
/// the break-even check.
pub fn classify_blocks(
    buf: &[u8],
    blocks: &mut [BlockEntry],
    cfg: &DedupeConfig,
    scratch: &mut [u8],
) -> u64 {
    let blknum = blocks.len();
    let table_len = blknum * 2;
    let mut table = BucketTable::new(scratch, table_len);
    let delta_flag = cfg.delta_flag();
    let mut matchlen: u64 = 0;

    for i in 0..blknum {
        let length = blocks[i].length as u64;
        let sim_hash = blocks[i].similarity_hash as u64;
        let ck = sim_hash ^ (sim_hash / length);
        let bucket = (ck % table_len as u64) as usize;

        let head = match table.get(bucket) {
            None => {
                table.set(bucket, i as u32);
                blocks[i].similar = Similarity::None;
                blocks[i].other = None;
                blocks[i].next = None;
                continue;
            }
            Some(h) => h,
        };

        let mut found = false;

        // Exact-duplicate search: same hash, same length, identical bytes.
        let mut cursor = head;
        loop {
            let (c_hash, c_len, c_off) =
                (blocks[cursor as usize].hash, blocks[cursor as usize].length, blocks[cursor as usize].offset);
            if c_hash == blocks[i].hash && c_len == blocks[i].length {
                let (i_off, i_len) = (blocks[i].offset, blocks[i].length);
                let a = &buf[c_off as usize..(c_off + c_len as u64) as usize];
                let b = &buf[i_off as usize..(i_off + i_len as u64) as usize];
                if a == b {
                    blocks[i].similar = Similarity::Exact;
                    blocks[i].other = Some(cursor);
                    blocks[cursor as usize].similar = Similarity::Ref;
                    matchlen += c_len as u64;
                    found = true;
                    break;
                }
            }
            match blocks[cursor as usize].next {
                Some(next) => cursor = next,
                None => break,
            }
        }

        // Similar-block search, only when no exact match was found.
        if !found && delta_flag != 0 {
            cursor = head;
            loop {
                let (c_sim, c_len, c_off) = (
                    blocks[cursor as usize].similarity_hash,
                    blocks[cursor as usize].length,
                    blocks[cursor as usize].offset,
                );
                if c_sim == blocks[i].similarity_hash && c_len == blocks[i].length {
                    let i_off = blocks[i].offset;
                    let off_diff = if c_off > i_off { c_off - i_off } else { i_off - c_off };
                    if off_diff > cfg.deltac_min_distance {
                        blocks[i].similar = Similarity::Partial;
                        blocks[i].other = Some(cursor);
                        blocks[cursor as usize].similar = Similarity::Ref;
                        matchlen += c_len as u64 / 2;
                        found = true;
                        break;
                    }
                }
                match blocks[cursor as usize].next {
                    Some(next) => cursor = next,
                    None => break,
                }
            }
        }

        if !found {
            blocks[i].similar = Similarity::None;
            blocks[i].other = None;
            blocks[i].next = None;

            let mut tail = head;
            while let Some(next) = blocks[tail as usize].next {
                tail = next;
            }
            blocks[tail as usize].next = Some(i as u32);
        }
    }

    matchlen
}

/// Break-even check: dedup is only worthwhile if the estimated savings
/// outweigh the index overhead.
pub fn is_worthwhile(matchlen: u64, blknum: usize) -> bool {
    matchlen >= blknum as u64 * RABIN_ENTRY_SIZE as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompressOp, DeltaMode};

    #[test]
    fn exact_duplicates_classified() {
        let mut data = vec![0u8; 64];
        data[..32].copy_from_slice(&[1u8; 32]);
        data[32..].copy_from_slice(&[1u8; 32]);

        let mut blocks = vec![
            BlockEntry::new(0, 32, 0),
            BlockEntry::new(32, 32, 1),
        ];
        let cfg = DedupeConfig::new(2, DeltaMode::Off, false, CompressOp::Compress);
        hash_blocks(&data, &mut blocks, cfg.delta_flag(), false);

        let mut scratch = vec![0u8; 64];
        classify_blocks(&data, &mut blocks, &cfg, &mut scratch);

        assert_eq!(blocks[0].similar, Similarity::Ref);
        assert_eq!(blocks[1].similar, Similarity::Exact);
        assert_eq!(blocks[1].other, Some(0));
    }

    #[test]
    fn distinct_blocks_stay_unique() {
        let mut data = vec![0u8; 64];
        for (idx, b) in data.iter_mut().enumerate() {
            *b = idx as u8;
        }
        let mut blocks = vec![BlockEntry::new(0, 32, 0), BlockEntry::new(32, 32, 1)];
        let cfg = DedupeConfig::new(2, DeltaMode::Off, false, CompressOp::Compress);
        hash_blocks(&data, &mut blocks, cfg.delta_flag(), false);

        let mut scratch = vec![0u8; 64];
        classify_blocks(&data, &mut blocks, &cfg, &mut scratch);

        assert_eq!(blocks[0].similar, Similarity::None);
        assert_eq!(blocks[1].similar, Similarity::None);
    }
}
