//! Content-defined boundary detection: the rolling-fingerprint loop that
//! partitions a buffer into variable-length blocks, its fixed-block-size
//! sibling, and the tail-only last-boundary scanner.

use crate::block::BlockEntry;
use crate::config::DedupeConfig;
use crate::consts::{
    avg_block_size, min_block_size, RAB_BREAK_PATTERN, RAB_POLYNOMIAL_AVG_BLOCK_MASK,
    RAB_POLYNOMIAL_MAX_BLOCK_SIZE, RAB_POLYNOMIAL_WIN_SIZE, RAB_WINDOW_SLIDE_OFFSET,
};
use crate::sketch;
use crate::tables::PolyTables;
use crate::window::RollingWindow;

#[inline]
fn update_fingerprint(f: u64, byte: u8, evicted: u8, tables: &PolyTables) -> u64 {
    use crate::consts::{POLY_MASK, RAB_POLYNOMIAL_CONST};
    let f = (f.wrapping_mul(RAB_POLYNOMIAL_CONST)) & POLY_MASK;
    let f = f.wrapping_add(byte as u64);
    f.wrapping_sub(tables.out[evicted as usize])
}

/// Runs the rolling-hash chunker over `buf`, appending `BlockEntry`
/// records to `blocks`. Callers must ensure `buf.len() >= avg_block_size`;
/// below that the window start and tail-scan bounds underflow.
pub fn chunk(buf: &[u8], cfg: &DedupeConfig, blocks: &mut Vec<BlockEntry>) {
    if cfg.fixed_flag {
        chunk_fixed(buf, cfg, blocks);
        return;
    }

    let tables = PolyTables::get();
    let min_blk = min_block_size(cfg.rab_blk_sz);
    let max_blk = RAB_POLYNOMIAL_MAX_BLOCK_SIZE as u64;
    let delta_flag = cfg.delta_flag();
    let n = buf.len() as u64;

    let mut window = RollingWindow::new();
    let mut f: u64 = 0;
    let mut blknum: u32 = 0;
    let mut last_offset: u64 = 0;

    let start = min_blk - RAB_WINDOW_SLIDE_OFFSET as u64;
    let mut length = start;
    let j = n - RAB_POLYNOMIAL_WIN_SIZE as u64;
    let mut i = start;

    while i < j {
        let byte = buf[i as usize];
        let evicted = window.push(byte);
        f = update_fingerprint(f, byte, evicted, tables);

        length += 1;
        if length < min_blk {
            i += 1;
            continue;
        }

        let cut_value = f ^ tables.ir[evicted as usize];
        let is_cut =
            (cut_value & RAB_POLYNOMIAL_AVG_BLOCK_MASK) == RAB_BREAK_PATTERN || length >= max_blk;

        if is_cut {
            let block_len = length as u32;
            let mut entry = BlockEntry::new(last_offset, block_len, blknum);
            if delta_flag != 0 {
                let block_bytes = &buf[last_offset as usize..(last_offset + length) as usize];
                entry.similarity_hash = sketch::similarity_hash(block_bytes, delta_flag);
            }
            blocks.push(entry);
            blknum += 1;

            last_offset = i + 1;
            if n - last_offset <= min_blk {
                i += 1;
                break;
            }
            length = min_blk - RAB_WINDOW_SLIDE_OFFSET as u64;
            i += length;
        }
        i += 1;
    }

    if last_offset < n {
        let block_len = (n - last_offset) as u32;
        let block_bytes = &buf[last_offset as usize..n as usize];
        let mut entry = BlockEntry::new(last_offset, block_len, blknum);
        if delta_flag != 0 {
            entry.similarity_hash = if block_len as u64 > min_blk {
                sketch::similarity_hash(block_bytes, delta_flag)
            } else {
                sketch::raw_hash(block_bytes)
            };
        }
        blocks.push(entry);
    }
}

fn chunk_fixed(buf: &[u8], cfg: &DedupeConfig, blocks: &mut Vec<BlockEntry>) {
    use xxhash_rust::xxh32::xxh32;

    let avg = avg_block_size(cfg.rab_blk_sz);
    let n = buf.len() as u64;
    let mut offset = 0u64;
    let mut idx = 0u32;

    while offset < n {
        let len = std::cmp::min(avg, n - offset) as u32;
        let bytes = &buf[offset as usize..(offset + len as u64) as usize];
        let mut entry = BlockEntry::new(offset, len, idx);
        entry.hash = xxh32(bytes, 0);
        entry.similarity_hash = entry.hash;
        blocks.push(entry);
        offset += len as u64;
        idx += 1;
    }
}

/// Scans only the tail of `buf` (starting at `N - max_block_size`) for the
/// final content-defined cut point; used by callers to align chunk
/// boundaries across a stream split. Returns `None` if no cut was found.
pub fn last_boundary(buf: &[u8], cfg: &DedupeConfig) -> Option<u64> {
    let tables = PolyTables::get();
    let min_blk = min_block_size(cfg.rab_blk_sz);
    let max_blk = RAB_POLYNOMIAL_MAX_BLOCK_SIZE as u64;
    let n = buf.len() as u64;
    if n <= max_blk {
        return None;
    }

    let mut window = RollingWindow::new();
    let mut f: u64 = 0;
    let mut last_offset: u64 = 0;
    let mut length: u64 = 0;

    let offset = n - max_blk;
    let j = n - RAB_POLYNOMIAL_WIN_SIZE as u64;
    let mut i = offset;
    while i < j {
        let byte = buf[i as usize];
        let evicted = window.push(byte);
        f = update_fingerprint(f, byte, evicted, tables);

        length += 1;
        if length < min_blk {
            i += 1;
            continue;
        }

        let cut_value = f ^ tables.ir[evicted as usize];
        if (cut_value & RAB_POLYNOMIAL_AVG_BLOCK_MASK) == RAB_BREAK_PATTERN {
            last_offset = i;
            length = 0;
        }
        i += 1;
    }

    if last_offset < n && last_offset > 0 {
        Some(last_offset)
    } else {
        None
    }
}
