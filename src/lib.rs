//! Content-defined chunking and deduplication core for a chunked
//! parallel compressor. Given one chunk of input, [`DedupeContext`]
//! partitions it into variable-length blocks, detects exact and
//! near-duplicate blocks within the chunk, and emits a self-describing
//! deduplicated byte stream that [`DedupeContext::dedupe_decompress`]
//! reverses losslessly.
//!
//! The outer compression driver, LZMA compression of the index, the
//! process-level CLI, file I/O, and multi-chunk threading are all
//! external collaborators; this crate only implements the per-chunk
//! core.

pub mod block;
pub mod chunker;
pub mod config;
pub mod consts;
pub mod decode;
pub mod delta;
pub mod encode;
pub mod error;
pub mod header;
pub mod index;
pub mod scratch;
pub mod sketch;
pub mod tables;
pub mod window;

use block::BlockEntry;
use config::DedupeConfig;
use consts::{min_block_size, RABIN_ENTRY_SIZE, RABIN_MAX_BLOCKS, RAB_MIN_CHUNK_SIZE, RAB_POLYNOMIAL_WIN_SIZE};
use error::{ContextError, DedupeError};

pub use header::{parse_dedupe_hdr, update_dedupe_hdr, DedupeHeader};

/// The per-chunk working state: constructed once per chunk size and
/// reused across chunks via `reset`, which zeroes transient state
/// without reallocating the backing buffers.
pub struct DedupeContext {
    chunksize: u64,
    cfg: DedupeConfig,
    blocks: Vec<BlockEntry>,
    cbuf: Vec<u8>,
    valid: bool,
}

impl DedupeContext {
    /// `chunksize` is the uncompressed size of chunks this context will
    /// process; `real_chunksize` is the caller-allocated buffer size,
    /// which must include the scratch headroom reported by
    /// [`dedupe_buf_extra`].
    pub fn new(chunksize: u64, real_chunksize: u64, cfg: DedupeConfig) -> Result<Self, ContextError> {
        if !RAB_POLYNOMIAL_WIN_SIZE.is_power_of_two() || !(4..=64).contains(&RAB_POLYNOMIAL_WIN_SIZE) {
            return Err(ContextError::WindowSizeNotPowerOfTwo);
        }
        if chunksize < RAB_MIN_CHUNK_SIZE {
            return Err(ContextError::ChunkTooSmall { chunksize, minimum: RAB_MIN_CHUNK_SIZE });
        }

        let min_blk = min_block_size(cfg.rab_blk_sz);
        let blknum_max = (chunksize + min_blk - 1) / min_blk;
        if blknum_max > RABIN_MAX_BLOCKS as u64 {
            return Err(ContextError::TooManyBlocks { blknum: blknum_max, max: RABIN_MAX_BLOCKS });
        }

        Ok(DedupeContext {
            chunksize,
            cfg,
            blocks: Vec::with_capacity(blknum_max as usize),
            cbuf: vec![0u8; real_chunksize as usize],
            valid: false,
        })
    }

    /// Zeroes transient per-chunk state between calls; buffers are kept
    /// and reused rather than reallocated.
    pub fn reset(&mut self) {
        self.blocks.clear();
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The encoded chunk written by the most recent successful
    /// [`dedupe_compress`](Self::dedupe_compress) call.
    pub fn encoded(&self) -> &[u8] {
        &self.cbuf
    }

    /// Runs the full compress pipeline: chunk, sketch, index, merge,
    /// emit. Returns the on-wire index size in bytes, or `0` if dedup
    /// was not worthwhile (the context is left invalid; the caller
    /// should emit the raw chunk instead).
    pub fn dedupe_compress(&mut self, buf: &[u8], mt: bool) -> u32 {
        self.valid = false;
        self.blocks.clear();

        let avg_blk = consts::avg_block_size(self.cfg.rab_blk_sz);
        if (buf.len() as u64) < avg_blk {
            return 0;
        }

        chunker::chunk(buf, &self.cfg, &mut self.blocks);
        if self.blocks.len() <= 2 {
            return 0;
        }

        let delta_flag = self.cfg.delta_flag();
        index::hash_blocks(buf, &mut self.blocks, delta_flag, mt);

        let blknum = self.blocks.len();
        let table_len_bytes = blknum * 2 * 4;
        if self.cbuf.len() < table_len_bytes {
            self.cbuf.resize(table_len_bytes, 0);
        }
        let tail_start = self.cbuf.len() - table_len_bytes;
        let matchlen = {
            let (_, scratch) = self.cbuf.split_at_mut(tail_start);
            index::classify_blocks(buf, &mut self.blocks, &self.cfg, scratch)
        };

        if !index::is_worthwhile(matchlen, blknum) {
            return 0;
        }

        let (encoded, index_size) = encode::encode(buf, &self.blocks);
        self.cbuf = encoded;
        self.valid = true;
        index_size
    }

    /// Scans only the tail of `buf` for the last content-defined cut
    /// point, without chunking the whole buffer. Used by callers to
    /// align chunk boundaries at stream splits.
    pub fn last_boundary(&self, buf: &[u8]) -> Option<u64> {
        chunker::last_boundary(buf, &self.cfg)
    }

    /// Inverse of [`dedupe_compress`](Self::dedupe_compress).
    pub fn dedupe_decompress(&mut self, buf: &[u8]) -> Result<Vec<u8>, DedupeError> {
        match decode::decode(buf) {
            Ok(out) => {
                self.valid = true;
                Ok(out)
            }
            Err(e) => {
                self.valid = false;
                Err(e)
            }
        }
    }

    pub fn chunksize(&self) -> u64 {
        self.chunksize
    }
}

/// Advises callers how much scratch headroom `real_chunksize` must
/// include beyond `chunksize` itself: the on-wire index plus the
/// Stage-B bucket-chained hashtable carved from `cbuf`'s tail.
pub fn dedupe_buf_extra(chunksize: u64, blk_sz: i32, delta_flag: u8) -> u64 {
    let _ = delta_flag;
    let min_blk = min_block_size(consts::clamp_blk_sz(blk_sz));
    let blknum_max = (chunksize + min_blk - 1) / min_blk;
    let index_bytes = blknum_max * RABIN_ENTRY_SIZE as u64;
    let bucket_table_bytes = blknum_max * 2 * 4;
    index_bytes + bucket_table_bytes
}
