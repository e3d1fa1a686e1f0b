//! Error types. Configuration and allocation failures abort context
//! creation; decode failures are reported through a `Result` and also
//! clear `DedupeContext::valid` rather than unwinding.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ContextError {
    #[error("rolling window size must be a power of two in [4, 64]")]
    WindowSizeNotPowerOfTwo,

    #[error("chunk size {chunksize} is below the minimum of {minimum} bytes")]
    ChunkTooSmall { chunksize: u64, minimum: u64 },

    #[error("chunk size too large for dedup: {blknum} blocks exceeds the cap of {max}")]
    TooManyBlocks { blknum: u64, max: u32 },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DedupeError {
    #[error("corrupted chunk: dangling index reference")]
    CorruptedChunk,

    #[error("corrupted chunk: patch application failed")]
    PatchFailed,

    #[error("dedup data overflows chunk")]
    DataOverflow,

    #[error("too little dedup data processed")]
    ShortData,
}
