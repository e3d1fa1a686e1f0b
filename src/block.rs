//! `BlockEntry`: the central per-block record. `other` and `next` are
//! indices into the owning `DedupeContext::blocks` arena rather than
//! pointers, so the whole structure stays a plain `Vec` with no aliasing
//! hazards.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Similarity {
    None,
    Exact,
    Partial,
    Ref,
}

#[derive(Debug, Clone)]
pub struct BlockEntry {
    pub offset: u64,
    pub length: u32,
    pub index: u32,
    pub hash: u32,
    pub similarity_hash: u32,
    pub similar: Similarity,
    pub other: Option<u32>,
    pub next: Option<u32>,
}

impl BlockEntry {
    pub fn new(offset: u64, length: u32, index: u32) -> Self {
        BlockEntry {
            offset,
            length,
            index,
            hash: 0,
            similarity_hash: 0,
            similar: Similarity::None,
            other: None,
            next: None,
        }
    }
}
