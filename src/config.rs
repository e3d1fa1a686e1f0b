//! Per-chunk configuration for one dedup pass.

use crate::consts::{avg_block_size, clamp_blk_sz};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaMode {
    Off,
    Normal,
    Extra,
    Extra2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressOp {
    Compress,
    Decompress,
}

/// Caller-facing dedup parameters for one chunk-processing pass.
#[derive(Debug, Clone)]
pub struct DedupeConfig {
    pub rab_blk_sz: i32,
    pub delta_mode: DeltaMode,
    pub fixed_flag: bool,
    pub deltac_min_distance: u64,
    pub file_version: u32,
    pub op: CompressOp,
}

impl DedupeConfig {
    pub fn new(rab_blk_sz: i32, delta_mode: DeltaMode, fixed_flag: bool, op: CompressOp) -> Self {
        DedupeConfig {
            rab_blk_sz: clamp_blk_sz(rab_blk_sz),
            delta_mode: if fixed_flag { DeltaMode::Off } else { delta_mode },
            fixed_flag,
            deltac_min_distance: 2 * 1024 * 1024,
            file_version: 1,
            op,
        }
    }

    pub fn with_min_distance(mut self, distance: u64) -> Self {
        self.deltac_min_distance = distance;
        self
    }

    /// Resolves the public `DeltaMode` to the internal `delta_flag ∈
    /// {0,1,2,3}` used to pick the K-smallest percentage in the sketcher.
    pub fn delta_flag(&self) -> u8 {
        match self.delta_mode {
            DeltaMode::Off => 0,
            DeltaMode::Normal => {
                let avg = avg_block_size(self.rab_blk_sz);
                if avg < (1 << 14) {
                    1
                } else if avg < (1 << 16) {
                    2
                } else {
                    3
                }
            }
            DeltaMode::Extra => 2,
            DeltaMode::Extra2 => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_flag_normal_scales_with_avg_block_size() {
        // blk_sz=1 -> avg 16KiB -> not < 16KiB -> bucket 2
        let cfg = DedupeConfig::new(1, DeltaMode::Normal, false, CompressOp::Compress);
        assert_eq!(cfg.delta_flag(), 2);

        // blk_sz=2 -> avg 32KiB -> bucket 2
        let cfg = DedupeConfig::new(2, DeltaMode::Normal, false, CompressOp::Compress);
        assert_eq!(cfg.delta_flag(), 2);

        // blk_sz=4 -> avg 128KiB -> bucket 3
        let cfg = DedupeConfig::new(4, DeltaMode::Normal, false, CompressOp::Compress);
        assert_eq!(cfg.delta_flag(), 3);
    }

    #[test]
    fn delta_flag_extra_is_pinned() {
        let cfg = DedupeConfig::new(4, DeltaMode::Extra, false, CompressOp::Compress);
        assert_eq!(cfg.delta_flag(), 2);
    }

    #[test]
    fn fixed_mode_forces_delta_off() {
        let cfg = DedupeConfig::new(2, DeltaMode::Normal, true, CompressOp::Compress);
        assert_eq!(cfg.delta_flag(), 0);
    }
}
