//! Process-wide polynomial evaluation tables.
//!
//! `OUT[b]` is the contribution removed from the fingerprint when byte `b`
//! slides out of the window; `IR[b]` is the fixed irreducible polynomial
//! evaluated at `b` over the window's bit positions. Both are derived once
//! and are read-only afterwards, so a single `OnceLock` is all the
//! synchronization this needs.

use std::sync::OnceLock;

use crate::consts::{FP_POLY, POLY_MASK, RAB_POLYNOMIAL_CONST, RAB_POLYNOMIAL_WIN_SIZE};

pub struct PolyTables {
    pub out: [u64; 256],
    pub ir: [u64; 256],
}

impl PolyTables {
    fn build() -> PolyTables {
        let mut poly_pow = 1u64;
        for _ in 0..RAB_POLYNOMIAL_WIN_SIZE {
            poly_pow = (poly_pow.wrapping_mul(RAB_POLYNOMIAL_CONST)) & POLY_MASK;
        }

        let mut out = [0u64; 256];
        let mut ir = [0u64; 256];

        for b in 0u64..256 {
            out[b as usize] = (b.wrapping_mul(poly_pow)) & POLY_MASK;

            let mut term: u64 = 1;
            let mut pow: u64 = 1;
            let mut val: u64 = 1;
            for _ in 0..RAB_POLYNOMIAL_WIN_SIZE {
                if term & FP_POLY != 0 {
                    val = val.wrapping_add((pow.wrapping_mul(b)) & POLY_MASK);
                }
                pow = (pow.wrapping_mul(RAB_POLYNOMIAL_CONST)) & POLY_MASK;
                term <<= 1;
            }
            ir[b as usize] = val;
        }

        PolyTables { out, ir }
    }

    /// Returns the process-wide tables, computing them on first use.
    /// Re-entrant calls after the first are a no-op lookup.
    pub fn get() -> &'static PolyTables {
        static TABLES: OnceLock<PolyTables> = OnceLock::new();
        TABLES.get_or_init(PolyTables::build)
    }
}
