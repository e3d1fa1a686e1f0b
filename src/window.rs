//! The rolling window: a byte-wide shift register of fixed size `W`.
//!
//! Two implementations exist: a scalar circular byte array, always
//! available, and an SSE4.1 `__m128i` shift register used when `W == 16`
//! and the CPU supports it. Both must produce byte-identical sequences of
//! evicted bytes for the same input (tested below).

use crate::consts::RAB_POLYNOMIAL_WIN_SIZE;

const WINDOW_MASK: usize = RAB_POLYNOMIAL_WIN_SIZE - 1;

struct ScalarWindow {
    queue: [u8; RAB_POLYNOMIAL_WIN_SIZE],
    pos: usize,
}

impl ScalarWindow {
    fn new() -> Self {
        ScalarWindow {
            queue: [0; RAB_POLYNOMIAL_WIN_SIZE],
            pos: 0,
        }
    }

    fn reset(&mut self) {
        self.queue = [0; RAB_POLYNOMIAL_WIN_SIZE];
        self.pos = 0;
    }

    #[inline]
    fn push(&mut self, b: u8) -> u8 {
        let evicted = self.queue[self.pos];
        self.queue[self.pos] = b;
        self.pos = (self.pos + 1) & WINDOW_MASK;
        evicted
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        use std::arch::x86_64::*;

        struct SimdWindow {
            window: __m128i,
        }

        impl SimdWindow {
            fn new() -> Self {
                SimdWindow { window: unsafe { _mm_setzero_si128() } }
            }

            fn reset(&mut self) {
                self.window = unsafe { _mm_setzero_si128() };
            }

            #[inline]
            fn push(&mut self, b: u8) -> u8 {
                unsafe {
                    let evicted = (_mm_extract_epi32::<3>(self.window) as u32 >> 24) as u8;
                    let incoming = _mm_cvtsi32_si128(b as i32);
                    self.window = _mm_or_si128(_mm_slli_si128::<1>(self.window), incoming);
                    evicted
                }
            }
        }
    }
}

enum Backend {
    Scalar(ScalarWindow),
    #[cfg(target_arch = "x86_64")]
    Simd(SimdWindow),
}

/// A `W`-byte sliding window with O(1) push/evict. `RollingWindow::new`
/// picks the SSE4.1 backend when available and `W == 16`; otherwise it
/// falls back to the scalar circular buffer.
pub struct RollingWindow {
    backend: Backend,
}

impl RollingWindow {
    pub fn new() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if RAB_POLYNOMIAL_WIN_SIZE == 16 && is_x86_feature_detected!("sse4.1") {
                return RollingWindow {
                    backend: Backend::Simd(SimdWindow::new()),
                };
            }
        }
        RollingWindow {
            backend: Backend::Scalar(ScalarWindow::new()),
        }
    }

    /// Force the scalar backend regardless of CPU features; used to verify
    /// the two implementations agree.
    #[cfg(test)]
    fn new_scalar() -> Self {
        RollingWindow {
            backend: Backend::Scalar(ScalarWindow::new()),
        }
    }

    pub fn reset(&mut self) {
        match &mut self.backend {
            Backend::Scalar(w) => w.reset(),
            #[cfg(target_arch = "x86_64")]
            Backend::Simd(w) => w.reset(),
        }
    }

    #[inline]
    pub fn push(&mut self, b: u8) -> u8 {
        match &mut self.backend {
            Backend::Scalar(w) => w.push(b),
            #[cfg(target_arch = "x86_64")]
            Backend::Simd(w) => w.push(b),
        }
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        RollingWindow::new()
    }
}
