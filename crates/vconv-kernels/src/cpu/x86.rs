//! SSE and AVX vector-group loops.
//!
//! Each entry point handles the outputs `0..dst.len()`, where `dst.len()` is a
//! multiple of the strategy's block. Within a group, taps run in ascending
//! order in the outer loop and accumulator registers in the inner loop.
#![allow(unsafe_op_in_unsafe_fn)]

use std::arch::x86_64::*;

use crate::cpu::scratch::{BroadcastKernel, ShadowCopies};
use crate::strategy::{Accumulate, ConvolveStrategy, FIXED_KERNEL_LENGTH, KernelLength, KernelPacking, LoadKind};

const MAX_ACCUMULATORS: usize = 4;

/// Base pointers for input sample loads.
pub(crate) struct SampleSource {
    ptrs: [*const f32; 8],
    copies: usize,
}

impl SampleSource {
    pub(crate) fn direct(input: &[f32]) -> Self {
        let mut ptrs = [std::ptr::null(); 8];
        ptrs[0] = input.as_ptr();
        Self { ptrs, copies: 1 }
    }

    pub(crate) fn shadow(shadow: &ShadowCopies) -> Self {
        let mut ptrs = [std::ptr::null(); 8];
        for (j, ptr) in ptrs.iter_mut().enumerate().take(shadow.count()) {
            *ptr = shadow.copy(j).as_ptr();
        }
        Self { ptrs, copies: shadow.count() }
    }

    /// Address of input position `position`.
    #[inline(always)]
    unsafe fn at(&self, position: usize) -> *const f32 {
        if self.copies == 1 {
            self.ptrs[0].add(position)
        } else {
            let copy = position % self.copies;
            self.ptrs[copy].add(position - copy)
        }
    }
}

/// 4-lane groups for any valid [`LaneWidth::Four`](crate::strategy::LaneWidth) strategy.
#[target_feature(enable = "sse")]
pub(crate) unsafe fn convolve_sse(
    strategy: &ConvolveStrategy,
    samples: &SampleSource,
    weights: &BroadcastKernel,
    taps: usize,
    dst: &mut [f32],
) {
    match (strategy.kernel_len, strategy.tap_chunk()) {
        (KernelLength::Fixed(FIXED_KERNEL_LENGTH), _) => {
            sse_groups::<FIXED_KERNEL_LENGTH, 4>(strategy, samples, weights, taps, dst)
        }
        (_, 4) => sse_groups::<0, 4>(strategy, samples, weights, taps, dst),
        _ => sse_groups::<0, 1>(strategy, samples, weights, taps, dst),
    }
}

/// `FIXED` of zero means the tap count is only known at run time. `CHUNK`
/// must divide the tap count.
#[inline(always)]
unsafe fn sse_groups<const FIXED: usize, const CHUNK: usize>(
    strategy: &ConvolveStrategy,
    samples: &SampleSource,
    weights: &BroadcastKernel,
    taps: usize,
    dst: &mut [f32],
) {
    let taps = if FIXED != 0 { FIXED } else { taps };
    let accumulators = strategy.accumulators();
    let aligned = strategy.load == LoadKind::Aligned;
    let w = weights.as_ptr();
    let out = dst.as_mut_ptr();

    let mut i = 0;
    while i < dst.len() {
        let mut acc = [_mm_setzero_ps(); MAX_ACCUMULATORS];
        let mut t0 = 0;
        while t0 < taps {
            for l in 0..CHUNK {
                let t = t0 + l;
                let coeff = _mm_load_ps(w.add(t * 4));
                for (a, sum) in acc.iter_mut().enumerate().take(accumulators) {
                    let p = samples.at(i + 4 * a + t);
                    let x = if aligned { _mm_load_ps(p) } else { _mm_loadu_ps(p) };
                    *sum = _mm_add_ps(*sum, _mm_mul_ps(coeff, x));
                }
            }
            t0 += CHUNK;
        }
        for (a, sum) in acc.iter().enumerate().take(accumulators) {
            _mm_storeu_ps(out.add(i + 4 * a), *sum);
        }
        i += strategy.block;
    }
}

/// 8-lane groups with separate multiply and add.
#[target_feature(enable = "avx")]
pub(crate) unsafe fn convolve_avx(
    strategy: &ConvolveStrategy,
    samples: &SampleSource,
    weights: &BroadcastKernel,
    taps: usize,
    dst: &mut [f32],
) {
    debug_assert_eq!(strategy.accumulate, Accumulate::MulAdd);
    avx_dispatch::<false>(strategy, samples, weights, taps, dst)
}

/// 8-lane groups with fused multiply-add.
#[target_feature(enable = "avx,fma")]
pub(crate) unsafe fn convolve_avx_fma(
    strategy: &ConvolveStrategy,
    samples: &SampleSource,
    weights: &BroadcastKernel,
    taps: usize,
    dst: &mut [f32],
) {
    debug_assert_eq!(strategy.accumulate, Accumulate::Fused);
    avx_dispatch::<true>(strategy, samples, weights, taps, dst)
}

#[inline(always)]
unsafe fn avx_dispatch<const FUSED: bool>(
    strategy: &ConvolveStrategy,
    samples: &SampleSource,
    weights: &BroadcastKernel,
    taps: usize,
    dst: &mut [f32],
) {
    let fixed = strategy.kernel_len == KernelLength::Fixed(FIXED_KERNEL_LENGTH);
    match (strategy.packing, fixed) {
        (KernelPacking::Broadcast, true) => {
            avx_broadcast_groups::<FIXED_KERNEL_LENGTH, FUSED>(strategy, samples, weights, taps, dst)
        }
        (KernelPacking::Broadcast, false) => avx_broadcast_groups::<0, FUSED>(strategy, samples, weights, taps, dst),
        (KernelPacking::PairedHalves, true) => {
            avx_paired_groups::<FIXED_KERNEL_LENGTH, FUSED>(strategy, samples, weights, taps, dst)
        }
        (KernelPacking::PairedHalves, false) => avx_paired_groups::<0, FUSED>(strategy, samples, weights, taps, dst),
    }
}

#[inline(always)]
unsafe fn load8(samples: &SampleSource, position: usize, load: LoadKind) -> __m256 {
    let p = samples.at(position);
    match load {
        LoadKind::Unaligned => _mm256_loadu_ps(p),
        LoadKind::Aligned => _mm256_load_ps(p),
        LoadKind::Composite => {
            let lo = _mm_load_ps(p);
            let hi = _mm_load_ps(p.add(4));
            _mm256_insertf128_ps::<1>(_mm256_castps128_ps256(lo), hi)
        }
    }
}

#[inline(always)]
unsafe fn mul_add<const FUSED: bool>(sum: __m256, coeff: __m256, x: __m256) -> __m256 {
    if FUSED { _mm256_fmadd_ps(coeff, x, sum) } else { _mm256_add_ps(sum, _mm256_mul_ps(coeff, x)) }
}

#[inline(always)]
unsafe fn avx_broadcast_groups<const FIXED: usize, const FUSED: bool>(
    strategy: &ConvolveStrategy,
    samples: &SampleSource,
    weights: &BroadcastKernel,
    taps: usize,
    dst: &mut [f32],
) {
    let taps = if FIXED != 0 { FIXED } else { taps };
    let accumulators = strategy.accumulators();
    let w = weights.as_ptr();
    let out = dst.as_mut_ptr();

    let mut i = 0;
    while i < dst.len() {
        let mut acc = [_mm256_setzero_ps(); MAX_ACCUMULATORS];
        for t in 0..taps {
            let coeff = _mm256_load_ps(w.add(t * 8));
            for (a, sum) in acc.iter_mut().enumerate().take(accumulators) {
                let x = load8(samples, i + 8 * a + t, strategy.load);
                *sum = mul_add::<FUSED>(*sum, coeff, x);
            }
        }
        for (a, sum) in acc.iter().enumerate().take(accumulators) {
            _mm256_storeu_ps(out.add(i + 8 * a), *sum);
        }
        i += strategy.block;
    }
}

/// Each accumulator covers four outputs: its low half sums the even tap
/// quads and its high half the odd ones, folded together at the end.
#[inline(always)]
unsafe fn avx_paired_groups<const FIXED: usize, const FUSED: bool>(
    strategy: &ConvolveStrategy,
    samples: &SampleSource,
    weights: &BroadcastKernel,
    taps: usize,
    dst: &mut [f32],
) {
    let entries = if FIXED != 0 { FIXED / 2 } else { taps / 2 };
    let accumulators = strategy.accumulators();
    let w = weights.as_ptr();
    let out = dst.as_mut_ptr();

    let mut i = 0;
    while i < dst.len() {
        let mut acc = [_mm256_setzero_ps(); MAX_ACCUMULATORS];
        for e in 0..entries {
            let t = BroadcastKernel::paired_tap(e);
            let coeff = _mm256_load_ps(w.add(e * 8));
            for (a, sum) in acc.iter_mut().enumerate().take(accumulators) {
                let x = load8(samples, i + 4 * a + t, strategy.load);
                *sum = mul_add::<FUSED>(*sum, coeff, x);
            }
        }
        for (a, sum) in acc.iter().enumerate().take(accumulators) {
            let folded = _mm_add_ps(_mm256_castps256_ps128(*sum), _mm256_extractf128_ps::<1>(*sum));
            _mm_storeu_ps(out.add(i + 4 * a), folded);
        }
        i += strategy.block;
    }
}
