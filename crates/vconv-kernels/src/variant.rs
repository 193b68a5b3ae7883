//! The catalogue of named convolution variants.

use std::fmt;
use std::str::FromStr;

use crate::ConvolveProvider;
use crate::cpu::{FallbackKernel, ScalarOrder, VectorKernel};
use crate::strategy::{
    Accumulate, ConvolveStrategy, FIXED_KERNEL_LENGTH, InputSource, KernelLength, KernelPacking,
    LoadKind, OutputMode,
};
use vconv_common::{KernelError, Result, SimdLevel};

const SHADOW_4: InputSource = InputSource::Shadow { copies: 4 };
const SHADOW_8: InputSource = InputSource::Shadow { copies: 8 };
const FIXED: KernelLength = KernelLength::Fixed(FIXED_KERNEL_LENGTH);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantFamily {
    Scalar,
    /// 4-lane SSE.
    Narrow,
    /// 8-lane AVX.
    Wide,
}

/// Named convolution variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Naive,
    ReversedNaive,
    SseSimple,
    SsePartialUnroll,
    SseInAligned,
    SseInAlignedFixedKernel,
    SseUnrolledAvxVector,
    SseUnrolledVector,
    AvxUnrolledVector,
    AvxUnrolledVectorUnaligned,
    AvxUnrolledVectorUnalignedFma,
    AvxUnrolledVectorM128Load,
    AvxUnrolledVectorAligned,
    AvxUnrolledVectorPartialAligned,
    AvxUnrolledVectorLocalOutput,
}

impl Variant {
    /// Every variant, in catalogue order. Indices into this array are stable.
    pub const ALL: [Variant; 15] = [
        Variant::Naive,
        Variant::ReversedNaive,
        Variant::SseSimple,
        Variant::SsePartialUnroll,
        Variant::SseInAligned,
        Variant::SseInAlignedFixedKernel,
        Variant::SseUnrolledAvxVector,
        Variant::SseUnrolledVector,
        Variant::AvxUnrolledVector,
        Variant::AvxUnrolledVectorUnaligned,
        Variant::AvxUnrolledVectorUnalignedFma,
        Variant::AvxUnrolledVectorM128Load,
        Variant::AvxUnrolledVectorAligned,
        Variant::AvxUnrolledVectorPartialAligned,
        Variant::AvxUnrolledVectorLocalOutput,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Variant::Naive => "naive",
            Variant::ReversedNaive => "reversed_naive",
            Variant::SseSimple => "sse_simple",
            Variant::SsePartialUnroll => "sse_partial_unroll",
            Variant::SseInAligned => "sse_in_aligned",
            Variant::SseInAlignedFixedKernel => "sse_in_aligned_fixed_kernel",
            Variant::SseUnrolledAvxVector => "sse_unrolled_avx_vector",
            Variant::SseUnrolledVector => "sse_unrolled_vector",
            Variant::AvxUnrolledVector => "avx_unrolled_vector",
            Variant::AvxUnrolledVectorUnaligned => "avx_unrolled_vector_unaligned",
            Variant::AvxUnrolledVectorUnalignedFma => "avx_unrolled_vector_unaligned_fma",
            Variant::AvxUnrolledVectorM128Load => "avx_unrolled_vector_m128_load",
            Variant::AvxUnrolledVectorAligned => "avx_unrolled_vector_aligned",
            Variant::AvxUnrolledVectorPartialAligned => "avx_unrolled_vector_partial_aligned",
            Variant::AvxUnrolledVectorLocalOutput => "avx_unrolled_vector_local_output",
        }
    }

    /// Position in [`Variant::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn family(self) -> VariantFamily {
        match self {
            Variant::Naive | Variant::ReversedNaive => VariantFamily::Scalar,
            Variant::SseSimple
            | Variant::SsePartialUnroll
            | Variant::SseInAligned
            | Variant::SseInAlignedFixedKernel
            | Variant::SseUnrolledAvxVector
            | Variant::SseUnrolledVector => VariantFamily::Narrow,
            _ => VariantFamily::Wide,
        }
    }

    /// Scalar loop order, for the two scalar variants.
    pub fn scalar_order(self) -> Option<ScalarOrder> {
        match self {
            Variant::Naive => Some(ScalarOrder::Naive),
            Variant::ReversedNaive => Some(ScalarOrder::Reversed),
            _ => None,
        }
    }

    /// Strategy parameters, for the vector variants.
    pub fn strategy(self) -> Option<ConvolveStrategy> {
        let narrow = ConvolveStrategy::narrow();
        let narrow_aligned = narrow.with_source(SHADOW_4).with_load(LoadKind::Aligned);
        let wide = ConvolveStrategy::wide();
        let strategy = match self {
            Variant::Naive | Variant::ReversedNaive => return None,
            Variant::SseSimple => narrow,
            Variant::SsePartialUnroll => narrow.with_kernel_len(KernelLength::MultipleOf(4)),
            Variant::SseInAligned => narrow_aligned.with_kernel_len(KernelLength::MultipleOf(4)),
            Variant::SseInAlignedFixedKernel => narrow_aligned.with_kernel_len(FIXED),
            Variant::SseUnrolledAvxVector => narrow_aligned.with_kernel_len(FIXED).with_block(8),
            Variant::SseUnrolledVector => narrow_aligned.with_kernel_len(FIXED).with_block(16),
            Variant::AvxUnrolledVector => wide.with_source(SHADOW_4),
            Variant::AvxUnrolledVectorUnaligned => wide,
            Variant::AvxUnrolledVectorUnalignedFma => wide.with_accumulate(Accumulate::Fused),
            Variant::AvxUnrolledVectorM128Load => wide.with_source(SHADOW_4).with_load(LoadKind::Composite),
            Variant::AvxUnrolledVectorAligned => wide.with_source(SHADOW_8).with_load(LoadKind::Aligned),
            Variant::AvxUnrolledVectorPartialAligned => {
                wide.with_source(SHADOW_4).with_packing(KernelPacking::PairedHalves)
            }
            Variant::AvxUnrolledVectorLocalOutput => {
                wide.with_source(SHADOW_4).with_output(OutputMode::LocalThenCopy)
            }
        };
        Some(strategy)
    }

    pub fn required_simd(self) -> SimdLevel {
        self.strategy().map_or(SimdLevel::Scalar, |s| s.required_simd())
    }

    /// Whether a CPU at `level` can run this variant.
    pub fn is_supported_on(self, level: SimdLevel) -> bool {
        level.supports(self.required_simd())
    }

    pub fn accepts_kernel_len(self, kernel_len: usize) -> bool {
        match self.strategy() {
            Some(strategy) => strategy.kernel_len.accepts(kernel_len),
            None => kernel_len > 0,
        }
    }

    /// Boxed provider running this variant.
    pub fn provider(self) -> Result<Box<dyn ConvolveProvider>> {
        match (self.scalar_order(), self.strategy()) {
            (Some(order), _) => Ok(Box::new(FallbackKernel::new(order))),
            (None, Some(strategy)) => Ok(Box::new(VectorKernel::new(self.name(), strategy)?)),
            (None, None) => Err(KernelError::NoProvider.into()),
        }
    }

    /// Convolve `input` with `kernel` into `out` using this variant.
    ///
    /// # Errors
    ///
    /// * [`KernelError::InvalidArgument`] for an empty kernel, a kernel longer
    ///   than the input, or a kernel length this variant does not accept.
    /// * [`KernelError::LengthMismatch`] when `out.len() != input.len() - kernel.len() + 1`.
    /// * [`KernelError::UnsupportedHardware`] when the CPU lacks the variant's
    ///   instruction set.
    pub fn convolve(self, input: &[f32], kernel: &[f32], out: &mut [f32]) -> Result<()> {
        match (self.scalar_order(), self.strategy()) {
            (Some(order), _) => FallbackKernel::new(order).convolve(input, kernel, out),
            (None, Some(strategy)) => VectorKernel::new(self.name(), strategy)?.convolve(input, kernel, out),
            (None, None) => Err(KernelError::NoProvider.into()),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = KernelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| KernelError::UnknownVariant { name: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalogue_has_fifteen_unique_names() {
        let names: HashSet<_> = Variant::ALL.iter().map(|v| v.name()).collect();
        assert_eq!(names.len(), 15);
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for v in Variant::ALL {
            assert_eq!(v.name().parse::<Variant>().unwrap(), v);
        }
        assert_eq!(" SSE_SIMPLE ".parse::<Variant>().unwrap(), Variant::SseSimple);
        assert!(matches!("avx512".parse::<Variant>(), Err(KernelError::UnknownVariant { .. })));
    }

    #[test]
    fn index_is_position_in_catalogue() {
        for (i, v) in Variant::ALL.into_iter().enumerate() {
            assert_eq!(v.index(), i, "{v}");
        }
        assert_eq!(Variant::AvxUnrolledVectorLocalOutput.index(), Variant::ALL.len() - 1);
    }

    #[test]
    fn every_vector_strategy_is_valid() {
        for v in Variant::ALL {
            if let Some(strategy) = v.strategy() {
                strategy.validate().unwrap_or_else(|e| panic!("{v}: {e}"));
            }
        }
    }

    #[test]
    fn families_and_levels() {
        let count = |f| Variant::ALL.iter().filter(|v| v.family() == f).count();
        assert_eq!(count(VariantFamily::Scalar), 2);
        assert_eq!(count(VariantFamily::Narrow), 6);
        assert_eq!(count(VariantFamily::Wide), 7);
        for v in Variant::ALL {
            let expected = match v.family() {
                VariantFamily::Scalar => SimdLevel::Scalar,
                VariantFamily::Narrow => SimdLevel::Sse,
                VariantFamily::Wide if v == Variant::AvxUnrolledVectorUnalignedFma => SimdLevel::AvxFma,
                VariantFamily::Wide => SimdLevel::Avx,
            };
            assert_eq!(v.required_simd(), expected, "{v}");
        }
    }

    #[test]
    fn kernel_length_acceptance() {
        assert!(Variant::Naive.accepts_kernel_len(5));
        assert!(Variant::SseSimple.accepts_kernel_len(5));
        assert!(!Variant::SsePartialUnroll.accepts_kernel_len(5));
        assert!(Variant::SseInAligned.accepts_kernel_len(12));
        assert!(!Variant::SseInAlignedFixedKernel.accepts_kernel_len(12));
        for v in Variant::ALL.into_iter().filter(|v| v.family() == VariantFamily::Wide) {
            assert!(v.accepts_kernel_len(16), "{v}");
            assert!(!v.accepts_kernel_len(8), "{v}");
        }
        assert!(Variant::ALL.iter().all(|v| !v.accepts_kernel_len(0)));
    }

    #[test]
    fn unrolled_sse_blocks() {
        assert_eq!(Variant::SseUnrolledAvxVector.strategy().unwrap().block, 8);
        assert_eq!(Variant::SseUnrolledVector.strategy().unwrap().block, 16);
        assert_eq!(Variant::SseSimple.strategy().unwrap().block, 4);
    }

    #[test]
    fn providers_carry_variant_names() {
        for v in Variant::ALL {
            let provider = v.provider().unwrap();
            assert_eq!(provider.name(), v.name());
            assert_eq!(provider.simd_level(), v.required_simd());
        }
    }
}
