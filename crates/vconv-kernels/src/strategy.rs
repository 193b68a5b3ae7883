//! Strategy descriptors for the vector kernels
//!
//! A [`ConvolveStrategy`] captures every way the vector variants differ from
//! one another: register width, where input samples are loaded from, how
//! kernel taps are packed, how products are accumulated, how many outputs a
//! group computes and which kernel lengths are allowed. One generic
//! implementation per register width executes any valid strategy.

use vconv_common::{KernelError, SimdLevel};

/// Outputs computed per vector group by the unrolled variants.
pub const VECTOR_LENGTH: usize = 16;

/// Kernel length the fixed-kernel variants are specialised for.
pub const FIXED_KERNEL_LENGTH: usize = 16;

/// Vector register width in `f32` lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneWidth {
    /// 128-bit SSE registers.
    Four,
    /// 256-bit AVX registers.
    Eight,
}

impl LaneWidth {
    pub const fn lanes(self) -> usize {
        match self {
            LaneWidth::Four => 4,
            LaneWidth::Eight => 8,
        }
    }
}

/// Where vector loads read input samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    /// The caller's input slice.
    Direct,
    /// `copies` shifted, aligned copies of the input (see
    /// [`ShadowCopies`](crate::cpu::scratch::ShadowCopies)).
    Shadow { copies: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadKind {
    Unaligned,
    /// Full-width aligned load. Needs one shadow copy per lane.
    Aligned,
    /// Two aligned 128-bit loads joined into one 256-bit value.
    Composite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelPacking {
    /// Each entry is one tap repeated across all lanes.
    Broadcast,
    /// Each 8-wide entry carries tap `t` in the low half and tap `t + 4` in
    /// the high half; the halves are summed after the tap loop.
    PairedHalves,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accumulate {
    /// Separate multiply then add.
    MulAdd,
    /// Fused multiply-add.
    Fused,
}

/// Kernel lengths a strategy accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelLength {
    Any,
    MultipleOf(usize),
    Fixed(usize),
}

impl KernelLength {
    pub fn accepts(self, kernel_len: usize) -> bool {
        kernel_len > 0
            && match self {
                KernelLength::Any => true,
                KernelLength::MultipleOf(n) => n > 0 && kernel_len % n == 0,
                KernelLength::Fixed(n) => kernel_len == n,
            }
    }

    /// Whether every accepted length is a multiple of `n`.
    pub fn guarantees_multiple_of(self, n: usize) -> bool {
        match self {
            KernelLength::Any => n == 1,
            KernelLength::MultipleOf(m) | KernelLength::Fixed(m) => m > 0 && m % n == 0,
        }
    }
}

impl std::fmt::Display for KernelLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelLength::Any => write!(f, "any length"),
            KernelLength::MultipleOf(n) => write!(f, "a multiple of {n}"),
            KernelLength::Fixed(n) => write!(f, "exactly {n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputMode {
    /// Store results straight into the caller's output.
    Direct,
    /// Accumulate into an aligned heap buffer, then copy out once.
    LocalThenCopy,
}

/// Parameters of a vector convolution variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConvolveStrategy {
    pub lanes: LaneWidth,
    pub source: InputSource,
    pub load: LoadKind,
    /// Outputs per vector group.
    pub block: usize,
    pub packing: KernelPacking,
    pub accumulate: Accumulate,
    pub kernel_len: KernelLength,
    pub output: OutputMode,
}

impl ConvolveStrategy {
    /// 4-lane baseline: direct unaligned loads, one register per group, any kernel.
    pub const fn narrow() -> Self {
        Self {
            lanes: LaneWidth::Four,
            source: InputSource::Direct,
            load: LoadKind::Unaligned,
            block: 4,
            packing: KernelPacking::Broadcast,
            accumulate: Accumulate::MulAdd,
            kernel_len: KernelLength::Any,
            output: OutputMode::Direct,
        }
    }

    /// 8-lane baseline: direct unaligned loads, [`VECTOR_LENGTH`] outputs per
    /// group, kernel fixed at [`FIXED_KERNEL_LENGTH`].
    pub const fn wide() -> Self {
        Self {
            lanes: LaneWidth::Eight,
            source: InputSource::Direct,
            load: LoadKind::Unaligned,
            block: VECTOR_LENGTH,
            packing: KernelPacking::Broadcast,
            accumulate: Accumulate::MulAdd,
            kernel_len: KernelLength::Fixed(FIXED_KERNEL_LENGTH),
            output: OutputMode::Direct,
        }
    }

    pub const fn with_source(mut self, source: InputSource) -> Self {
        self.source = source;
        self
    }

    pub const fn with_load(mut self, load: LoadKind) -> Self {
        self.load = load;
        self
    }

    pub const fn with_block(mut self, block: usize) -> Self {
        self.block = block;
        self
    }

    pub const fn with_packing(mut self, packing: KernelPacking) -> Self {
        self.packing = packing;
        self
    }

    pub const fn with_accumulate(mut self, accumulate: Accumulate) -> Self {
        self.accumulate = accumulate;
        self
    }

    pub const fn with_kernel_len(mut self, kernel_len: KernelLength) -> Self {
        self.kernel_len = kernel_len;
        self
    }

    pub const fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn required_simd(&self) -> SimdLevel {
        match (self.lanes, self.accumulate) {
            (LaneWidth::Four, _) => SimdLevel::Sse,
            (LaneWidth::Eight, Accumulate::MulAdd) => SimdLevel::Avx,
            (LaneWidth::Eight, Accumulate::Fused) => SimdLevel::AvxFma,
        }
    }

    /// Outputs covered by one accumulator register.
    pub fn outputs_per_accumulator(&self) -> usize {
        match self.packing {
            KernelPacking::Broadcast => self.lanes.lanes(),
            KernelPacking::PairedHalves => self.lanes.lanes() / 2,
        }
    }

    /// Accumulator registers live per group.
    pub fn accumulators(&self) -> usize {
        self.block / self.outputs_per_accumulator()
    }

    /// Taps per inner-loop step; taps are consumed in chunks of this size.
    pub fn tap_chunk(&self) -> usize {
        if self.kernel_len.guarantees_multiple_of(4) { 4 } else { 1 }
    }

    /// Check that the parameters describe an implementable variant.
    pub fn validate(&self) -> Result<(), KernelError> {
        let lanes = self.lanes.lanes();
        let per_acc = self.outputs_per_accumulator();
        if self.block == 0 || self.block % per_acc != 0 {
            return Err(KernelError::invalid(format!(
                "block of {} outputs does not split into {per_acc}-wide accumulators",
                self.block
            )));
        }
        if self.block > VECTOR_LENGTH {
            return Err(KernelError::invalid(format!(
                "block of {} outputs exceeds the {VECTOR_LENGTH}-output maximum",
                self.block
            )));
        }
        if matches!(self.kernel_len, KernelLength::MultipleOf(0) | KernelLength::Fixed(0)) {
            return Err(KernelError::invalid("kernel length rule must be non-zero"));
        }

        let copies = match self.source {
            InputSource::Direct => None,
            InputSource::Shadow { copies } => Some(copies),
        };
        if let Some(copies) = copies.filter(|c| *c != 4 && *c != 8) {
            return Err(KernelError::invalid(format!("{copies} shadow copies; expected 4 or 8")));
        }

        match self.load {
            LoadKind::Unaligned => {}
            LoadKind::Aligned if copies != Some(lanes) => {
                return Err(KernelError::invalid(format!(
                    "aligned {lanes}-lane loads need {lanes} shadow copies"
                )));
            }
            LoadKind::Aligned => {}
            LoadKind::Composite if self.lanes != LaneWidth::Eight || copies != Some(4) => {
                return Err(KernelError::invalid(
                    "composite loads need 8 lanes and 4 shadow copies",
                ));
            }
            LoadKind::Composite => {}
        }

        if self.packing == KernelPacking::PairedHalves {
            if self.lanes != LaneWidth::Eight {
                return Err(KernelError::invalid("paired kernel packing needs 8 lanes"));
            }
            if self.load != LoadKind::Unaligned {
                return Err(KernelError::invalid("paired kernel packing uses unaligned loads"));
            }
            if !self.kernel_len.guarantees_multiple_of(8) {
                return Err(KernelError::invalid(
                    "paired kernel packing needs kernel lengths that are multiples of 8",
                ));
            }
        }

        if self.accumulate == Accumulate::Fused && self.lanes != LaneWidth::Eight {
            return Err(KernelError::invalid("fused multiply-add is only used with 8 lanes"));
        }
        Ok(())
    }

    /// Check a call's kernel length against this strategy.
    pub fn check_kernel_len(&self, kernel_len: usize) -> Result<(), KernelError> {
        if self.kernel_len.accepts(kernel_len) {
            Ok(())
        } else {
            Err(KernelError::invalid(format!(
                "kernel length {kernel_len} is not supported; this variant requires {}",
                self.kernel_len
            )))
        }
    }
}
