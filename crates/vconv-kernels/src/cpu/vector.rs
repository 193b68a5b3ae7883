//! Provider for the SSE/AVX strategies.
//!
//! Scratch preparation, vector-group bounds, the scalar tail and the
//! local-output copy live here; the register-level loops are in `x86`.

use crate::ConvolveProvider;
use crate::cpu::runtime_simd_level;
use crate::strategy::ConvolveStrategy;
use crate::validation::check_shapes;
use vconv_common::{KernelError, Result, SimdLevel};

/// Vector kernel executing one [`ConvolveStrategy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorKernel {
    name: &'static str,
    strategy: ConvolveStrategy,
}

impl VectorKernel {
    pub fn new(name: &'static str, strategy: ConvolveStrategy) -> Result<Self> {
        strategy.validate()?;
        Ok(Self { name, strategy })
    }

    pub fn strategy(&self) -> &ConvolveStrategy {
        &self.strategy
    }

    fn unsupported(&self) -> KernelError {
        KernelError::UnsupportedHardware {
            required: self.strategy.required_simd().to_string(),
            available: runtime_simd_level().to_string(),
        }
    }
}

impl ConvolveProvider for VectorKernel {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> bool {
        cfg!(target_arch = "x86_64") && runtime_simd_level().supports(self.strategy.required_simd())
    }

    fn simd_level(&self) -> SimdLevel {
        self.strategy.required_simd()
    }

    fn convolve(&self, input: &[f32], kernel: &[f32], out: &mut [f32]) -> Result<()> {
        check_shapes(input.len(), kernel.len(), out.len())?;
        self.strategy.check_kernel_len(kernel.len())?;
        if !self.is_available() {
            return Err(self.unsupported().into());
        }

        #[cfg(target_arch = "x86_64")]
        {
            execute(&self.strategy, input, kernel, out);
            Ok(())
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            Err(self.unsupported().into())
        }
    }
}

/// Run `strategy` on checked arguments on a CPU that supports it.
#[cfg(target_arch = "x86_64")]
fn execute(strategy: &ConvolveStrategy, input: &[f32], kernel: &[f32], out: &mut [f32]) {
    use crate::cpu::fallback::scalar_tail;
    use crate::cpu::scratch::{AlignedBuffer, BroadcastKernel, ShadowCopies};
    use crate::cpu::x86::{self, SampleSource};
    use crate::strategy::{InputSource, KernelPacking, LaneWidth, OutputMode};

    let out_len = out.len();
    let vector_end = out_len - out_len % strategy.block;

    let shadow = match strategy.source {
        InputSource::Direct => None,
        InputSource::Shadow { copies } => Some(ShadowCopies::build(input, copies)),
    };
    let weights = match strategy.packing {
        KernelPacking::Broadcast => BroadcastKernel::broadcast(kernel, strategy.lanes.lanes()),
        KernelPacking::PairedHalves => BroadcastKernel::paired(kernel),
    };
    let samples = match &shadow {
        Some(copies) => SampleSource::shadow(copies),
        None => SampleSource::direct(input),
    };

    let mut local = match strategy.output {
        OutputMode::Direct => None,
        OutputMode::LocalThenCopy => Some(AlignedBuffer::zeroed(out_len)),
    };
    log::trace!(
        "scratch: {} shadow copies, {} weight entries, local output {}",
        shadow.as_ref().map_or(0, ShadowCopies::count),
        weights.len(),
        local.as_ref().map_or(0, AlignedBuffer::len)
    );
    let dst: &mut [f32] = match local.as_mut() {
        Some(buffer) => buffer.as_mut_slice(),
        None => &mut *out,
    };

    // SAFETY: the caller checked that the CPU supports
    // `strategy.required_simd()`; shapes were checked, so every sample read
    // for outputs below `vector_end` lies inside `input` (or its shadow copy)
    // and every weight entry exists.
    unsafe {
        let groups = &mut dst[..vector_end];
        match (strategy.lanes, strategy.required_simd()) {
            (LaneWidth::Four, _) => x86::convolve_sse(strategy, &samples, &weights, kernel.len(), groups),
            (LaneWidth::Eight, SimdLevel::AvxFma) => {
                x86::convolve_avx_fma(strategy, &samples, &weights, kernel.len(), groups)
            }
            (LaneWidth::Eight, _) => x86::convolve_avx(strategy, &samples, &weights, kernel.len(), groups),
        }
    }
    scalar_tail(input, kernel, dst, vector_end);

    if let Some(buffer) = &local {
        out.copy_from_slice(buffer.as_slice());
    }
}
