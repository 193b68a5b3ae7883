//! Valid-mode 1D convolution kernels for single-precision signals
//!
//! Every kernel computes `out[i] = Σ_k input[i + k] · kernel[K - 1 - k]` for
//! `i` in `0..=N-K`. The kernels differ only in how they get there: a
//! scalar reference, and a family of SSE/AVX strategies described by
//! [`ConvolveStrategy`] and named by [`Variant`].

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use vconv_common::{KernelConfig, KernelError, Result, SimdLevel};

pub mod cpu;
pub mod dispatch;
pub mod strategy;
pub mod validation;
pub mod variant;

pub use cpu::{FallbackKernel, ScalarOrder, VectorKernel, runtime_simd_level};
pub use dispatch::DispatchTable;
pub use strategy::{
    Accumulate, ConvolveStrategy, FIXED_KERNEL_LENGTH, InputSource, KernelLength, KernelPacking,
    LaneWidth, LoadKind, OutputMode, VECTOR_LENGTH,
};
pub use validation::{AccuracyResult, check_shapes, compare_outputs, output_len, validate_variant};
pub use variant::{Variant, VariantFamily};

/// Convolution provider trait
pub trait ConvolveProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_available(&self) -> bool;
    /// Instruction-set level this provider needs.
    fn simd_level(&self) -> SimdLevel;
    /// Fill `out` (length `input.len() - kernel.len() + 1`) with the valid
    /// convolution of `input` and `kernel`.
    fn convolve(&self, input: &[f32], kernel: &[f32], out: &mut [f32]) -> Result<()>;
}

/// Kernel manager selecting the best variant for the running CPU.
///
/// The dispatch table is resolved once at construction; selection per call
/// only depends on the kernel length.
pub struct KernelManager {
    level: SimdLevel,
    table: DispatchTable,
    // index into `Variant::ALL`, plus one; zero means nothing selected yet
    last_selected: AtomicUsize,
}

impl KernelManager {
    /// Probe the CPU and read `VCONV_*` overrides from the environment.
    pub fn new() -> Self {
        let config = KernelConfig::from_env().unwrap_or_else(|e| {
            log::warn!("ignoring invalid VCONV_* configuration: {e}");
            KernelConfig::default()
        });
        Self::with_config(&config)
    }

    pub fn with_config(config: &KernelConfig) -> Self {
        Self::with_level(runtime_simd_level(), config)
    }

    /// Build a manager capped at `detected`. The level never exceeds what the
    /// running CPU supports, and is further clamped by `config.max_simd_level`.
    pub fn with_level(detected: SimdLevel, config: &KernelConfig) -> Self {
        let runtime = runtime_simd_level();
        if detected > runtime {
            log::warn!("requested SIMD level {detected} exceeds this CPU ({runtime}); using {runtime}");
        }
        let table = DispatchTable::from_config(config, detected.min(runtime));
        log::info!(
            "kernel manager: simd={} dispatch=[{}]",
            table.level(),
            table.entries().iter().map(|v| v.name()).collect::<Vec<_>>().join(",")
        );
        Self { level: table.level(), table, last_selected: AtomicUsize::new(0) }
    }

    /// Effective SIMD level after the configured ceiling.
    pub fn simd_level(&self) -> SimdLevel {
        self.level
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    /// Pick the variant used for kernels of length `kernel_len`.
    pub fn select(&self, kernel_len: usize) -> Result<Variant> {
        if kernel_len == 0 {
            return Err(KernelError::invalid("kernel must contain at least one tap").into());
        }
        let variant = self.table.select(kernel_len).ok_or(KernelError::NoProvider)?;
        let index = variant.index();
        if self.last_selected.swap(index + 1, Ordering::Relaxed) != index + 1 {
            log::debug!("selected variant {variant} for kernel length {kernel_len}");
        }
        Ok(variant)
    }

    /// Convolve with the best variant for this CPU and kernel length.
    pub fn convolve(&self, input: &[f32], kernel: &[f32], out: &mut [f32]) -> Result<()> {
        check_shapes(input.len(), kernel.len(), out.len())?;
        self.select(kernel.len())?.convolve(input, kernel, out)
    }

    /// Name of the most recently selected variant.
    pub fn selected_variant_name(&self) -> Option<&'static str> {
        match self.last_selected.load(Ordering::Relaxed) {
            0 => None,
            n => Variant::ALL.get(n - 1).map(|v| v.name()),
        }
    }

    /// Every variant this manager's SIMD level can run, dispatch candidates or not.
    pub fn list_available_variants(&self) -> Vec<&'static str> {
        Variant::ALL.iter().filter(|v| v.is_supported_on(self.level)).map(|v| v.name()).collect()
    }
}

impl Default for KernelManager {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_MANAGER: OnceLock<KernelManager> = OnceLock::new();

/// Process-wide manager, built from the CPU probe and `VCONV_*` environment
/// on first use.
pub fn global_manager() -> &'static KernelManager {
    GLOBAL_MANAGER.get_or_init(KernelManager::new)
}

/// Select the best CPU provider for a kernel of length `kernel_len`.
pub fn select_cpu_kernel(kernel_len: usize) -> Result<Box<dyn ConvolveProvider>> {
    global_manager().select(kernel_len)?.provider()
}

/// Convolve using an automatically selected variant.
///
/// ```
/// let input = [1.0f32, 2.0, 3.0, 4.0];
/// let kernel = [1.0f32, 1.0];
/// let mut out = [0.0f32; 3];
/// vconv_kernels::convolve(&input, &kernel, &mut out).unwrap();
/// assert_eq!(out, [3.0, 5.0, 7.0]);
/// ```
pub fn convolve(input: &[f32], kernel: &[f32], out: &mut [f32]) -> Result<()> {
    global_manager().convolve(input, kernel, out)
}
