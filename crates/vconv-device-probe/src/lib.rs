//! CPU capability probing for vconv kernel dispatch.
//!
//! Provides the runtime half of variant selection: which vector instruction
//! sets the current CPU exposes, folded into a single [`SimdLevel`].

pub use vconv_common::kernel_registry::{SimdLevel, compile_time_simd_level};

/// CPU capabilities detected at runtime.
///
/// Obtained by calling [`probe_cpu`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct CpuCapabilities {
    /// Number of logical CPU cores available to the process (always ≥ 1).
    pub core_count: usize,
    /// SSE (128-bit) available (`x86_64` only).
    pub has_sse: bool,
    /// SSE3 available (`x86_64` only).
    pub has_sse3: bool,
    /// AVX (256-bit float) available (`x86_64` only).
    pub has_avx: bool,
    /// Fused multiply-add available (`x86_64` only).
    pub has_fma: bool,
    /// AVX2 available (`x86_64` only). Not required by any variant; reported
    /// for diagnostics.
    pub has_avx2: bool,
}

impl CpuCapabilities {
    /// Fold the individual flags into the best usable [`SimdLevel`].
    ///
    /// FMA only counts together with AVX, since the fused variants operate on
    /// 256-bit registers.
    pub fn simd_level(&self) -> SimdLevel {
        if self.has_avx && self.has_fma {
            SimdLevel::AvxFma
        } else if self.has_avx {
            SimdLevel::Avx
        } else if self.has_sse {
            SimdLevel::Sse
        } else {
            SimdLevel::Scalar
        }
    }
}

/// Probe the current CPU and return its capabilities.
///
/// # Examples
///
/// ```
/// use vconv_device_probe::probe_cpu;
///
/// let caps = probe_cpu();
/// assert!(caps.core_count >= 1);
/// // FMA without AVX never raises the level past SSE.
/// if !caps.has_avx {
///     assert!(caps.simd_level() <= vconv_device_probe::SimdLevel::Sse);
/// }
/// ```
pub fn probe_cpu() -> CpuCapabilities {
    let core_count = std::thread::available_parallelism().map(std::num::NonZero::get).unwrap_or(1);

    #[cfg(target_arch = "x86_64")]
    let caps = CpuCapabilities {
        core_count,
        has_sse: is_x86_feature_detected!("sse"),
        has_sse3: is_x86_feature_detected!("sse3"),
        has_avx: is_x86_feature_detected!("avx"),
        has_fma: is_x86_feature_detected!("fma"),
        has_avx2: is_x86_feature_detected!("avx2"),
    };

    #[cfg(not(target_arch = "x86_64"))]
    let caps = CpuCapabilities {
        core_count,
        has_sse: false,
        has_sse3: false,
        has_avx: false,
        has_fma: false,
        has_avx2: false,
    };

    log::trace!("probed CPU capabilities: {caps:?}");
    caps
}

/// Detect the best SIMD instruction-set level available at runtime.
///
/// Detection order: AVX+FMA > AVX > SSE on `x86_64`; scalar on every other
/// target.
///
/// ```
/// use vconv_device_probe::{SimdLevel, detect_simd_level};
///
/// let level = detect_simd_level();
/// assert!(level >= SimdLevel::Scalar);
/// ```
pub fn detect_simd_level() -> SimdLevel {
    probe_cpu().simd_level()
}

/// One-line human readable description, used in logs.
///
/// `built` is the level the binary was compiled for; runtime dispatch may
/// go above it.
pub fn capability_summary() -> String {
    let caps = probe_cpu();
    let level = caps.simd_level();
    format!(
        "simd={} lanes={} built={} cores={} sse={} sse3={} avx={} fma={} avx2={}",
        level,
        level.lane_width(),
        compile_time_simd_level(),
        caps.core_count,
        caps.has_sse,
        caps.has_sse3,
        caps.has_avx,
        caps.has_fma,
        caps.has_avx2
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(sse: bool, avx: bool, fma: bool) -> CpuCapabilities {
        CpuCapabilities {
            core_count: 1,
            has_sse: sse,
            has_sse3: sse,
            has_avx: avx,
            has_fma: fma,
            has_avx2: false,
        }
    }

    #[test]
    fn level_folding() {
        assert_eq!(caps(false, false, false).simd_level(), SimdLevel::Scalar);
        assert_eq!(caps(true, false, false).simd_level(), SimdLevel::Sse);
        assert_eq!(caps(true, false, true).simd_level(), SimdLevel::Sse);
        assert_eq!(caps(true, true, false).simd_level(), SimdLevel::Avx);
        assert_eq!(caps(true, true, true).simd_level(), SimdLevel::AvxFma);
    }

    #[test]
    fn detection_matches_probe() {
        assert_eq!(detect_simd_level(), probe_cpu().simd_level());
    }
}
