//! CPU kernel implementations

use std::sync::OnceLock;
use vconv_common::SimdLevel;

pub mod fallback;
pub mod scratch;
pub mod vector;
#[cfg(target_arch = "x86_64")]
pub(crate) mod x86;

pub use fallback::{FallbackKernel, ScalarOrder};
pub use vector::VectorKernel;

static RUNTIME_LEVEL: OnceLock<SimdLevel> = OnceLock::new();

/// SIMD level of the running CPU, probed once per process.
pub fn runtime_simd_level() -> SimdLevel {
    *RUNTIME_LEVEL.get_or_init(|| {
        let level = vconv_device_probe::detect_simd_level();
        log::debug!("runtime SIMD level: {level} ({})", vconv_device_probe::capability_summary());
        level
    })
}
