//! SIMD level registry: single source of truth for instruction-set tiers.
//!
//! Levels are totally ordered. On x86_64 each level implies the previous
//! one, so "can this CPU run a variant needing level X" is `detected >= X`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SIMD instruction set level available at compile or runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimdLevel {
    /// No SIMD; scalar fallback only.
    Scalar,
    /// x86 SSE (128-bit, 4 lanes of f32).
    Sse,
    /// x86 AVX (256-bit, 8 lanes of f32).
    Avx,
    /// x86 AVX with fused multiply-add.
    AvxFma,
}

impl SimdLevel {
    /// All levels, lowest first.
    pub const ALL: [SimdLevel; 4] = [SimdLevel::Scalar, SimdLevel::Sse, SimdLevel::Avx, SimdLevel::AvxFma];

    /// Number of f32 lanes in one vector register at this level.
    pub const fn lane_width(self) -> usize {
        match self {
            SimdLevel::Scalar => 1,
            SimdLevel::Sse => 4,
            SimdLevel::Avx | SimdLevel::AvxFma => 8,
        }
    }

    /// Whether a CPU at this level can run code requiring `required`.
    pub fn supports(self, required: SimdLevel) -> bool {
        self >= required
    }
}

impl fmt::Display for SimdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimdLevel::Scalar => write!(f, "scalar"),
            SimdLevel::Sse => write!(f, "sse"),
            SimdLevel::Avx => write!(f, "avx"),
            SimdLevel::AvxFma => write!(f, "avx-fma"),
        }
    }
}

impl FromStr for SimdLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scalar" | "none" => Ok(SimdLevel::Scalar),
            "sse" | "sse3" => Ok(SimdLevel::Sse),
            "avx" => Ok(SimdLevel::Avx),
            "avx-fma" | "avx_fma" | "fma" => Ok(SimdLevel::AvxFma),
            other => Err(format!("unknown SIMD level: {other}")),
        }
    }
}

/// Best SIMD level the current build targets without runtime probing.
///
/// This reflects `-C target-feature` flags only; runtime detection lives in
/// `vconv-device-probe`.
pub const fn compile_time_simd_level() -> SimdLevel {
    if cfg!(all(target_arch = "x86_64", target_feature = "avx", target_feature = "fma")) {
        SimdLevel::AvxFma
    } else if cfg!(all(target_arch = "x86_64", target_feature = "avx")) {
        SimdLevel::Avx
    } else if cfg!(all(target_arch = "x86_64", target_feature = "sse")) {
        SimdLevel::Sse
    } else {
        SimdLevel::Scalar
    }
}
