//! Ordered variant preference for a given SIMD level.

use crate::variant::Variant;
use vconv_common::{KernelConfig, SimdLevel};

/// Preference order when nothing is configured. Candidates the CPU cannot run
/// are dropped; `naive` is always present and always last.
const DEFAULT_PREFERENCE: [Variant; 6] = [
    Variant::AvxUnrolledVectorUnalignedFma,
    Variant::AvxUnrolledVectorAligned,
    Variant::SseUnrolledVector,
    Variant::SseInAligned,
    Variant::SseSimple,
    Variant::Naive,
];

/// Dispatch candidates in preference order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTable {
    level: SimdLevel,
    entries: Vec<Variant>,
    preferred: Option<Variant>,
}

impl DispatchTable {
    pub fn for_level(level: SimdLevel) -> Self {
        let entries = DEFAULT_PREFERENCE.into_iter().filter(|v| v.is_supported_on(level)).collect();
        Self { level, entries, preferred: None }
    }

    /// Table for a CPU at `detected`, clamped by the configured ceiling and
    /// led by the configured variant when it can run.
    pub fn from_config(config: &KernelConfig, detected: SimdLevel) -> Self {
        let level = config.effective_simd_level(detected);
        let mut table = Self::for_level(level);
        let Some(name) = config.preferred_variant.as_deref() else {
            return table;
        };
        match name.parse::<Variant>() {
            Ok(variant) if variant.is_supported_on(level) => table.prefer(variant),
            Ok(variant) => log::warn!(
                "preferred variant {variant} needs {}, running at {level}; using default dispatch",
                variant.required_simd()
            ),
            Err(e) => log::warn!("{e}; using default dispatch"),
        }
        table
    }

    /// Move `variant` to the front.
    pub fn prefer(&mut self, variant: Variant) {
        self.entries.retain(|v| *v != variant);
        self.entries.insert(0, variant);
        self.preferred = Some(variant);
    }

    pub fn level(&self) -> SimdLevel {
        self.level
    }

    pub fn entries(&self) -> &[Variant] {
        &self.entries
    }

    pub fn preferred(&self) -> Option<Variant> {
        self.preferred
    }

    /// First entry accepting `kernel_len`.
    pub fn select(&self, kernel_len: usize) -> Option<Variant> {
        if let Some(preferred) = self.preferred.filter(|v| !v.accepts_kernel_len(kernel_len)) {
            log::debug!("preferred variant {preferred} rejects kernel length {kernel_len}; falling back");
        }
        self.entries.iter().copied().find(|v| v.accepts_kernel_len(kernel_len))
    }
}
