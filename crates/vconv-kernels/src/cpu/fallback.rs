//! Fallback CPU kernel implementation
//!
//! Plain scalar convolution that works on any architecture. These kernels are
//! the reference every vector variant is checked against, and the remainder
//! loop the vector variants finish with.

use crate::ConvolveProvider;
use crate::validation::check_shapes;
use vconv_common::{Result, SimdLevel};

/// Loop order used by the scalar kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarOrder {
    /// Output-major: each output accumulates its taps in ascending order.
    Naive,
    /// Tap-major: each tap is swept across the whole output in turn.
    Reversed,
}

/// Fallback kernel that works on any architecture
pub struct FallbackKernel {
    order: ScalarOrder,
}

impl FallbackKernel {
    pub const fn new(order: ScalarOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> ScalarOrder {
        self.order
    }
}

impl Default for FallbackKernel {
    fn default() -> Self {
        Self::new(ScalarOrder::Naive)
    }
}

impl ConvolveProvider for FallbackKernel {
    fn name(&self) -> &'static str {
        match self.order {
            ScalarOrder::Naive => "naive",
            ScalarOrder::Reversed => "reversed_naive",
        }
    }

    fn is_available(&self) -> bool {
        true
    }

    fn simd_level(&self) -> SimdLevel {
        SimdLevel::Scalar
    }

    fn convolve(&self, input: &[f32], kernel: &[f32], out: &mut [f32]) -> Result<()> {
        check_shapes(input.len(), kernel.len(), out.len())?;
        match self.order {
            ScalarOrder::Naive => convolve_naive(input, kernel, out),
            ScalarOrder::Reversed => convolve_reversed(input, kernel, out),
        }
        Ok(())
    }
}

/// Output-major valid convolution. Shapes must already be checked.
pub(crate) fn convolve_naive(input: &[f32], kernel: &[f32], out: &mut [f32]) {
    scalar_tail(input, kernel, out, 0);
}

/// Tap-major valid convolution. Shapes must already be checked.
pub(crate) fn convolve_reversed(input: &[f32], kernel: &[f32], out: &mut [f32]) {
    out.fill(0.0);
    for (k, &weight) in kernel.iter().rev().enumerate() {
        for (o, &x) in out.iter_mut().zip(&input[k..]) {
            *o += x * weight;
        }
    }
}

/// Compute `out[from..]` the way [`ScalarOrder::Naive`] does.
///
/// Vector kernels call this for the outputs past their last full block, so
/// those elements match the naive kernel bit for bit.
pub(crate) fn scalar_tail(input: &[f32], kernel: &[f32], out: &mut [f32], from: usize) {
    let taps = kernel.len();
    for (i, o) in out.iter_mut().enumerate().skip(from) {
        let mut sum = 0.0f32;
        for (&x, &weight) in input[i..i + taps].iter().zip(kernel.iter().rev()) {
            sum += x * weight;
        }
        *o = sum;
    }
}
