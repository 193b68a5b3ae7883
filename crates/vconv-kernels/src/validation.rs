//! Argument checks shared by every kernel, and accuracy comparison against
//! the scalar reference.

use crate::variant::Variant;
use vconv_common::{KernelError, Result, ToleranceConfig};

/// Number of valid-mode outputs, or `None` when the kernel is empty or longer
/// than the input.
pub fn output_len(input_len: usize, kernel_len: usize) -> Option<usize> {
    if kernel_len == 0 || kernel_len > input_len {
        None
    } else {
        Some(input_len - kernel_len + 1)
    }
}

/// Validate buffer lengths for one convolution call and return the output length.
///
/// Checks run in a fixed order: empty kernel, kernel longer than input, then
/// the output length.
pub fn check_shapes(input_len: usize, kernel_len: usize, out_len: usize) -> Result<usize> {
    if kernel_len == 0 {
        return Err(KernelError::invalid("kernel must contain at least one tap").into());
    }
    if kernel_len > input_len {
        return Err(KernelError::invalid(format!(
            "kernel length {kernel_len} exceeds input length {input_len}"
        ))
        .into());
    }
    let expected = input_len - kernel_len + 1;
    if out_len != expected {
        return Err(KernelError::LengthMismatch { expected, actual: out_len }.into());
    }
    Ok(expected)
}

/// Outcome of comparing a variant's output with the reference.
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyResult {
    pub variant: &'static str,
    pub max_abs_error: f32,
    pub max_rel_error: f32,
    /// Index of the element with the largest absolute error.
    pub worst_index: Option<usize>,
    pub passed: bool,
}

/// Compare `candidate` against `reference` element by element.
pub fn compare_outputs(
    variant: &'static str,
    reference: &[f32],
    candidate: &[f32],
    tolerance: &ToleranceConfig,
) -> Result<AccuracyResult> {
    if reference.len() != candidate.len() {
        return Err(KernelError::LengthMismatch {
            expected: reference.len(),
            actual: candidate.len(),
        }
        .into());
    }

    let mut result = AccuracyResult {
        variant,
        max_abs_error: 0.0,
        max_rel_error: 0.0,
        worst_index: None,
        passed: true,
    };
    for (i, (&r, &c)) in reference.iter().zip(candidate).enumerate() {
        let abs = (r - c).abs();
        let scale = r.abs().max(c.abs());
        let rel = if scale > 0.0 { abs / scale } else { 0.0 };
        // NaN never compares greater, so track it explicitly
        if abs > result.max_abs_error || (abs.is_nan() && !result.max_abs_error.is_nan()) {
            result.max_abs_error = abs;
            result.worst_index = Some(i);
        }
        if rel > result.max_rel_error {
            result.max_rel_error = rel;
        }
        if !tolerance.accepts(r, c) {
            result.passed = false;
        }
    }
    Ok(result)
}

/// Run `variant` and the naive kernel on the same data and compare.
pub fn validate_variant(
    variant: Variant,
    input: &[f32],
    kernel: &[f32],
    tolerance: &ToleranceConfig,
) -> Result<AccuracyResult> {
    let out_len = output_len(input.len(), kernel.len()).unwrap_or(0);
    let mut reference = vec![0.0; out_len];
    Variant::Naive.convolve(input, kernel, &mut reference)?;
    let mut candidate = vec![0.0; out_len];
    variant.convolve(input, kernel, &mut candidate)?;

    let result = compare_outputs(variant.name(), &reference, &candidate, tolerance)?;
    if result.passed {
        log::debug!(
            "{} within tolerance: max_abs={:e} max_rel={:e}",
            result.variant,
            result.max_abs_error,
            result.max_rel_error
        );
    } else {
        log::warn!(
            "{} outside tolerance at index {:?}: max_abs={:e} max_rel={:e}",
            result.variant,
            result.worst_index,
            result.max_abs_error,
            result.max_rel_error
        );
    }
    Ok(result)
}
