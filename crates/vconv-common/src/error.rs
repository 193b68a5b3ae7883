//! Error types for vconv
//!
//! Every kernel is a leaf computation: preconditions are checked once at
//! entry and reported through [`KernelError`] before any output is written.
//! None of these errors are retryable; they describe caller input.

use thiserror::Error;

use crate::config::ConfigError;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, VconvError>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum VconvError {
    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl VconvError {
    /// Returns the kernel error, if this is one.
    pub fn as_kernel(&self) -> Option<&KernelError> {
        match self {
            VconvError::Kernel(e) => Some(e),
            VconvError::Config(_) => None,
        }
    }
}

/// Errors raised by the convolution kernels and their selection layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// The output buffer does not hold exactly `N - K + 1` samples.
    #[error("output length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Kernel empty, longer than the input, or rejected by the variant.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("unsupported hardware: required {required}, available {available}")]
    UnsupportedHardware { required: String, available: String },

    #[error("no kernel provider available")]
    NoProvider,

    #[error("unknown kernel variant: {name}")]
    UnknownVariant { name: String },
}

impl KernelError {
    /// Shorthand for [`KernelError::InvalidArgument`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        KernelError::InvalidArgument { reason: reason.into() }
    }
}
