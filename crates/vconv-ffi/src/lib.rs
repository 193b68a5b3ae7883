//! C API bindings for vconv
//!
//! Every convolution variant is exported as
//! `int vconv_convolve_<variant>(const float* in, float* out, int length, const float* kernel, int kernel_length)`,
//! alongside an automatically dispatched entry point and helpers for
//! enumerating variants. Failures are reported as negative status codes with a
//! per-thread message available from `vconv_last_error`.

pub mod c_api;

pub use c_api::*;
