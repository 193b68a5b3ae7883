//! Common types, traits, and utilities for vconv
//!
//! This crate provides the foundational types shared by the convolution
//! kernels, the device probe and the C ABI: the error taxonomy, the SIMD
//! level registry and the TOML/environment configuration.

pub mod config;
pub mod error;
pub mod kernel_registry;

pub use config::*;
pub use error::*;
pub use kernel_registry::{SimdLevel, compile_time_simd_level};
