//! Kernel selection configuration.
//!
//! Loads [`KernelConfig`] from a TOML file (`vconv.toml`) with environment
//! variable overrides via `VCONV_*` prefixed variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::kernel_registry::SimdLevel;

/// Default relative tolerance for cross-variant equivalence.
pub const DEFAULT_RELATIVE_TOLERANCE: f32 = 1e-5;

/// Default absolute tolerance for cross-variant equivalence.
pub const DEFAULT_ABSOLUTE_TOLERANCE: f32 = 1e-6;

const MAX_VARIANT_NAME_LEN: usize = 64;

/// Numeric tolerance used when comparing a variant against the scalar reference.
///
/// Two samples `a` and `b` are equivalent when
/// `|a - b| <= absolute + relative * max(|a|, |b|)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    /// Override: `VCONV_TOLERANCE_REL`
    pub relative: f32,
    /// Override: `VCONV_TOLERANCE_ABS`
    pub absolute: f32,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self { relative: DEFAULT_RELATIVE_TOLERANCE, absolute: DEFAULT_ABSOLUTE_TOLERANCE }
    }
}

impl ToleranceConfig {
    /// Whether `a` and `b` agree within this tolerance.
    pub fn accepts(&self, a: f32, b: f32) -> bool {
        if a == b {
            return true;
        }
        let scale = a.abs().max(b.abs());
        (a - b).abs() <= self.absolute + self.relative * scale
    }
}

/// Kernel selection configuration loaded from TOML with environment overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Variant to try first (e.g. `"avx_unrolled_vector_aligned"`).
    /// `None` lets the dispatch table decide.
    /// Override: `VCONV_KERNEL_VARIANT` (`auto` clears it)
    pub preferred_variant: Option<String>,

    /// Ceiling on the detected SIMD level; `scalar` forces the reference path.
    /// Override: `VCONV_MAX_SIMD`
    pub max_simd_level: Option<SimdLevel>,

    /// Equivalence tolerance against the scalar reference.
    pub tolerance: ToleranceConfig,
}

/// Errors that can occur when loading or validating a [`KernelConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid environment override {key}={value}: {reason}")]
    EnvOverride { key: String, value: String, reason: String },
}

impl KernelConfig {
    /// Render the default configuration as a TOML string.
    pub fn default_toml() -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }

    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields, then apply environment variable overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut cfg: KernelConfig = toml::from_str(toml_str)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load only from environment variables, starting from defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tol = &self.tolerance;
        if !tol.relative.is_finite() || tol.relative < 0.0 {
            return Err(ConfigError::Validation(format!(
                "tolerance.relative must be finite and >= 0, got {}",
                tol.relative
            )));
        }
        if tol.relative >= 1.0 {
            return Err(ConfigError::Validation(format!(
                "tolerance.relative must be < 1, got {}",
                tol.relative
            )));
        }
        if !tol.absolute.is_finite() || tol.absolute < 0.0 {
            return Err(ConfigError::Validation(format!(
                "tolerance.absolute must be finite and >= 0, got {}",
                tol.absolute
            )));
        }
        if let Some(name) = &self.preferred_variant {
            if name.is_empty() {
                return Err(ConfigError::Validation("preferred_variant must not be empty".into()));
            }
            if name.len() > MAX_VARIANT_NAME_LEN {
                return Err(ConfigError::Validation(format!(
                    "preferred_variant must be <= {MAX_VARIANT_NAME_LEN} characters"
                )));
            }
        }
        Ok(())
    }

    /// Apply `VCONV_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("VCONV_KERNEL_VARIANT") {
            let trimmed = val.trim();
            self.preferred_variant =
                if trimmed.eq_ignore_ascii_case("auto") { None } else { Some(trimmed.to_string()) };
        }

        if let Ok(val) = std::env::var("VCONV_MAX_SIMD") {
            let level = val.parse::<SimdLevel>().map_err(|reason| ConfigError::EnvOverride {
                key: "VCONV_MAX_SIMD".into(),
                value: val.clone(),
                reason,
            })?;
            self.max_simd_level = Some(level);
        }

        if let Ok(val) = std::env::var("VCONV_TOLERANCE_REL") {
            self.tolerance.relative = parse_f32("VCONV_TOLERANCE_REL", &val)?;
        }

        if let Ok(val) = std::env::var("VCONV_TOLERANCE_ABS") {
            self.tolerance.absolute = parse_f32("VCONV_TOLERANCE_ABS", &val)?;
        }

        Ok(())
    }

    /// The detected level clamped to the configured ceiling.
    pub fn effective_simd_level(&self, detected: SimdLevel) -> SimdLevel {
        match self.max_simd_level {
            Some(ceiling) => detected.min(ceiling),
            None => detected,
        }
    }
}

fn parse_f32(key: &str, val: &str) -> Result<f32, ConfigError> {
    val.trim().parse::<f32>().map_err(|e| ConfigError::EnvOverride {
        key: key.into(),
        value: val.to_string(),
        reason: e.to_string(),
    })
}
