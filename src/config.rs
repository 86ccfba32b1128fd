//! Layered run configuration.
//!
//! Resolution order (highest priority first):
//! 1. CLI flags
//! 2. The `[detection]` table of a TOML config file
//! 3. Compiled defaults ([`DetectionParams::default`])

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::models::DetectionParams;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Config parse error in {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Config validation failed for {field}: {message}")]
    ValidationFailed { field: String, message: String },
}

/// Optional values layered over the defaults. Used both for the TOML
/// `[detection]` table and for CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParamOverrides {
    pub tolerance: Option<f64>,
    pub outlier_threshold: Option<f64>,
    pub min_block_lines: Option<usize>,
    pub max_owner_ratio: Option<f64>,
    pub min_similarity_count: Option<usize>,
    pub excerpt_chars: Option<usize>,
    pub threads: Option<usize>,
}

impl ParamOverrides {
    /// Overwrite every field of `params` this layer sets.
    pub fn apply(&self, params: &mut DetectionParams) {
        if let Some(v) = self.tolerance {
            params.tolerance = v;
        }
        if let Some(v) = self.outlier_threshold {
            params.outlier_threshold = v;
        }
        if let Some(v) = self.min_block_lines {
            params.min_block_lines = v;
        }
        if let Some(v) = self.max_owner_ratio {
            params.max_owner_ratio = v;
        }
        if let Some(v) = self.min_similarity_count {
            params.min_similarity_count = v;
        }
        if let Some(v) = self.excerpt_chars {
            params.excerpt_chars = v;
        }
        if self.threads.is_some() {
            params.threads = self.threads;
        }
    }
}

/// Unknown tables and keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    detection: ParamOverrides,
}

fn parse_overrides(toml_str: &str, path: &str) -> Result<ParamOverrides, ConfigError> {
    let file: ConfigFile = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    Ok(file.detection)
}

/// Parameters from a TOML string layered over the defaults.
pub fn params_from_toml(toml_str: &str) -> Result<DetectionParams, ConfigError> {
    let mut params = DetectionParams::default();
    parse_overrides(toml_str, "<string>")?.apply(&mut params);
    validate(&params)?;
    Ok(params)
}

/// Resolve the run parameters from defaults, an optional file and CLI flags.
pub fn load_params(
    config_path: Option<&Path>,
    cli: &ParamOverrides,
) -> Result<DetectionParams, ConfigError> {
    let mut params = DetectionParams::default();

    if let Some(path) = config_path {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        parse_overrides(&content, &path.display().to_string())?.apply(&mut params);
        debug!(path = %path.display(), "applied config file");
    }

    cli.apply(&mut params);
    validate(&params)?;
    Ok(params)
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationFailed {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Validate the parameter values.
pub fn validate(params: &DetectionParams) -> Result<(), ConfigError> {
    if !(params.tolerance > 0.0 && params.tolerance <= 1.0) {
        return Err(invalid("detection.tolerance", "must be in (0.0, 1.0]"));
    }
    if !(params.outlier_threshold >= 0.0 && params.outlier_threshold.is_finite()) {
        return Err(invalid(
            "detection.outlier_threshold",
            "must be a finite number >= 0.0",
        ));
    }
    if !(params.max_owner_ratio > 0.0 && params.max_owner_ratio <= 1.0) {
        return Err(invalid("detection.max_owner_ratio", "must be in (0.0, 1.0]"));
    }
    if params.threads == Some(0) {
        return Err(invalid("detection.threads", "must be greater than 0"));
    }
    Ok(())
}
