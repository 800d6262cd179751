//! Configuration resolution for the evaluation harness.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! command-line flags. The merged configuration is validated once before any
//! data is loaded.

use anyhow::{anyhow, Context, Result};
use rankfair_core::config::EvalConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Command-line overrides; `None` keeps the value from the file or default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub cutoff: Option<usize>,
    pub relevance_threshold: Option<f64>,
    pub pop_ratio: Option<f64>,
}

/// Reads an [`EvalConfig`] from a JSON file. Missing fields take defaults.
pub fn load_config_file(path: &Path) -> Result<EvalConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Merges defaults, the optional config file and CLI overrides, then validates.
pub fn resolve(path: Option<&Path>, overrides: Overrides) -> Result<EvalConfig> {
    let mut config = match path {
        Some(path) => load_config_file(path)?,
        None => EvalConfig::default(),
    };

    if let Some(cutoff) = overrides.cutoff {
        config.cutoff = cutoff;
    }
    if let Some(threshold) = overrides.relevance_threshold {
        config.relevance_threshold = threshold;
    }
    if let Some(ratio) = overrides.pop_ratio {
        config.pop_ratio = ratio;
    }

    config
        .validate()
        .context("Invalid evaluation configuration")?;
    Ok(config)
}

/// A named recommendation file given as `name=path`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    pub name: String,
    pub path: PathBuf,
}

/// Parses `name=path`, or a bare path named after its file stem.
pub fn parse_run(raw: &str) -> Result<RunSpec> {
    let (name, path) = match raw.split_once('=') {
        Some((name, path)) => (name.trim().to_string(), PathBuf::from(path.trim())),
        None => {
            let path = PathBuf::from(raw.trim());
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| anyhow!("Cannot derive a run name from '{}'", raw))?
                .to_string();
            (stem, path)
        }
    };

    if name.is_empty() {
        return Err(anyhow!("Run name is empty in '{}'", raw));
    }
    if path.as_os_str().is_empty() {
        return Err(anyhow!("Run path is empty in '{}'", raw));
    }
    Ok(RunSpec { name, path })
}
