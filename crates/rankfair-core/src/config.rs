//! Evaluation configuration.
//!
//! Every evaluation run is parameterized by three values: the list cutoff,
//! the relevance threshold used to binarize graded ground truth, and the
//! concentration ratio used to split items into popularity strata. They are
//! carried explicitly in [`EvalConfig`] and validated once, before any
//! relevance or popularity structure is built.
//!
//! # Usage
//!
//! ```
//! use rankfair_core::config::{EvalConfig, DEFAULT_POP_RATIO};
//!
//! let config = EvalConfig {
//!     cutoff: 20,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! assert_eq!(config.pop_ratio, DEFAULT_POP_RATIO);
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Number of top-ranked items considered per user.
pub const DEFAULT_CUTOFF: usize = 10;

/// Minimum gain for an item to count as relevant in binary metrics.
///
/// Zero gains are never relevant, so the default selects every item with a
/// positive gain.
pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.0;

/// Share of training interactions covered by the short head.
pub const DEFAULT_POP_RATIO: f64 = 0.8;

/// Configuration shared by all metrics of one evaluation run.
///
/// Missing fields fall back to their defaults when deserialized, so a config
/// file only needs to name the values it changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Top-k cutoff applied to every recommendation list
    pub cutoff: usize,
    /// Gain threshold for binary relevance
    pub relevance_threshold: f64,
    /// Popularity concentration ratio in (0, 1)
    pub pop_ratio: f64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_CUTOFF,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            pop_ratio: DEFAULT_POP_RATIO,
        }
    }
}

impl EvalConfig {
    /// Checks every field, returning the first invalid one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_cutoff(self.cutoff)?;
        validate_threshold(self.relevance_threshold)?;
        validate_pop_ratio(self.pop_ratio)?;
        Ok(())
    }
}

/// Rejects a zero cutoff.
pub fn validate_cutoff(cutoff: usize) -> Result<usize, ConfigError> {
    if cutoff == 0 {
        return Err(ConfigError::InvalidCutoff(cutoff));
    }
    Ok(cutoff)
}

/// Rejects negative, NaN or infinite relevance thresholds.
pub fn validate_threshold(threshold: f64) -> Result<f64, ConfigError> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(ConfigError::InvalidThreshold(threshold));
    }
    Ok(threshold)
}

/// Accepts only ratios strictly between 0 and 1.
pub fn validate_pop_ratio(ratio: f64) -> Result<f64, ConfigError> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(ConfigError::InvalidPopRatio(ratio));
    }
    Ok(ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EvalConfig::default();
        assert_eq!(config.cutoff, 10);
        assert_eq!(config.pop_ratio, 0.8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_cutoff_rejected() {
        let config = EvalConfig {
            cutoff: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidCutoff(0)));
    }

    #[test]
    fn test_pop_ratio_bounds() {
        assert!(validate_pop_ratio(0.5).is_ok());
        assert!(validate_pop_ratio(0.0).is_err());
        assert!(validate_pop_ratio(1.0).is_err());
        assert!(validate_pop_ratio(-0.2).is_err());
        assert!(validate_pop_ratio(f64::NAN).is_err());
    }

    #[test]
    fn test_threshold_must_be_finite_and_non_negative() {
        assert!(validate_threshold(0.0).is_ok());
        assert!(validate_threshold(3.5).is_ok());
        assert!(validate_threshold(-1.0).is_err());
        assert!(validate_threshold(f64::INFINITY).is_err());
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: EvalConfig = serde_json::from_str(r#"{"cutoff": 50}"#).unwrap();
        assert_eq!(config.cutoff, 50);
        assert_eq!(config.relevance_threshold, DEFAULT_RELEVANCE_THRESHOLD);
        assert_eq!(config.pop_ratio, DEFAULT_POP_RATIO);
    }
}
