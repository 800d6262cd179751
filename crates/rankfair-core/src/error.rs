//! Error types for rankfair-core.
//!
//! Each concern gets its own enum: configuration, ground-truth relevance,
//! metric computation, metric lookup, dataset loading and statistical tests.
//! A user without relevant items is not an error anywhere in this crate; such
//! users are simply excluded from scoring.

use crate::types::{ItemId, UserId};
use thiserror::Error;

/// Errors raised while validating an evaluation configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Cutoff must be a positive integer
    #[error("Invalid cutoff {0}: must be a positive integer")]
    InvalidCutoff(usize),
    /// Relevance threshold must be finite and non-negative
    #[error("Invalid relevance threshold {0}: must be a finite, non-negative number")]
    InvalidThreshold(f64),
    /// Popularity ratio must lie strictly between 0 and 1
    #[error("Invalid popularity ratio {0}: must lie strictly between 0 and 1")]
    InvalidPopRatio(f64),
}

/// Errors raised while building ground-truth relevance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RelevanceError {
    /// A gain was negative, NaN or infinite
    #[error("Invalid gain {gain} for user {user}, item {item}: gains must be finite and non-negative")]
    InvalidGain {
        user: UserId,
        item: ItemId,
        gain: f64,
    },
}

/// Errors raised while computing a metric.
///
/// These abort the single metric being computed; other metrics in the same
/// run are unaffected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    /// Invalid cutoff, threshold or ratio supplied to the metric
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A group-level denominator summed to zero, so the ratio is undefined
    #[error("{metric}: undefined ratio, the {group} denominator is zero across all users")]
    DegenerateDenominator {
        metric: &'static str,
        group: &'static str,
    },
    /// No evaluated user has any relevant item
    #[error("{metric}: no user has relevant items, the aggregate is undefined")]
    NoQualifyingUsers { metric: &'static str },
}

/// Errors raised when resolving metric names.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// The requested name has no registered implementation
    #[error("Unknown metric '{name}' (available: {})", .available.join(", "))]
    UnknownMetric {
        name: String,
        available: Vec<String>,
    },
    /// The metric was found but failed to build
    #[error(transparent)]
    Metric(#[from] MetricError),
}

/// Errors raised while loading interaction or recommendation files.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// I/O error reading a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Required file does not exist
    #[error("Missing file: {0}")]
    MissingFile(String),
    /// A line could not be parsed
    #[error("{path}:{line}: {message}")]
    InvalidFormat {
        path: String,
        line: usize,
        message: String,
    },
    /// Ground truth contained an invalid gain
    #[error(transparent)]
    Relevance(#[from] RelevanceError),
}

/// Errors raised by statistical comparisons.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    /// The two score maps share no user
    #[error("No users in common between the two score sets")]
    NoCommonUsers,
    /// Too few observations for the requested test
    #[error("Need at least {needed} observations, got {got}")]
    InsufficientSamples { needed: usize, got: usize },
}
