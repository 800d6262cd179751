//! # Rankfair Core
//!
//! Metric computation engine for ranked recommendation lists.
//!
//! This crate scores the top-k lists produced by recommender models against
//! held-out ground truth, reporting both ranking accuracy (nDCG, precision,
//! recall, MRR, MAP) and popularity bias (ExtendedPopREO, ExtendedPopRSP).
//! Model training and data preparation live elsewhere; this crate only reads
//! already-split interactions and already-ranked lists.
//!
//! ## Modules
//!
//! - [`config`] - Evaluation configuration (cutoff, relevance threshold, popularity ratio)
//! - [`error`] - Error types for configuration, metrics, registry, datasets and statistics
//! - [`types`] - User/item identifiers and string interning
//! - [`evaluation`] - Relevance and popularity models, metrics, registry and evaluator

pub mod config;
pub mod error;
pub mod evaluation;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;
