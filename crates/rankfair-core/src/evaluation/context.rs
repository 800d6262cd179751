//! Shared, read-only evaluation context.
//!
//! The context bundles everything every metric of a run reads: the validated
//! configuration, graded relevance, its binary view at the configured
//! threshold, training interactions and the popularity model. It is built
//! once per run and handed to metrics by reference (or `Arc`); nothing in it
//! is mutated afterwards, so metrics may read it concurrently.

use super::interactions::TrainingInteractions;
use super::popularity::{Popularity, PopularityStrata};
use super::relevance::{BinaryRelevance, Relevance};
use crate::config::EvalConfig;
use crate::error::ConfigError;
use std::sync::Arc;
use tracing::{info, instrument};

/// Everything metrics need besides the recommendation lists.
#[derive(Debug)]
pub struct EvaluationContext {
    config: EvalConfig,
    relevance: Relevance,
    binary: BinaryRelevance,
    training: TrainingInteractions,
    popularity: Popularity,
}

impl EvaluationContext {
    /// Validates `config` and derives the binary relevance and popularity model.
    #[instrument(skip_all, fields(cutoff = config.cutoff))]
    pub fn new(
        config: EvalConfig,
        relevance: Relevance,
        training: TrainingInteractions,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let binary = relevance.binary_relevance(config.relevance_threshold)?;
        let popularity = Popularity::from_training(&training);

        info!(
            test_users = relevance.num_users(),
            train_users = training.num_users(),
            train_items = popularity.num_items(),
            "Built evaluation context"
        );

        Ok(Self {
            config,
            relevance,
            binary,
            training,
            popularity,
        })
    }

    /// Same as [`EvaluationContext::new`], wrapped for sharing across threads.
    pub fn shared(
        config: EvalConfig,
        relevance: Relevance,
        training: TrainingInteractions,
    ) -> Result<Arc<Self>, ConfigError> {
        Self::new(config, relevance, training).map(Arc::new)
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn cutoff(&self) -> usize {
        self.config.cutoff
    }

    pub fn relevance(&self) -> &Relevance {
        &self.relevance
    }

    /// Binary relevance at the configured threshold.
    pub fn binary_relevance(&self) -> &BinaryRelevance {
        &self.binary
    }

    pub fn training(&self) -> &TrainingInteractions {
        &self.training
    }

    pub fn popularity(&self) -> &Popularity {
        &self.popularity
    }

    /// Popularity strata at `ratio`, or at the configured ratio when `None`.
    pub fn strata(&self, ratio: Option<f64>) -> Result<Arc<PopularityStrata>, ConfigError> {
        self.popularity
            .strata(ratio.unwrap_or(self.config.pop_ratio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{item, training, user};

    #[test]
    fn test_context_rejects_invalid_config() {
        let config = EvalConfig {
            pop_ratio: 1.0,
            ..Default::default()
        };
        let err = EvaluationContext::new(config, Relevance::default(), Default::default())
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidPopRatio(1.0));
    }

    #[test]
    fn test_context_uses_configured_threshold() {
        let relevance =
            Relevance::from_triples([(user(1), item(1), 4.0), (user(1), item(2), 1.0)]).unwrap();
        let config = EvalConfig {
            relevance_threshold: 3.0,
            ..Default::default()
        };
        let ctx = EvaluationContext::new(config, relevance, training(&[(1, &[3])])).unwrap();

        let relevant = ctx.binary_relevance().user_relevant(user(1)).unwrap();
        assert_eq!(relevant.len(), 1);
        assert!(relevant.contains(&item(1)));
        assert_eq!(ctx.popularity().num_items(), 1);
    }

    #[test]
    fn test_strata_default_to_configured_ratio() {
        let ctx = EvaluationContext::new(
            EvalConfig::default(),
            Relevance::default(),
            training(&[(1, &[1, 2]), (2, &[1])]),
        )
        .unwrap();

        let strata = ctx.strata(None).unwrap();
        assert_eq!(strata.ratio(), 0.8);
        assert!(ctx.strata(Some(0.0)).is_err());
    }
}
