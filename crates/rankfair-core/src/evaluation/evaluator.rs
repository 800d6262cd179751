//! Runs a list of named metrics against one recommendation run.

use super::context::EvaluationContext;
use super::interactions::Recommendations;
use super::metrics::{MetricFactory, MetricParams, MetricReport};
use super::registry::MetricRegistry;
use crate::error::{MetricError, RegistryError};
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Result of one requested metric.
#[derive(Debug, Clone)]
pub struct MetricOutcome {
    pub name: String,
    pub result: Result<MetricReport, MetricError>,
}

impl MetricOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Evaluates named metrics through a registry.
///
/// Each metric is computed independently: a degenerate denominator in one
/// fairness metric is reported in its own outcome and the remaining metrics
/// still run.
#[derive(Debug, Clone)]
pub struct Evaluator {
    registry: MetricRegistry,
    params: MetricParams,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(MetricRegistry::with_defaults())
    }
}

impl Evaluator {
    pub fn new(registry: MetricRegistry) -> Self {
        Self {
            registry,
            params: MetricParams::default(),
        }
    }

    /// Metric-specific overrides passed to every factory.
    pub fn with_params(mut self, params: MetricParams) -> Self {
        self.params = params;
        self
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Computes every metric in `names`, in the given order.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownMetric`] if any name is unknown. Names are
    /// resolved before the first metric runs.
    #[instrument(skip_all, fields(metrics = names.len(), users = recs.num_users()))]
    pub fn evaluate<S: AsRef<str>>(
        &self,
        names: &[S],
        recs: &Recommendations,
        ctx: &EvaluationContext,
    ) -> Result<Vec<MetricOutcome>, RegistryError> {
        let resolved: Vec<(&str, MetricFactory)> = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.registry.resolve(name).map(|factory| (name, factory))
            })
            .collect::<Result<_, _>>()?;

        Ok(resolved
            .into_iter()
            .map(|(name, factory)| self.run_one(name, factory, recs, ctx))
            .collect())
    }

    fn run_one(
        &self,
        name: &str,
        factory: MetricFactory,
        recs: &Recommendations,
        ctx: &EvaluationContext,
    ) -> MetricOutcome {
        let start = Instant::now();
        let result = factory(recs, ctx, &self.params)
            .and_then(|metric| MetricReport::from_metric(metric.as_ref()));
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(report) => info!(
                metric = name,
                value = report.aggregate,
                users = report.num_users,
                elapsed_ms,
                "Evaluated metric"
            ),
            Err(e) => warn!(metric = name, error = %e, "Metric failed"),
        }

        MetricOutcome {
            name: name.to_string(),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{context, recommendations};

    #[test]
    fn test_outcomes_follow_request_order() {
        let ctx = context(2, &[(1, 1, 1.0)], &[]);
        let recs = recommendations(&[(1, &[1, 2])]);

        let outcomes = Evaluator::default()
            .evaluate(&["Recall", "nDCG"], &recs, &ctx)
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].name, "Recall");
        assert_eq!(outcomes[1].name, "nDCG");
        assert_eq!(outcomes[0].result.as_ref().unwrap().aggregate, 1.0);
    }

    #[test]
    fn test_failing_metric_does_not_stop_others() {
        // No training data: both strata are empty and PopREO is degenerate
        let ctx = context(2, &[(1, 1, 1.0)], &[]);
        let recs = recommendations(&[(1, &[1, 2])]);

        let outcomes = Evaluator::default()
            .evaluate(&["ExtendedPopREO", "Precision"], &recs, &ctx)
            .unwrap();

        assert!(matches!(
            outcomes[0].result,
            Err(MetricError::DegenerateDenominator { .. })
        ));
        assert!(outcomes[1].is_ok());
    }

    #[test]
    fn test_unknown_name_rejected_before_computation() {
        let ctx = context(2, &[(1, 1, 1.0)], &[]);
        let recs = recommendations(&[(1, &[1])]);

        let err = Evaluator::default()
            .evaluate(&["nDCG", "Novelty"], &recs, &ctx)
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownMetric { ref name, .. } if name == "Novelty"));
    }

    #[test]
    fn test_params_reach_factories() {
        let ctx = context(2, &[(1, 1, 1.0)], &[]);
        let recs = recommendations(&[(1, &[1])]);
        let evaluator = Evaluator::default().with_params(MetricParams {
            pop_ratio: Some(2.0),
        });

        let outcomes = evaluator.evaluate(&["ExtendedPopRSP"], &recs, &ctx).unwrap();
        assert!(matches!(outcomes[0].result, Err(MetricError::Config(_))));
    }
}
