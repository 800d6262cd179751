//! Name-keyed lookup table of metric factories.

use super::context::EvaluationContext;
use super::interactions::Recommendations;
use super::metrics::{
    binary, ndcg, pop_fairness, ExtendedPopReo, ExtendedPopRsp, MeanAveragePrecision,
    MeanReciprocalRank, Metric, MetricFactory, MetricParams, Ndcg, Precision, Recall,
};
use crate::error::RegistryError;
use std::collections::BTreeMap;
use std::fmt;

/// Maps public metric names to their factories.
///
/// Names are matched exactly. Lookup happens before any computation, so an
/// unknown name is reported without touching the data.
#[derive(Clone, Default)]
pub struct MetricRegistry {
    factories: BTreeMap<&'static str, MetricFactory>,
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

impl MetricRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every metric this crate implements.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ndcg::NDCG, Ndcg::build);
        registry.register(binary::PRECISION, Precision::build);
        registry.register(binary::RECALL, Recall::build);
        registry.register(binary::MRR, MeanReciprocalRank::build);
        registry.register(binary::MAP, MeanAveragePrecision::build);
        registry.register(pop_fairness::EXTENDED_POP_REO, ExtendedPopReo::build);
        registry.register(pop_fairness::EXTENDED_POP_RSP, ExtendedPopRsp::build);
        registry
    }

    /// Adds or replaces the factory for `name`.
    pub fn register(&mut self, name: &'static str, factory: MetricFactory) {
        self.factories.insert(name, factory);
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Factory registered under `name`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownMetric`] listing every available name.
    pub fn resolve(&self, name: &str) -> Result<MetricFactory, RegistryError> {
        self.factories
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownMetric {
                name: name.to_string(),
                available: self.names().into_iter().map(String::from).collect(),
            })
    }

    /// Checks that every name in `names` is registered.
    pub fn validate<S: AsRef<str>>(&self, names: &[S]) -> Result<(), RegistryError> {
        names
            .iter()
            .try_for_each(|name| self.resolve(name.as_ref()).map(|_| ()))
    }

    /// Resolves `name` and builds the metric.
    pub fn build(
        &self,
        name: &str,
        recs: &Recommendations,
        ctx: &EvaluationContext,
        params: &MetricParams,
    ) -> Result<Box<dyn Metric>, RegistryError> {
        let factory = self.resolve(name)?;
        Ok(factory(recs, ctx, params)?)
    }
}
