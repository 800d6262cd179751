//! Recommendation metrics sharing one contract.
//!
//! Every metric is built from the recommendation lists of all evaluated
//! users plus the shared [`EvaluationContext`], scores each *qualifying* user
//! (one with non-empty ground truth) and reduces those scores to a scalar.
//! Users without relevant items are excluded, never scored as zero.
//!
//! | Metric | Family | Aggregate |
//! |--------|--------|-----------|
//! | `nDCG` | accuracy, graded | mean |
//! | `Precision` | accuracy, binary | mean |
//! | `Recall` | accuracy, binary | mean |
//! | `MRR` | accuracy, binary | mean |
//! | `MAP` | accuracy, binary | mean |
//! | `ExtendedPopREO` | popularity fairness | coefficient of variation |
//! | `ExtendedPopRSP` | popularity fairness | coefficient of variation |
//!
//! # Concurrency
//!
//! Per-user scoring runs on the rayon pool. Results land in a `BTreeMap`
//! keyed by user and every reduction walks that map in user order, so the
//! aggregate does not depend on thread scheduling.
//!
//! # References
//!
//! - Järvelin & Kekäläinen (2002). "Cumulated gain-based evaluation of IR techniques"
//! - Zhu, Wang & Caverlee (2020). "Measuring and Mitigating Item Under-Recommendation
//!   Bias in Personalized Ranking Systems"

pub mod binary;
pub mod ndcg;
pub mod pop_fairness;

pub use binary::{MeanAveragePrecision, MeanReciprocalRank, Precision, Recall};
pub use ndcg::Ndcg;
pub use pop_fairness::{ExtendedPopReo, ExtendedPopRsp, StratumCounts};

use super::context::EvaluationContext;
use super::interactions::Recommendations;
use crate::error::MetricError;
use crate::types::{ItemId, UserId};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Common interface of all metrics.
pub trait Metric: Send + Sync {
    /// Stable name used for reporting and configuration matching.
    fn name(&self) -> &'static str;

    /// One score per qualifying user.
    fn per_user_score(&self) -> &BTreeMap<UserId, f64>;

    /// Reduction over the same users as [`Metric::per_user_score`].
    fn aggregate(&self) -> Result<f64, MetricError>;
}

/// Metric-specific overrides of the context configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricParams {
    /// Popularity concentration ratio; falls back to the configured ratio
    pub pop_ratio: Option<f64>,
}

/// Computed result of one metric.
#[derive(Debug, Clone, Serialize)]
pub struct MetricReport {
    pub name: String,
    pub aggregate: f64,
    pub num_users: usize,
    pub per_user: BTreeMap<UserId, f64>,
}

impl MetricReport {
    /// Evaluates `metric`, cloning its per-user scores into the report.
    pub fn from_metric(metric: &dyn Metric) -> Result<Self, MetricError> {
        let aggregate = metric.aggregate()?;
        let per_user = metric.per_user_score().clone();
        Ok(Self {
            name: metric.name().to_string(),
            aggregate,
            num_users: per_user.len(),
            per_user,
        })
    }
}

/// Builds a boxed metric from recommendations and context.
pub type MetricFactory =
    fn(&Recommendations, &EvaluationContext, &MetricParams) -> Result<Box<dyn Metric>, MetricError>;

/// Applies `score` to every user's list in parallel and keeps the `Some` results.
pub(crate) fn score_users<T, F>(recs: &Recommendations, score: F) -> BTreeMap<UserId, T>
where
    T: Send,
    F: Fn(UserId, &[(ItemId, f32)]) -> Option<T> + Sync,
{
    recs.lists()
        .par_iter()
        .filter_map(|(&user, list)| score(user, list).map(|value| (user, value)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

/// Arithmetic mean over qualifying users, summed in user order.
pub(crate) fn mean_score(
    metric: &'static str,
    scores: &BTreeMap<UserId, f64>,
) -> Result<f64, MetricError> {
    if scores.is_empty() {
        return Err(MetricError::NoQualifyingUsers { metric });
    }
    Ok(scores.values().sum::<f64>() / scores.len() as f64)
}

/// Population standard deviation over mean of two group ratios.
///
/// Equal ratios give exactly 0, including two zero ratios. Unequal values
/// with a zero mean are reported as a degenerate denominator.
pub(crate) fn coefficient_of_variation(
    metric: &'static str,
    head: f64,
    tail: f64,
) -> Result<f64, MetricError> {
    if head == tail {
        return Ok(0.0);
    }
    let mean = (head + tail) / 2.0;
    if mean == 0.0 {
        return Err(MetricError::DegenerateDenominator {
            metric,
            group: "mean",
        });
    }
    let variance = ((head - mean).powi(2) + (tail - mean).powi(2)) / 2.0;
    Ok(variance.sqrt() / mean)
}
