//! Normalized Discounted Cumulative Gain (nDCG@k).

use super::{mean_score, score_users, Metric, MetricParams};
use crate::config::validate_cutoff;
use crate::error::MetricError;
use crate::evaluation::context::EvaluationContext;
use crate::evaluation::interactions::Recommendations;
use crate::evaluation::relevance::{ranking_discount, GainMap, Relevance};
use crate::types::{ItemId, UserId};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, instrument};

/// Public metric name.
pub const NDCG: &str = "nDCG";

/// nDCG@k over graded relevance.
///
/// # Formula
///
/// ```text
/// DCG@k  = Σ gain(item_r) · discount(r)          for r in 0..k, first occurrence only
/// IDCG@k = Σ gains_desc[r] · discount(r)         for r in 0..min(|G|, k)
/// nDCG@k = DCG@k / IDCG@k   if DCG@k > 0, else 0
/// discount(r) = 1 / log2(r + 2)
/// ```
///
/// Gains are the raw graded values, not exponentiated. Only users with at
/// least one positive gain are scored; the aggregate is their mean.
#[derive(Debug, Clone)]
pub struct Ndcg {
    cutoff: usize,
    scores: BTreeMap<UserId, f64>,
}

impl Ndcg {
    /// Scores every qualifying user at the context cutoff.
    pub fn new(recs: &Recommendations, ctx: &EvaluationContext) -> Self {
        Self::compute(recs, ctx.relevance(), ctx.cutoff())
    }

    /// Scores against `relevance` at an explicit cutoff.
    pub fn with_cutoff(
        recs: &Recommendations,
        relevance: &Relevance,
        cutoff: usize,
    ) -> Result<Self, MetricError> {
        let cutoff = validate_cutoff(cutoff)?;
        Ok(Self::compute(recs, relevance, cutoff))
    }

    /// Registry entry point.
    pub fn build(
        recs: &Recommendations,
        ctx: &EvaluationContext,
        _params: &MetricParams,
    ) -> Result<Box<dyn Metric>, MetricError> {
        Ok(Box::new(Self::new(recs, ctx)))
    }

    #[instrument(skip_all, fields(cutoff = cutoff, users = recs.num_users()))]
    fn compute(recs: &Recommendations, relevance: &Relevance, cutoff: usize) -> Self {
        let scores = score_users(recs, |user, list| {
            relevance
                .user_gains(user)
                .filter(|gains| !gains.is_empty())
                .map(|gains| user_ndcg(list, gains, cutoff))
        });
        debug!(qualifying = scores.len(), "Scored nDCG");
        Self { cutoff, scores }
    }

    pub fn cutoff(&self) -> usize {
        self.cutoff
    }
}

impl Metric for Ndcg {
    fn name(&self) -> &'static str {
        NDCG
    }

    fn per_user_score(&self) -> &BTreeMap<UserId, f64> {
        &self.scores
    }

    fn aggregate(&self) -> Result<f64, MetricError> {
        mean_score(NDCG, &self.scores)
    }
}

/// Discounted cumulative gain of the first `cutoff` entries.
///
/// Items without a gain contribute 0. A repeated item only counts at its
/// first rank.
pub fn dcg(list: &[(ItemId, f32)], gains: &GainMap, cutoff: usize) -> f64 {
    let mut seen = HashSet::new();
    list.iter()
        .take(cutoff)
        .enumerate()
        .filter(|(_, (item, _))| seen.insert(*item))
        .map(|(rank, (item, _))| gains.get(item).copied().unwrap_or(0.0) * ranking_discount(rank))
        .sum()
}

/// Best achievable DCG for `gains` at `cutoff`.
///
/// Gains are sorted ascending and read from the end, so the `n = min(|G|, k)`
/// largest gains are discounted in descending order.
pub fn idcg(gains: &GainMap, cutoff: usize) -> f64 {
    let mut sorted: Vec<f64> = gains.values().copied().collect();
    sorted.sort_by(f64::total_cmp);

    let m = sorted.len();
    let n = m.min(cutoff);
    (0..n)
        .map(|rank| sorted[m - rank - 1] * ranking_discount(rank))
        .sum()
}

/// nDCG of one user's list; 0 when no relevant item is retrieved.
pub fn user_ndcg(list: &[(ItemId, f32)], gains: &GainMap, cutoff: usize) -> f64 {
    let dcg = dcg(list, gains, cutoff);
    if dcg > 0.0 {
        dcg / idcg(gains, cutoff)
    } else {
        0.0
    }
}
