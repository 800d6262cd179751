//! Accuracy metrics over binary relevance.
//!
//! All four metrics read the binary view of the ground truth built at the
//! configured relevance threshold. A user qualifies when that view holds at
//! least one item for them. Each item of a list is counted at most once, at
//! its first rank.

use super::{mean_score, score_users, Metric, MetricParams};
use crate::error::MetricError;
use crate::evaluation::context::EvaluationContext;
use crate::evaluation::interactions::Recommendations;
use crate::types::{ItemId, UserId};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, instrument};

pub const PRECISION: &str = "Precision";
pub const RECALL: &str = "Recall";
pub const MRR: &str = "MRR";
pub const MAP: &str = "MAP";

/// Scores every user with a non-empty relevant set.
#[instrument(skip_all, fields(metric = name, cutoff = ctx.cutoff()))]
fn score_binary<F>(
    name: &'static str,
    recs: &Recommendations,
    ctx: &EvaluationContext,
    score: F,
) -> BTreeMap<UserId, f64>
where
    F: Fn(&[(ItemId, f32)], &HashSet<ItemId>, usize) -> f64 + Sync,
{
    let binary = ctx.binary_relevance();
    let cutoff = ctx.cutoff();
    let scores = score_users(recs, |user, list| {
        binary
            .user_relevant(user)
            .filter(|relevant| !relevant.is_empty())
            .map(|relevant| score(list, relevant, cutoff))
    });
    debug!(qualifying = scores.len(), "Scored {}", name);
    scores
}

/// 0-based ranks of relevant items among the first `cutoff` entries.
///
/// Repeated items only count at their first occurrence.
fn hit_ranks<'a>(
    list: &'a [(ItemId, f32)],
    relevant: &'a HashSet<ItemId>,
    cutoff: usize,
) -> impl Iterator<Item = usize> + 'a {
    let mut seen = HashSet::new();
    list.iter()
        .take(cutoff)
        .enumerate()
        .filter(move |(_, (item, _))| relevant.contains(item) && seen.insert(*item))
        .map(|(rank, _)| rank)
}

// ============================================================================
// Precision
// ============================================================================

/// Fraction of the cutoff filled with relevant items.
///
/// ```text
/// P@k = |relevant ∩ top_k| / k
/// ```
///
/// The denominator is always `k`, so short lists are penalised.
pub fn user_precision(list: &[(ItemId, f32)], relevant: &HashSet<ItemId>, cutoff: usize) -> f64 {
    hit_ranks(list, relevant, cutoff).count() as f64 / cutoff as f64
}

/// Mean Precision@k over qualifying users.
#[derive(Debug, Clone)]
pub struct Precision {
    scores: BTreeMap<UserId, f64>,
}

impl Precision {
    pub fn new(recs: &Recommendations, ctx: &EvaluationContext) -> Self {
        Self {
            scores: score_binary(PRECISION, recs, ctx, user_precision),
        }
    }

    pub fn build(
        recs: &Recommendations,
        ctx: &EvaluationContext,
        _params: &MetricParams,
    ) -> Result<Box<dyn Metric>, MetricError> {
        Ok(Box::new(Self::new(recs, ctx)))
    }
}

impl Metric for Precision {
    fn name(&self) -> &'static str {
        PRECISION
    }

    fn per_user_score(&self) -> &BTreeMap<UserId, f64> {
        &self.scores
    }

    fn aggregate(&self) -> Result<f64, MetricError> {
        mean_score(PRECISION, &self.scores)
    }
}

// ============================================================================
// Recall
// ============================================================================

/// Fraction of the user's relevant items found in the top `cutoff`.
///
/// ```text
/// R@k = |relevant ∩ top_k| / |relevant|
/// ```
pub fn user_recall(list: &[(ItemId, f32)], relevant: &HashSet<ItemId>, cutoff: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    hit_ranks(list, relevant, cutoff).count() as f64 / relevant.len() as f64
}

/// Mean Recall@k over qualifying users.
#[derive(Debug, Clone)]
pub struct Recall {
    scores: BTreeMap<UserId, f64>,
}

impl Recall {
    pub fn new(recs: &Recommendations, ctx: &EvaluationContext) -> Self {
        Self {
            scores: score_binary(RECALL, recs, ctx, user_recall),
        }
    }

    pub fn build(
        recs: &Recommendations,
        ctx: &EvaluationContext,
        _params: &MetricParams,
    ) -> Result<Box<dyn Metric>, MetricError> {
        Ok(Box::new(Self::new(recs, ctx)))
    }
}

impl Metric for Recall {
    fn name(&self) -> &'static str {
        RECALL
    }

    fn per_user_score(&self) -> &BTreeMap<UserId, f64> {
        &self.scores
    }

    fn aggregate(&self) -> Result<f64, MetricError> {
        mean_score(RECALL, &self.scores)
    }
}

// ============================================================================
// MRR (Mean Reciprocal Rank)
// ============================================================================

/// Reciprocal of the 1-based rank of the first relevant item, or 0 if none
/// appears in the top `cutoff`.
pub fn user_reciprocal_rank(
    list: &[(ItemId, f32)],
    relevant: &HashSet<ItemId>,
    cutoff: usize,
) -> f64 {
    hit_ranks(list, relevant, cutoff)
        .next()
        .map(|rank| 1.0 / (rank + 1) as f64)
        .unwrap_or(0.0)
}

/// Mean reciprocal rank over qualifying users.
#[derive(Debug, Clone)]
pub struct MeanReciprocalRank {
    scores: BTreeMap<UserId, f64>,
}

impl MeanReciprocalRank {
    pub fn new(recs: &Recommendations, ctx: &EvaluationContext) -> Self {
        Self {
            scores: score_binary(MRR, recs, ctx, user_reciprocal_rank),
        }
    }

    pub fn build(
        recs: &Recommendations,
        ctx: &EvaluationContext,
        _params: &MetricParams,
    ) -> Result<Box<dyn Metric>, MetricError> {
        Ok(Box::new(Self::new(recs, ctx)))
    }
}

impl Metric for MeanReciprocalRank {
    fn name(&self) -> &'static str {
        MRR
    }

    fn per_user_score(&self) -> &BTreeMap<UserId, f64> {
        &self.scores
    }

    fn aggregate(&self) -> Result<f64, MetricError> {
        mean_score(MRR, &self.scores)
    }
}

// ============================================================================
// MAP (Mean Average Precision)
// ============================================================================

/// Average precision at `cutoff`.
///
/// # Formula
///
/// ```text
/// AP@k = Σ P@(r+1) · rel(r)  for r in 0..k
///        ─────────────────────
///          min(|relevant|, k)
/// ```
///
/// Normalising by `min(|relevant|, k)` lets a perfect top-k reach 1.0 even
/// when the user has more relevant items than fit in the cutoff.
pub fn user_average_precision(
    list: &[(ItemId, f32)],
    relevant: &HashSet<ItemId>,
    cutoff: usize,
) -> f64 {
    let denominator = relevant.len().min(cutoff);
    if denominator == 0 {
        return 0.0;
    }

    let sum: f64 = hit_ranks(list, relevant, cutoff)
        .enumerate()
        .map(|(hits_before, rank)| (hits_before + 1) as f64 / (rank + 1) as f64)
        .sum();

    sum / denominator as f64
}

/// Mean average precision over qualifying users.
#[derive(Debug, Clone)]
pub struct MeanAveragePrecision {
    scores: BTreeMap<UserId, f64>,
}

impl MeanAveragePrecision {
    pub fn new(recs: &Recommendations, ctx: &EvaluationContext) -> Self {
        Self {
            scores: score_binary(MAP, recs, ctx, user_average_precision),
        }
    }

    pub fn build(
        recs: &Recommendations,
        ctx: &EvaluationContext,
        _params: &MetricParams,
    ) -> Result<Box<dyn Metric>, MetricError> {
        Ok(Box::new(Self::new(recs, ctx)))
    }
}

impl Metric for MeanAveragePrecision {
    fn name(&self) -> &'static str {
        MAP
    }

    fn per_user_score(&self) -> &BTreeMap<UserId, f64> {
        &self.scores
    }

    fn aggregate(&self) -> Result<f64, MetricError> {
        mean_score(MAP, &self.scores)
    }
}
