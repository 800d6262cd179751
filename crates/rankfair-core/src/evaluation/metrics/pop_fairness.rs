//! Popularity-bias fairness metrics.
//!
//! Both metrics split items into the short head and long tail of the
//! training popularity distribution and compare how each stratum is treated
//! by the recommender. Counts are summed over all qualifying users before any
//! division. The final score is the coefficient of variation
//! of the two stratum ratios: 0 when both strata are treated alike, larger
//! when one of them is favoured.
//!
//! - **ExtendedPopREO** (Ranking-based Equal Opportunity): of the relevant,
//!   unseen items in a stratum, how many were recommended.
//! - **ExtendedPopRSP** (Ranking-based Statistical Parity): of the unseen
//!   items in a stratum, how many were recommended, regardless of relevance.
//!
//! A stratum whose summed denominator is zero has no defined ratio and the
//! aggregate fails with [`MetricError::DegenerateDenominator`].

use super::{coefficient_of_variation, score_users, Metric, MetricParams};
use crate::error::MetricError;
use crate::evaluation::context::EvaluationContext;
use crate::evaluation::interactions::Recommendations;
use crate::evaluation::popularity::{PopularityStrata, Stratum};
use crate::types::{ItemId, UserId};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::AddAssign;
use tracing::{debug, instrument};

pub const EXTENDED_POP_REO: &str = "ExtendedPopREO";
pub const EXTENDED_POP_RSP: &str = "ExtendedPopRSP";

/// Per-user (or summed) numerators and denominators of both strata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StratumCounts {
    pub num_head: usize,
    pub num_tail: usize,
    pub den_head: usize,
    pub den_tail: usize,
}

impl StratumCounts {
    /// Stratified hit count divided by the cutoff.
    pub fn hit_rate(&self, cutoff: usize) -> f64 {
        (self.num_head + self.num_tail) as f64 / cutoff as f64
    }
}

impl AddAssign for StratumCounts {
    fn add_assign(&mut self, other: Self) {
        self.num_head += other.num_head;
        self.num_tail += other.num_tail;
        self.den_head += other.den_head;
        self.den_tail += other.den_tail;
    }
}

/// Shared state of both fairness metrics.
#[derive(Debug, Clone)]
struct StratifiedScores {
    counts: BTreeMap<UserId, StratumCounts>,
    scores: BTreeMap<UserId, f64>,
    totals: StratumCounts,
}

impl StratifiedScores {
    fn new(counts: BTreeMap<UserId, StratumCounts>, cutoff: usize) -> Self {
        let mut totals = StratumCounts::default();
        for user_counts in counts.values() {
            totals += *user_counts;
        }
        let scores = counts
            .iter()
            .map(|(&user, c)| (user, c.hit_rate(cutoff)))
            .collect();
        Self {
            counts,
            scores,
            totals,
        }
    }

    fn aggregate(&self, metric: &'static str) -> Result<f64, MetricError> {
        if self.counts.is_empty() {
            return Err(MetricError::NoQualifyingUsers { metric });
        }
        if self.totals.den_head == 0 {
            return Err(MetricError::DegenerateDenominator {
                metric,
                group: "short_head",
            });
        }
        if self.totals.den_tail == 0 {
            return Err(MetricError::DegenerateDenominator {
                metric,
                group: "long_tail",
            });
        }

        let head = self.totals.num_head as f64 / self.totals.den_head as f64;
        let tail = self.totals.num_tail as f64 / self.totals.den_tail as f64;
        debug!(metric, head, tail, "Stratum ratios");
        coefficient_of_variation(metric, head, tail)
    }
}

/// Distinct items of the top `cutoff` entries.
fn top_k_items(list: &[(ItemId, f32)], cutoff: usize) -> HashSet<ItemId> {
    list.iter().take(cutoff).map(|(item, _)| *item).collect()
}

/// Splits `items` by stratum, ignoring items unseen in training.
fn count_by_stratum<'a>(
    items: impl Iterator<Item = &'a ItemId>,
    strata: &PopularityStrata,
) -> (usize, usize) {
    items.fold((0, 0), |(head, tail), item| match strata.stratum(*item) {
        Some(Stratum::ShortHead) => (head + 1, tail),
        Some(Stratum::LongTail) => (head, tail + 1),
        None => (head, tail),
    })
}

// ============================================================================
// ExtendedPopREO
// ============================================================================

/// Per-user REO counts.
///
/// ```text
/// hits     = top_k ∩ relevant
/// num_head = |hits ∩ short_head|              num_tail = |hits ∩ long_tail|
/// den_head = |(short_head ∩ relevant) − train| den_tail = |(long_tail ∩ relevant) − train|
/// ```
pub fn user_reo_counts(
    list: &[(ItemId, f32)],
    relevant: &HashSet<ItemId>,
    train: Option<&HashMap<ItemId, f64>>,
    strata: &PopularityStrata,
    cutoff: usize,
) -> StratumCounts {
    let top = top_k_items(list, cutoff);
    let (num_head, num_tail) = count_by_stratum(top.intersection(relevant), strata);

    let unseen = relevant
        .iter()
        .filter(|item| train.map_or(true, |items| !items.contains_key(*item)));
    let (den_head, den_tail) = count_by_stratum(unseen, strata);

    StratumCounts {
        num_head,
        num_tail,
        den_head,
        den_tail,
    }
}

/// Popularity-based Ranking Equal Opportunity.
///
/// # Formula
///
/// ```text
/// ratio_head = Σ num_head / Σ den_head
/// ratio_tail = Σ num_tail / Σ den_tail
/// PopREO     = std(ratio_head, ratio_tail) / mean(ratio_head, ratio_tail)
/// ```
///
/// The per-user score reported alongside is the stratified hit rate
/// `(num_head + num_tail) / k`; the aggregate does not average it.
#[derive(Debug, Clone)]
pub struct ExtendedPopReo {
    cutoff: usize,
    pop_ratio: f64,
    inner: StratifiedScores,
}

impl ExtendedPopReo {
    /// Counts every user with a non-empty relevant set.
    ///
    /// # Errors
    ///
    /// [`MetricError::Config`] if `params.pop_ratio` lies outside `(0, 1)`.
    #[instrument(skip_all, fields(cutoff = ctx.cutoff(), users = recs.num_users()))]
    pub fn new(
        recs: &Recommendations,
        ctx: &EvaluationContext,
        params: &MetricParams,
    ) -> Result<Self, MetricError> {
        let strata = ctx.strata(params.pop_ratio)?;
        let binary = ctx.binary_relevance();
        let training = ctx.training();
        let cutoff = ctx.cutoff();

        let counts = score_users(recs, |user, list| {
            binary
                .user_relevant(user)
                .filter(|relevant| !relevant.is_empty())
                .map(|relevant| {
                    user_reo_counts(list, relevant, training.user_items(user), &strata, cutoff)
                })
        });
        debug!(qualifying = counts.len(), "Counted ExtendedPopREO");

        Ok(Self {
            cutoff,
            pop_ratio: strata.ratio(),
            inner: StratifiedScores::new(counts, cutoff),
        })
    }

    pub fn build(
        recs: &Recommendations,
        ctx: &EvaluationContext,
        params: &MetricParams,
    ) -> Result<Box<dyn Metric>, MetricError> {
        Ok(Box::new(Self::new(recs, ctx, params)?))
    }

    pub fn cutoff(&self) -> usize {
        self.cutoff
    }

    pub fn pop_ratio(&self) -> f64 {
        self.pop_ratio
    }

    pub fn user_counts(&self) -> &BTreeMap<UserId, StratumCounts> {
        &self.inner.counts
    }

    /// Counts summed over all qualifying users in user order.
    pub fn totals(&self) -> StratumCounts {
        self.inner.totals
    }
}

impl Metric for ExtendedPopReo {
    fn name(&self) -> &'static str {
        EXTENDED_POP_REO
    }

    fn per_user_score(&self) -> &BTreeMap<UserId, f64> {
        &self.inner.scores
    }

    fn aggregate(&self) -> Result<f64, MetricError> {
        self.inner.aggregate(EXTENDED_POP_REO)
    }
}

// ============================================================================
// ExtendedPopRSP
// ============================================================================

/// Per-user RSP counts.
///
/// ```text
/// num_head = |top_k ∩ short_head|     num_tail = |top_k ∩ long_tail|
/// den_head = |short_head − train|     den_tail = |long_tail − train|
/// ```
pub fn user_rsp_counts(
    list: &[(ItemId, f32)],
    train: Option<&HashMap<ItemId, f64>>,
    strata: &PopularityStrata,
    cutoff: usize,
) -> StratumCounts {
    let top = top_k_items(list, cutoff);
    let (num_head, num_tail) = count_by_stratum(top.iter(), strata);

    let (seen_head, seen_tail) = train
        .map(|items| count_by_stratum(items.keys(), strata))
        .unwrap_or((0, 0));

    StratumCounts {
        num_head,
        num_tail,
        den_head: strata.short_head().len() - seen_head,
        den_tail: strata.long_tail().len() - seen_tail,
    }
}

/// Popularity-based Ranking Statistical Parity.
///
/// Same aggregation as [`ExtendedPopReo`], but numerators count every
/// recommended item of a stratum and denominators every unseen item of it.
/// Only users with relevant items are counted so both fairness metrics cover
/// the same population as the accuracy metrics.
#[derive(Debug, Clone)]
pub struct ExtendedPopRsp {
    cutoff: usize,
    pop_ratio: f64,
    inner: StratifiedScores,
}

impl ExtendedPopRsp {
    #[instrument(skip_all, fields(cutoff = ctx.cutoff(), users = recs.num_users()))]
    pub fn new(
        recs: &Recommendations,
        ctx: &EvaluationContext,
        params: &MetricParams,
    ) -> Result<Self, MetricError> {
        let strata = ctx.strata(params.pop_ratio)?;
        let binary = ctx.binary_relevance();
        let training = ctx.training();
        let cutoff = ctx.cutoff();

        let counts = score_users(recs, |user, list| {
            binary
                .user_relevant(user)
                .filter(|relevant| !relevant.is_empty())
                .map(|_| user_rsp_counts(list, training.user_items(user), &strata, cutoff))
        });
        debug!(qualifying = counts.len(), "Counted ExtendedPopRSP");

        Ok(Self {
            cutoff,
            pop_ratio: strata.ratio(),
            inner: StratifiedScores::new(counts, cutoff),
        })
    }

    pub fn build(
        recs: &Recommendations,
        ctx: &EvaluationContext,
        params: &MetricParams,
    ) -> Result<Box<dyn Metric>, MetricError> {
        Ok(Box::new(Self::new(recs, ctx, params)?))
    }

    pub fn cutoff(&self) -> usize {
        self.cutoff
    }

    pub fn pop_ratio(&self) -> f64 {
        self.pop_ratio
    }

    pub fn user_counts(&self) -> &BTreeMap<UserId, StratumCounts> {
        &self.inner.counts
    }

    pub fn totals(&self) -> StratumCounts {
        self.inner.totals
    }
}

impl Metric for ExtendedPopRsp {
    fn name(&self) -> &'static str {
        EXTENDED_POP_RSP
    }

    fn per_user_score(&self) -> &BTreeMap<UserId, f64> {
        &self.inner.scores
    }

    fn aggregate(&self) -> Result<f64, MetricError> {
        self.inner.aggregate(EXTENDED_POP_RSP)
    }
}
