//! Item popularity strata derived from training interactions.
//!
//! Items are ranked by how many training interactions they appear in. The
//! **short head** is the smallest prefix of that ranking whose cumulative
//! count reaches `ratio × total`; the **long tail** is everything after it.
//! Together they cover exactly the items observed in training.
//!
//! # Boundary rule
//!
//! Ties on count are ordered by ascending [`ItemId`]. The item whose
//! inclusion first makes the cumulative count reach the threshold belongs to
//! the short head; every later item belongs to the long tail, including
//! items that share its count.
//!
//! ```text
//! counts X:10 Y:6 Z:4 W:2   total 22, ratio 0.8 -> threshold 17.6
//! cumulative  10  16  20  22
//! short head {X, Y, Z}      long tail {W}
//! ```
//!
//! Strata are a pure function of (training interactions, ratio) and are
//! memoized per distinct ratio.

use super::interactions::TrainingInteractions;
use crate::config::validate_pop_ratio;
use crate::error::ConfigError;
use crate::types::ItemId;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, instrument};

/// Which popularity stratum an item falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stratum {
    ShortHead,
    LongTail,
}

/// Disjoint short-head / long-tail partition of the training items.
#[derive(Debug, Clone)]
pub struct PopularityStrata {
    ratio: f64,
    short_head: HashSet<ItemId>,
    long_tail: HashSet<ItemId>,
}

impl PopularityStrata {
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn short_head(&self) -> &HashSet<ItemId> {
        &self.short_head
    }

    pub fn long_tail(&self) -> &HashSet<ItemId> {
        &self.long_tail
    }

    /// Stratum of `item`, or `None` if it never appeared in training.
    pub fn stratum(&self, item: ItemId) -> Option<Stratum> {
        if self.short_head.contains(&item) {
            Some(Stratum::ShortHead)
        } else if self.long_tail.contains(&item) {
            Some(Stratum::LongTail)
        } else {
            None
        }
    }
}

/// Popularity model over training interactions.
#[derive(Debug, Default)]
pub struct Popularity {
    counts: HashMap<ItemId, u64>,
    /// Items by count descending, then id ascending
    ranking: Vec<(ItemId, u64)>,
    total: u64,
    /// Strata memoized by ratio bit pattern
    cache: RwLock<HashMap<u64, Arc<PopularityStrata>>>,
}

impl Popularity {
    /// Counts, for every item, the number of training users who interacted with it.
    pub fn from_training(training: &TrainingInteractions) -> Self {
        let mut counts: HashMap<ItemId, u64> = HashMap::new();
        for (_, items) in training.iter() {
            for item in items.keys() {
                *counts.entry(*item).or_insert(0) += 1;
            }
        }
        Self::from_counts(counts)
    }

    /// Builds the model from precomputed per-item interaction counts.
    ///
    /// Items with a zero count are ignored.
    pub fn from_counts(counts: HashMap<ItemId, u64>) -> Self {
        let counts: HashMap<ItemId, u64> = counts.into_iter().filter(|(_, c)| *c > 0).collect();
        let mut ranking: Vec<(ItemId, u64)> = counts.iter().map(|(&i, &c)| (i, c)).collect();
        ranking.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let total = ranking.iter().map(|(_, c)| c).sum();

        Self {
            counts,
            ranking,
            total,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Training interaction count of `item` (0 if unseen).
    pub fn count(&self, item: ItemId) -> u64 {
        self.counts.get(&item).copied().unwrap_or(0)
    }

    pub fn total_interactions(&self) -> u64 {
        self.total
    }

    pub fn num_items(&self) -> usize {
        self.ranking.len()
    }

    /// Items ordered by popularity (count descending, id ascending).
    pub fn ranking(&self) -> &[(ItemId, u64)] {
        &self.ranking
    }

    /// Returns the short-head / long-tail partition for `ratio`.
    ///
    /// Computed once per distinct ratio; later calls return the shared value.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidPopRatio`] unless `0 < ratio < 1`.
    pub fn strata(&self, ratio: f64) -> Result<Arc<PopularityStrata>, ConfigError> {
        let ratio = validate_pop_ratio(ratio)?;
        let key = ratio.to_bits();

        if let Some(strata) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(strata));
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let strata = cache
            .entry(key)
            .or_insert_with(|| Arc::new(self.partition(ratio)));
        Ok(Arc::clone(strata))
    }

    #[instrument(skip(self), fields(items = self.ranking.len(), total = self.total))]
    fn partition(&self, ratio: f64) -> PopularityStrata {
        let threshold = ratio * self.total as f64;
        let mut short_head = HashSet::new();
        let mut cumulative: u64 = 0;
        let mut boundary = self.ranking.len();

        for (position, (item, count)) in self.ranking.iter().enumerate() {
            cumulative += count;
            short_head.insert(*item);
            if cumulative as f64 >= threshold {
                boundary = position + 1;
                break;
            }
        }

        let long_tail: HashSet<ItemId> = self.ranking[boundary..]
            .iter()
            .map(|(item, _)| *item)
            .collect();

        debug!(
            short_head = short_head.len(),
            long_tail = long_tail.len(),
            "Partitioned items into popularity strata"
        );

        PopularityStrata {
            ratio,
            short_head,
            long_tail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::item;

    fn counts(pairs: &[(u64, u64)]) -> HashMap<ItemId, u64> {
        pairs.iter().map(|&(i, c)| (item(i), c)).collect()
    }

    #[test]
    fn test_worked_example_partition() {
        // X=1:10, Y=2:6, Z=3:4, W=4:2
        let popularity = Popularity::from_counts(counts(&[(1, 10), (2, 6), (3, 4), (4, 2)]));
        let strata = popularity.strata(0.8).unwrap();

        let head: HashSet<ItemId> = [item(1), item(2), item(3)].into_iter().collect();
        assert_eq!(strata.short_head(), &head);
        assert_eq!(strata.long_tail().len(), 1);
        assert!(strata.long_tail().contains(&item(4)));
    }

    #[test]
    fn test_strata_cover_training_items_disjointly() {
        let popularity =
            Popularity::from_counts(counts(&[(1, 5), (2, 5), (3, 3), (4, 1), (5, 1), (6, 1)]));
        let strata = popularity.strata(0.5).unwrap();

        assert!(strata.short_head().is_disjoint(strata.long_tail()));
        assert_eq!(
            strata.short_head().len() + strata.long_tail().len(),
            popularity.num_items()
        );
    }

    #[test]
    fn test_exact_boundary_lands_in_short_head() {
        // total 10, ratio 0.5 -> threshold 5.0, reached exactly by item 1
        let popularity = Popularity::from_counts(counts(&[(1, 5), (2, 3), (3, 2)]));
        let strata = popularity.strata(0.5).unwrap();

        assert_eq!(strata.short_head().len(), 1);
        assert_eq!(strata.stratum(item(1)), Some(Stratum::ShortHead));
        assert_eq!(strata.stratum(item(2)), Some(Stratum::LongTail));
    }

    #[test]
    fn test_ties_broken_by_item_id() {
        // Items 7 and 3 tie on count; 3 orders first and takes the head slot
        let popularity = Popularity::from_counts(counts(&[(7, 4), (3, 4), (9, 2)]));
        let strata = popularity.strata(0.4).unwrap();

        assert_eq!(strata.stratum(item(3)), Some(Stratum::ShortHead));
        assert_eq!(strata.stratum(item(7)), Some(Stratum::LongTail));
        assert_eq!(strata.stratum(item(9)), Some(Stratum::LongTail));
    }

    #[test]
    fn test_unseen_item_has_no_stratum() {
        let popularity = Popularity::from_counts(counts(&[(1, 1)]));
        let strata = popularity.strata(0.8).unwrap();
        assert_eq!(strata.stratum(item(42)), None);
        assert_eq!(popularity.count(item(42)), 0);
    }

    #[test]
    fn test_strata_memoized_per_ratio() {
        let popularity = Popularity::from_counts(counts(&[(1, 10), (2, 6), (3, 4), (4, 2)]));
        let a = popularity.strata(0.8).unwrap();
        let b = popularity.strata(0.8).unwrap();
        let c = popularity.strata(0.5).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        // threshold 11.0 is first reached by Y (cumulative 16)
        assert_eq!(c.short_head().len(), 2);
    }

    #[test]
    fn test_empty_training_yields_empty_strata() {
        let popularity = Popularity::from_counts(HashMap::new());
        let strata = popularity.strata(0.8).unwrap();
        assert!(strata.short_head().is_empty());
        assert!(strata.long_tail().is_empty());
    }

    #[test]
    fn test_invalid_ratio_rejected() {
        let popularity = Popularity::default();
        assert_eq!(
            popularity.strata(1.5).unwrap_err(),
            ConfigError::InvalidPopRatio(1.5)
        );
    }

    #[test]
    fn test_counts_from_training_interactions() {
        use crate::test_utils::training;

        let train = training(&[(1, &[1, 2]), (2, &[1]), (3, &[1, 3])]);
        let popularity = Popularity::from_training(&train);

        assert_eq!(popularity.count(item(1)), 3);
        assert_eq!(popularity.count(item(2)), 1);
        assert_eq!(popularity.total_interactions(), 5);
        assert_eq!(popularity.ranking()[0], (item(1), 3));
    }
}
