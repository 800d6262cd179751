//! Ground-truth relevance derived from held-out test interactions.
//!
//! Two views are offered over the same data:
//!
//! - **Graded relevance**: `user -> item -> gain`, the raw non-negative
//!   signal (rating, count, or 1 for implicit feedback). No discount is
//!   applied here; discounting is a per-metric concern.
//! - **Binary relevance**: `user -> {item}` for items whose gain reaches a
//!   threshold. Derived on demand from the graded map, never stored
//!   independently of it.
//!
//! A user missing from the map has no relevant items. Callers treat that as
//! "exclude from scoring", never as an error.

use crate::config::validate_threshold;
use crate::error::{ConfigError, RelevanceError};
use crate::types::{ItemId, UserId};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Gains of one user's relevant items.
pub type GainMap = HashMap<ItemId, f64>;

/// Logarithmic rank discount, `1 / log2(rank + 2)` for a 0-based rank.
///
/// `ranking_discount(0) == 1.0` exactly. Every position-aware metric uses
/// this one function so scores stay comparable across metrics.
#[inline]
pub fn ranking_discount(rank: usize) -> f64 {
    1.0 / (rank as f64 + 2.0).log2()
}

/// Graded ground-truth relevance for all test users.
///
/// Only positive gains are kept; a user whose test gains are all zero is
/// absent. Every inner map is therefore non-empty.
#[derive(Debug, Clone, Default)]
pub struct Relevance {
    graded: HashMap<UserId, GainMap>,
}

impl Relevance {
    /// Builds relevance from a nested `user -> item -> gain` map.
    ///
    /// # Errors
    ///
    /// [`RelevanceError::InvalidGain`] if any gain is negative or not finite.
    pub fn new(test: HashMap<UserId, GainMap>) -> Result<Self, RelevanceError> {
        let mut graded = HashMap::with_capacity(test.len());
        for (user, gains) in test {
            let mut kept = GainMap::with_capacity(gains.len());
            for (item, gain) in gains {
                check_gain(user, item, gain)?;
                if gain > 0.0 {
                    kept.insert(item, gain);
                }
            }
            if !kept.is_empty() {
                graded.insert(user, kept);
            }
        }

        debug!(users = graded.len(), "Built graded relevance");
        Ok(Self { graded })
    }

    /// Builds relevance from `(user, item, gain)` triples.
    ///
    /// A repeated (user, item) pair keeps the last gain.
    pub fn from_triples(
        triples: impl IntoIterator<Item = (UserId, ItemId, f64)>,
    ) -> Result<Self, RelevanceError> {
        let mut test: HashMap<UserId, GainMap> = HashMap::new();
        for (user, item, gain) in triples {
            test.entry(user).or_default().insert(item, gain);
        }
        Self::new(test)
    }

    /// The full graded map.
    pub fn graded_relevance(&self) -> &HashMap<UserId, GainMap> {
        &self.graded
    }

    /// Gains for one user, or `None` if the user has no relevant items.
    pub fn user_gains(&self, user: UserId) -> Option<&GainMap> {
        self.graded.get(&user)
    }

    /// Number of users with at least one positive gain.
    pub fn num_users(&self) -> usize {
        self.graded.len()
    }

    /// Derives binary relevance at `threshold`.
    ///
    /// An item is relevant iff its gain is positive and `gain >= threshold`.
    /// Users left with no relevant item are omitted.
    pub fn binary_relevance(&self, threshold: f64) -> Result<BinaryRelevance, ConfigError> {
        let threshold = validate_threshold(threshold)?;
        let sets: HashMap<UserId, HashSet<ItemId>> = self
            .graded
            .iter()
            .filter_map(|(user, gains)| {
                let relevant: HashSet<ItemId> = gains
                    .iter()
                    .filter(|(_, &gain)| gain >= threshold)
                    .map(|(&item, _)| item)
                    .collect();
                (!relevant.is_empty()).then_some((*user, relevant))
            })
            .collect();

        debug!(threshold, users = sets.len(), "Derived binary relevance");
        Ok(BinaryRelevance { sets, threshold })
    }
}

fn check_gain(user: UserId, item: ItemId, gain: f64) -> Result<(), RelevanceError> {
    if !gain.is_finite() || gain < 0.0 {
        return Err(RelevanceError::InvalidGain { user, item, gain });
    }
    Ok(())
}

/// Binary relevance sets at a fixed threshold.
#[derive(Debug, Clone, Default)]
pub struct BinaryRelevance {
    sets: HashMap<UserId, HashSet<ItemId>>,
    threshold: f64,
}

impl BinaryRelevance {
    /// Relevant items for one user, or `None` if there are none.
    pub fn user_relevant(&self, user: UserId) -> Option<&HashSet<ItemId>> {
        self.sets.get(&user)
    }

    /// Threshold these sets were derived with.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn num_users(&self) -> usize {
        self.sets.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &HashSet<ItemId>)> {
        self.sets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{item, user};

    #[test]
    fn test_discount_values() {
        assert_eq!(ranking_discount(0), 1.0);
        assert!((ranking_discount(1) - 0.6309).abs() < 1e-4);
        assert_eq!(ranking_discount(2), 0.5);
        assert!(ranking_discount(10) < ranking_discount(9));
    }

    #[test]
    fn test_zero_gains_are_dropped() {
        let relevance = Relevance::from_triples([
            (user(1), item(1), 3.0),
            (user(1), item(2), 0.0),
            (user(2), item(3), 0.0),
        ])
        .unwrap();

        assert_eq!(relevance.num_users(), 1);
        assert_eq!(relevance.user_gains(user(1)).map(|g| g.len()), Some(1));
        assert!(relevance.user_gains(user(2)).is_none());
    }

    #[test]
    fn test_negative_gain_rejected() {
        let err = Relevance::from_triples([(user(1), item(1), -1.0)]).unwrap_err();
        assert!(matches!(err, RelevanceError::InvalidGain { gain, .. } if gain == -1.0));
    }

    #[test]
    fn test_nan_gain_rejected() {
        assert!(Relevance::from_triples([(user(1), item(1), f64::NAN)]).is_err());
    }

    #[test]
    fn test_binary_relevance_threshold() {
        let relevance = Relevance::from_triples([
            (user(1), item(1), 5.0),
            (user(1), item(2), 3.0),
            (user(1), item(3), 1.0),
            (user(2), item(1), 2.0),
        ])
        .unwrap();

        let all = relevance.binary_relevance(0.0).unwrap();
        assert_eq!(all.user_relevant(user(1)).map(|s| s.len()), Some(3));
        assert_eq!(all.num_users(), 2);

        let strict = relevance.binary_relevance(3.0).unwrap();
        let u1 = strict.user_relevant(user(1)).unwrap();
        assert!(u1.contains(&item(1)) && u1.contains(&item(2)));
        assert!(!u1.contains(&item(3)));
        // User 2 has nothing at or above 3.0
        assert!(strict.user_relevant(user(2)).is_none());
    }

    #[test]
    fn test_binary_relevance_rejects_negative_threshold() {
        let relevance = Relevance::default();
        assert_eq!(
            relevance.binary_relevance(-0.5).unwrap_err(),
            ConfigError::InvalidThreshold(-0.5)
        );
    }
}
