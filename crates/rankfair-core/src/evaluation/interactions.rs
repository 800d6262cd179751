//! Training interactions and recommendation lists.
//!
//! Both are immutable inputs delivered by collaborators outside this crate:
//! the data loader provides the training split, the recommender provides one
//! ranked list per user. Neither is re-sorted or deduplicated here.

use crate::types::{ItemId, UserId};
use std::collections::HashMap;

/// Items each user consumed during training, with optional weights.
#[derive(Debug, Clone, Default)]
pub struct TrainingInteractions {
    by_user: HashMap<UserId, HashMap<ItemId, f64>>,
}

impl TrainingInteractions {
    /// Wraps a `user -> item -> weight` map.
    pub fn new(by_user: HashMap<UserId, HashMap<ItemId, f64>>) -> Self {
        Self { by_user }
    }

    /// Builds from unweighted `(user, item)` pairs (weight 1.0).
    pub fn from_pairs(pairs: impl IntoIterator<Item = (UserId, ItemId)>) -> Self {
        let mut by_user: HashMap<UserId, HashMap<ItemId, f64>> = HashMap::new();
        for (user, item) in pairs {
            by_user.entry(user).or_default().insert(item, 1.0);
        }
        Self { by_user }
    }

    /// True if `user` interacted with `item` during training.
    pub fn contains(&self, user: UserId, item: ItemId) -> bool {
        self.by_user
            .get(&user)
            .is_some_and(|items| items.contains_key(&item))
    }

    /// Training items of `user` with their weights; `None` for unknown users.
    pub fn user_items(&self, user: UserId) -> Option<&HashMap<ItemId, f64>> {
        self.by_user.get(&user)
    }

    pub fn num_users(&self) -> usize {
        self.by_user.len()
    }

    /// Total number of (user, item) pairs.
    pub fn num_interactions(&self) -> usize {
        self.by_user.values().map(HashMap::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &HashMap<ItemId, f64>)> {
        self.by_user.iter()
    }
}

/// One ranked `(item, score)` list per user, highest score first.
///
/// Order is taken as given by the producing model; rank is the 0-based
/// position in the list. Lists may be longer than the cutoff.
#[derive(Debug, Clone, Default)]
pub struct Recommendations {
    lists: HashMap<UserId, Vec<(ItemId, f32)>>,
}

impl Recommendations {
    pub fn new(lists: HashMap<UserId, Vec<(ItemId, f32)>>) -> Self {
        Self { lists }
    }

    /// Appends `item` at the next rank of `user`'s list.
    pub fn push(&mut self, user: UserId, item: ItemId, score: f32) {
        self.lists.entry(user).or_default().push((item, score));
    }

    /// Full list for `user`.
    pub fn list(&self, user: UserId) -> Option<&[(ItemId, f32)]> {
        self.lists.get(&user).map(Vec::as_slice)
    }

    /// First `min(k, len)` entries of `user`'s list (empty for unknown users).
    pub fn top_k(&self, user: UserId, k: usize) -> &[(ItemId, f32)] {
        self.lists
            .get(&user)
            .map(|list| &list[..k.min(list.len())])
            .unwrap_or(&[])
    }

    pub fn num_users(&self) -> usize {
        self.lists.len()
    }

    pub fn users(&self) -> impl Iterator<Item = UserId> + '_ {
        self.lists.keys().copied()
    }

    pub(crate) fn lists(&self) -> &HashMap<UserId, Vec<(ItemId, f32)>> {
        &self.lists
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{item, recommendations, user};

    #[test]
    fn test_top_k_truncates_without_reordering() {
        let recs = recommendations(&[(1, &[5, 3, 9, 1])]);

        let top = recs.top_k(user(1), 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, item(5));
        assert_eq!(top[1].0, item(3));

        // Cutoff beyond list length returns the whole list
        assert_eq!(recs.top_k(user(1), 10).len(), 4);
        assert!(recs.top_k(user(2), 10).is_empty());
    }

    #[test]
    fn test_push_preserves_insertion_order() {
        let mut recs = Recommendations::default();
        recs.push(user(1), item(2), 0.1);
        recs.push(user(1), item(1), 0.9);
        let list = recs.list(user(1)).unwrap();
        assert_eq!(list[0].0, item(2), "scores must not trigger a re-sort");
    }

    #[test]
    fn test_training_membership() {
        let train = TrainingInteractions::from_pairs([(user(1), item(1)), (user(1), item(2))]);
        assert!(train.contains(user(1), item(2)));
        assert!(!train.contains(user(1), item(3)));
        assert!(!train.contains(user(9), item(1)));
        assert_eq!(train.num_interactions(), 2);
    }
}
