// ============================================================
// Layer 4 — Negative Sampler
// ============================================================
// Draws "negative" items for a user: items the user has no
// recorded interaction with. Candidates are every real item
// id (1..item_num) minus the user's positives.
//
// Which positives count depends on the phase:
//   training   → the user's train interactions
//   evaluation → every interaction of the user in the dataset

use rand::{rngs::StdRng, seq::SliceRandom, Rng};
use std::collections::HashSet;

use crate::domain::interaction::{Interaction, ItemId, UserId};

#[derive(Debug, Clone)]
pub struct NegativeSampler {
    item_num:  usize,
    positives: Vec<HashSet<ItemId>>,
}

impl NegativeSampler {
    pub fn new(user_num: usize, item_num: usize, interactions: &[Interaction]) -> Self {
        let mut positives = vec![HashSet::new(); user_num];
        for inter in interactions {
            positives[inter.user as usize].insert(inter.item);
        }
        Self { item_num, positives }
    }

    fn positives_of(&self, user: UserId) -> Option<&HashSet<ItemId>> {
        self.positives.get(user as usize)
    }

    /// How many items are valid negatives for `user`.
    pub fn candidate_count(&self, user: UserId) -> usize {
        let taken = self.positives_of(user).map_or(0, HashSet::len);
        self.item_num.saturating_sub(1).saturating_sub(taken)
    }

    fn candidates(&self, user: UserId) -> Vec<ItemId> {
        let positives = self.positives_of(user);
        (1..self.item_num as ItemId)
            .filter(|i| !positives.is_some_and(|p| p.contains(i)))
            .collect()
    }

    fn is_negative(&self, user: UserId, item: ItemId) -> bool {
        !self.positives_of(user).is_some_and(|p| p.contains(&item))
    }

    /// `n` negatives drawn with replacement. Empty when the user has
    /// interacted with every item.
    pub fn sample(&self, user: UserId, n: usize, rng: &mut StdRng) -> Vec<ItemId> {
        let available = self.candidate_count(user);
        if available == 0 || n == 0 {
            return Vec::new();
        }

        // Rejection sampling stays cheap while most items are candidates
        if available * 4 >= self.item_num {
            let mut out = Vec::with_capacity(n);
            while out.len() < n {
                let item = rng.gen_range(1..self.item_num as ItemId);
                if self.is_negative(user, item) {
                    out.push(item);
                }
            }
            return out;
        }

        let pool = self.candidates(user);
        (0..n).filter_map(|_| pool.choose(rng).copied()).collect()
    }

    /// Up to `n` distinct negatives; fewer when the user has fewer candidates.
    pub fn sample_distinct(&self, user: UserId, n: usize, rng: &mut StdRng) -> Vec<ItemId> {
        let pool = self.candidates(user);
        pool.choose_multiple(rng, n.min(pool.len())).copied().collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn inter(user: UserId, item: ItemId) -> Interaction {
        Interaction { user, item, timestamp: None }
    }

    fn sampler() -> NegativeSampler {
        // 2 users, items 1..=5
        NegativeSampler::new(3, 6, &[inter(1, 1), inter(1, 2), inter(2, 1)])
    }

    #[test]
    fn test_samples_never_hit_positives_or_padding() {
        let s   = sampler();
        let mut rng = StdRng::seed_from_u64(3);
        for item in s.sample(1, 200, &mut rng) {
            assert!((3..=5).contains(&item), "drew {item}");
        }
    }

    #[test]
    fn test_distinct_samples_are_capped_by_candidates() {
        let s   = sampler();
        let mut rng = StdRng::seed_from_u64(3);
        let mut got = s.sample_distinct(1, 10, &mut rng);
        got.sort_unstable();
        assert_eq!(got, vec![3, 4, 5]);
    }

    #[test]
    fn test_saturated_user_gets_no_negatives() {
        let s = NegativeSampler::new(2, 3, &[inter(1, 1), inter(1, 2)]);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(s.candidate_count(1), 0);
        assert!(s.sample(1, 5, &mut rng).is_empty());
        assert!(s.sample_distinct(1, 5, &mut rng).is_empty());
    }

    #[test]
    fn test_same_seed_same_draws() {
        let s = sampler();
        let a = s.sample(2, 20, &mut StdRng::seed_from_u64(11));
        let b = s.sample(2, 20, &mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
    }
}
