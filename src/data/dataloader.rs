// ============================================================
// Layer 4 — Train and Evaluation Loaders
// ============================================================
// TrainLoader — pairwise rows for BPR-style training:
//
//   (user, positive item, sampled negative item)
//
//   `train_neg_sample_num` negatives per positive. Negatives are
//   redrawn and rows reshuffled every epoch from the stream
//   "train_epoch_<N>", so epoch N is identical across runs with
//   the same seed no matter what happened before it.
//
// EvalLoader — labeled pointwise rows for ranking metrics:
//
//   (user, item, label)   label 1 = held-out positive
//                         label 0 = sampled negative
//
//   Rows are built once, grouped by user (ascending), positives
//   before negatives. Batches are consecutive slices of that
//   order, so evaluation is fully deterministic.

use rand::{seq::SliceRandom, rngs::StdRng};
use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::data::sampler::NegativeSampler;
use crate::domain::interaction::{DatasetSchema, Interaction, ItemId, UserId, Vocab};
use crate::infra::config::EvalMode;
use crate::infra::seed::Seeder;

// ─── Rows ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairwiseRow {
    pub user:     UserId,
    pub pos_item: ItemId,
    pub neg_item: ItemId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalRow {
    pub user:  UserId,
    pub item:  ItemId,
    pub label: u8,
}

// ─── TrainLoader ──────────────────────────────────────────────────────────────

pub struct TrainLoader {
    schema:       DatasetSchema,
    interactions: Vec<Interaction>,
    sampler:      NegativeSampler,
    neg_num:      usize,
    batch_size:   usize,
    seeder:       Seeder,
}

impl TrainLoader {
    pub fn new(
        schema:       DatasetSchema,
        interactions: Vec<Interaction>,
        neg_num:      usize,
        batch_size:   usize,
        seeder:       Seeder,
    ) -> Self {
        let sampler = NegativeSampler::new(schema.user_num, schema.item_num, &interactions);
        Self {
            schema,
            interactions,
            sampler,
            neg_num: neg_num.max(1),
            batch_size: batch_size.max(1),
            seeder,
        }
    }

    pub fn schema(&self) -> DatasetSchema {
        self.schema
    }

    /// Train interactions per user, indexed by user id.
    pub fn user_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.schema.user_num];
        for inter in &self.interactions {
            counts[inter.user as usize] += 1;
        }
        counts
    }

    /// Train interactions per item, indexed by item id.
    pub fn item_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.schema.item_num];
        for inter in &self.interactions {
            counts[inter.item as usize] += 1;
        }
        counts
    }

    /// Freshly sampled and shuffled pairwise batches for `epoch`.
    pub fn epoch_batches(&self, epoch: usize) -> Vec<Vec<PairwiseRow>> {
        let mut rng  = self.seeder.stream(&format!("train_epoch_{epoch}"));
        let mut rows = Vec::with_capacity(self.interactions.len() * self.neg_num);
        let mut skipped = 0usize;

        for inter in &self.interactions {
            let negs = self.sampler.sample(inter.user, self.neg_num, &mut rng);
            if negs.is_empty() {
                skipped += 1;
                continue;
            }
            rows.extend(negs.into_iter().map(|neg_item| PairwiseRow {
                user:     inter.user,
                pos_item: inter.item,
                neg_item,
            }));
        }
        if skipped > 0 {
            tracing::debug!("Epoch {epoch}: {skipped} positives have no negative candidates");
        }

        rows.shuffle(&mut rng);
        rows.chunks(self.batch_size).map(<[PairwiseRow]>::to_vec).collect()
    }
}

// ─── EvalLoader ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Valid,
    Test,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Valid => write!(f, "valid"),
            Phase::Test  => write!(f, "test"),
        }
    }
}

pub struct EvalLoader {
    phase:      Phase,
    rows:       Vec<EvalRow>,
    batch_size: usize,
    vocab:      Arc<Vocab>,
}

impl EvalLoader {
    pub fn new(
        phase:      Phase,
        positives:  &[Interaction],
        seen:       &NegativeSampler,
        mode:       EvalMode,
        batch_size: usize,
        vocab:      Arc<Vocab>,
        rng:        &mut StdRng,
    ) -> Self {
        let mut by_user: BTreeMap<UserId, Vec<ItemId>> = BTreeMap::new();
        for inter in positives {
            by_user.entry(inter.user).or_default().push(inter.item);
        }

        let mut rows = Vec::new();
        for (user, items) in by_user {
            let negatives = match mode {
                EvalMode::Labeled    => Vec::new(),
                EvalMode::Uniform(n) => seen.sample_distinct(user, n * items.len(), rng),
            };
            rows.extend(items.iter().map(|&item| EvalRow { user, item, label: 1 }));
            rows.extend(negatives.into_iter().map(|item| EvalRow { user, item, label: 0 }));
        }
        tracing::debug!("{phase} loader: {} rows from {} positives", rows.len(), positives.len());

        Self { phase, rows, batch_size: batch_size.max(1), vocab }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn rows(&self) -> &[EvalRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn batches(&self) -> impl Iterator<Item = &[EvalRow]> {
        self.rows.chunks(self.batch_size)
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::seed::init_seed;
    use rand::SeedableRng;

    fn inter(user: UserId, item: ItemId) -> Interaction {
        Interaction { user, item, timestamp: None }
    }

    // 2 users, 4 items
    const SCHEMA: DatasetSchema = DatasetSchema { user_num: 3, item_num: 5 };

    fn train_loader(batch_size: usize) -> TrainLoader {
        let train = vec![inter(1, 1), inter(1, 2), inter(2, 3)];
        TrainLoader::new(SCHEMA, train, 2, batch_size, init_seed(2020, true))
    }

    #[test]
    fn test_epoch_rows_pair_positives_with_negatives() {
        let loader  = train_loader(4);
        let batches = loader.epoch_batches(1);
        let rows: Vec<PairwiseRow> = batches.concat();

        assert_eq!(rows.len(), 6);
        assert!(batches.iter().all(|b| b.len() <= 4));
        for row in rows {
            let positives: &[ItemId] = if row.user == 1 { &[1, 2] } else { &[3] };
            assert!(positives.contains(&row.pos_item));
            assert!(!positives.contains(&row.neg_item));
        }
    }

    #[test]
    fn test_epochs_are_repeatable_and_counts_match() {
        let loader = train_loader(100);
        assert_eq!(loader.epoch_batches(3), train_loader(100).epoch_batches(3));
        assert_eq!(loader.user_counts(), vec![0, 2, 1]);
        assert_eq!(loader.item_counts(), vec![0, 1, 1, 1, 0]);
    }

    #[test]
    fn test_eval_rows_group_by_user_positives_first() {
        let all  = vec![inter(1, 1), inter(1, 2), inter(2, 3), inter(2, 1)];
        let seen = NegativeSampler::new(3, 5, &all);
        let mut rng = StdRng::seed_from_u64(1);
        let loader = EvalLoader::new(
            Phase::Test, &[inter(2, 1), inter(1, 2)], &seen,
            EvalMode::Uniform(1), 2, Arc::new(Vocab::default()), &mut rng,
        );

        let rows = loader.rows();
        assert_eq!(rows.len(), 4);
        assert_eq!((rows[0].user, rows[0].item, rows[0].label), (1, 2, 1));
        assert_eq!((rows[1].user, rows[1].label), (1, 0));
        assert!([3, 4].contains(&rows[1].item));
        assert_eq!((rows[2].user, rows[2].item, rows[2].label), (2, 1, 1));
        assert!([2, 4].contains(&rows[3].item));
        assert_eq!(loader.batches().count(), 2);
    }

    #[test]
    fn test_labeled_mode_has_no_negatives() {
        let all  = vec![inter(1, 1)];
        let seen = NegativeSampler::new(3, 5, &all);
        let mut rng = StdRng::seed_from_u64(1);
        let loader = EvalLoader::new(
            Phase::Valid, &all, &seen, EvalMode::Labeled, 8,
            Arc::new(Vocab::default()), &mut rng,
        );
        assert_eq!(loader.rows(), &[EvalRow { user: 1, item: 1, label: 1 }]);
        assert_eq!(loader.phase().to_string(), "valid");
    }
}
