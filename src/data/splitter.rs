// ============================================================
// Layer 4 — Train/Validation/Test Splitter
// ============================================================
// Splits the remapped interactions into train, valid and test
// by ratio (`eval_args.split.RS`, e.g. [0.8, 0.1, 0.1]).
//
//   order = RO   shuffle first ("split" stream)
//   order = TO   stable sort by timestamp, oldest first
//
//   group_by = user   every user is split on its own, so each
//                     user with enough history appears in all
//                     three parts
//
// Part sizes for a group of n interactions:
//
//   cnt[i] = floor(n * r[i])        for i >= 1
//   cnt[0] = n - sum(cnt[1..])
//
// then, from the last part back to the second, a part whose
// exact share n * r[i] lies in (0, 1) takes one interaction
// from train while train still holds more than one.
//
// The splitter also ranks users by train activity to produce
// the two fairness groups.

use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashMap};

use crate::data::dataloader::{EvalLoader, Phase, TrainLoader};
use crate::data::dataset::RecDataset;
use crate::data::sampler::NegativeSampler;
use crate::domain::interaction::{Interaction, UserId};
use crate::error::{RecError, RecResult};
use crate::infra::config::{Config, GroupBy, SplitOrder};
use crate::infra::seed::Seeder;

/// Everything `data_preparation` hands back to the run.
pub struct SplitOutput {
    pub train:        TrainLoader,
    pub valid:        EvalLoader,
    pub test:         EvalLoader,
    pub g1_user_list: Vec<UserId>,
    pub g2_user_list: Vec<UserId>,
}

/// Split the dataset and wrap each part in its loader.
pub fn data_preparation(config: &Config, dataset: &RecDataset, seeder: &Seeder) -> RecResult<SplitOutput> {
    let args  = &config.eval_args;
    let parts = split_by_ratio(
        dataset.interactions().to_vec(),
        &args.split.ratios,
        args.order,
        args.group_by,
        seeder,
    )?;
    let [train, valid, test] = parts;

    tracing::info!(
        "Split {} interactions of '{}': train={}, valid={}, test={}",
        dataset.inter_num(),
        dataset.name(),
        train.len(),
        valid.len(),
        test.len(),
    );
    if train.is_empty() {
        return Err(RecError::dataset("the train split is empty"));
    }

    let (g1_user_list, g2_user_list) =
        fairness_groups(&train, dataset.user_num(), config.fairness_group_ratio);

    let schema = dataset.schema();
    let vocab  = dataset.vocab();
    // Evaluation negatives must avoid every item the user touched
    let seen   = NegativeSampler::new(schema.user_num, schema.item_num, dataset.interactions());
    let mode   = args.mode;

    let valid = EvalLoader::new(
        Phase::Valid, &valid, &seen, mode, config.eval_batch_size, vocab.clone(),
        &mut seeder.stream("valid_neg"),
    );
    let test = EvalLoader::new(
        Phase::Test, &test, &seen, mode, config.eval_batch_size, vocab,
        &mut seeder.stream("test_neg"),
    );
    let train = TrainLoader::new(
        schema, train, config.train_neg_sample_num, config.train_batch_size, *seeder,
    );

    Ok(SplitOutput { train, valid, test, g1_user_list, g2_user_list })
}

/// Three-way ratio split.
pub fn split_by_ratio(
    mut interactions: Vec<Interaction>,
    ratios:           &[f64],
    order:            SplitOrder,
    group_by:         Option<GroupBy>,
    seeder:           &Seeder,
) -> RecResult<[Vec<Interaction>; 3]> {
    let total: f64 = ratios.iter().sum();
    if ratios.len() != 3 || total <= 0.0 {
        return Err(RecError::config(format!("cannot split with ratios {ratios:?}")));
    }
    let ratios: Vec<f64> = ratios.iter().map(|r| r / total).collect();

    match order {
        SplitOrder::Random => interactions.shuffle(&mut seeder.stream("split")),
        SplitOrder::Temporal => interactions.sort_by(|a, b| {
            a.timestamp
                .partial_cmp(&b.timestamp)
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
    }

    let groups: Vec<Vec<Interaction>> = match group_by {
        Some(GroupBy::User) => {
            let mut by_user: BTreeMap<UserId, Vec<Interaction>> = BTreeMap::new();
            for inter in interactions {
                by_user.entry(inter.user).or_default().push(inter);
            }
            by_user.into_values().collect()
        }
        None => vec![interactions],
    };

    let mut parts: [Vec<Interaction>; 3] = Default::default();
    for group in groups {
        let sizes    = split_sizes(group.len(), &ratios);
        let mut rest = group.into_iter();
        for (part, size) in parts.iter_mut().zip(sizes) {
            part.extend(rest.by_ref().take(size));
        }
    }
    Ok(parts)
}

/// Part sizes for `n` interactions; they always sum to `n`.
pub fn split_sizes(n: usize, ratios: &[f64]) -> Vec<usize> {
    let mut cnt: Vec<usize> = ratios.iter().map(|r| (n as f64 * r).floor() as usize).collect();
    let rest: usize = cnt[1..].iter().sum();
    cnt[0] = n.saturating_sub(rest);

    for i in (1..ratios.len()).rev() {
        if cnt[0] <= 1 {
            break;
        }
        let share = n as f64 * ratios[i];
        if share > 0.0 && share < 1.0 {
            cnt[i] += 1;
            cnt[0] -= 1;
        }
    }
    cnt
}

/// Most active users (g1) and everybody else (g2), by train count.
///
/// g1 holds the top `ceil(ratio * users)` users, at least one when any
/// user exists. Ties break by user id.
pub fn fairness_groups(train: &[Interaction], user_num: usize, ratio: f64) -> (Vec<UserId>, Vec<UserId>) {
    let mut counts: HashMap<UserId, usize> = HashMap::new();
    for inter in train {
        *counts.entry(inter.user).or_default() += 1;
    }

    let mut users: Vec<UserId> = (1..user_num as UserId).collect();
    users.sort_by(|a, b| {
        let (ca, cb) = (counts.get(a).copied().unwrap_or(0), counts.get(b).copied().unwrap_or(0));
        cb.cmp(&ca).then(a.cmp(b))
    });

    let top = if users.is_empty() {
        0
    } else {
        ((ratio * users.len() as f64).ceil() as usize).clamp(1, users.len())
    };
    let g2 = users.split_off(top);
    tracing::debug!("Fairness groups: g1={} users, g2={} users", users.len(), g2.len());
    (users, g2)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::seed::init_seed;

    const RS: [f64; 3] = [0.8, 0.1, 0.1];

    fn inter(user: UserId, item: u32) -> Interaction {
        Interaction { user, item, timestamp: Some(f64::from(item)) }
    }

    fn many(user: UserId, n: u32) -> Vec<Interaction> {
        (1..=n).map(|i| inter(user, i)).collect()
    }

    #[test]
    fn test_correct_split_sizes() {
        assert_eq!(split_sizes(100, &RS), vec![80, 10, 10]);
        assert_eq!(split_sizes(10, &RS), vec![8, 1, 1]);
    }

    #[test]
    fn test_small_groups_borrow_from_train() {
        // 5 * 0.1 = 0.5 for both valid and test
        assert_eq!(split_sizes(5, &RS), vec![3, 1, 1]);
        // train must keep at least one interaction
        assert_eq!(split_sizes(2, &RS), vec![1, 0, 1]);
        assert_eq!(split_sizes(1, &RS), vec![1, 0, 0]);
        assert_eq!(split_sizes(0, &RS), vec![0, 0, 0]);
    }

    #[test]
    fn test_all_items_preserved() {
        let seeder = init_seed(7, true);
        let mut all = many(1, 7);
        all.extend(many(2, 3));
        all.extend(many(3, 1));
        let parts = split_by_ratio(all, &RS, SplitOrder::Random, Some(GroupBy::User), &seeder).unwrap();

        let mut seen: Vec<(UserId, u32)> =
            parts.iter().flatten().map(|i| (i.user, i.item)).collect();
        seen.sort_unstable();
        assert_eq!(seen.len(), 11);
        seen.dedup();
        assert_eq!(seen.len(), 11);

        // user 3 has a single interaction and keeps it in train
        assert!(parts[0].iter().any(|i| i.user == 3));
    }

    #[test]
    fn test_temporal_order_puts_latest_in_test() {
        let seeder = init_seed(7, true);
        let mut all = many(1, 10);
        all.reverse();
        let [train, valid, test] =
            split_by_ratio(all, &RS, SplitOrder::Temporal, Some(GroupBy::User), &seeder).unwrap();
        assert_eq!(train.iter().map(|i| i.item).max(), Some(8));
        assert_eq!(valid[0].item, 9);
        assert_eq!(test[0].item, 10);
    }

    #[test]
    fn test_random_split_is_repeatable() {
        let seeder = init_seed(2020, true);
        let a = split_by_ratio(many(1, 30), &RS, SplitOrder::Random, None, &seeder).unwrap();
        let b = split_by_ratio(many(1, 30), &RS, SplitOrder::Random, None, &seeder).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fairness_groups_rank_by_activity() {
        let mut train = many(2, 5);
        train.extend(many(1, 2));
        train.extend(many(3, 2));

        // 3 users, ratio 0.05 → at least one user in g1
        let (g1, g2) = fairness_groups(&train, 4, 0.05);
        assert_eq!(g1, vec![2]);
        assert_eq!(g2, vec![1, 3]);

        let (g1, g2) = fairness_groups(&train, 4, 0.5);
        assert_eq!(g1, vec![2, 1]);
        assert_eq!(g2, vec![3]);
    }

    #[test]
    fn test_fairness_groups_without_users() {
        let (g1, g2) = fairness_groups(&[], 1, 0.5);
        assert!(g1.is_empty() && g2.is_empty());
    }
}
