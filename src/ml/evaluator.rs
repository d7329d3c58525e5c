// ============================================================
// Layer 5 — Ranking Evaluator
// ============================================================
// Scores every evaluation row, ranks each user's candidates
// and averages top-k metrics over users:
//
//   recall@k     hits in top k / user's positives
//   mrr@k        1 / rank of the first hit (0 if none in top k)
//   ndcg@k       DCG@k / ideal DCG@k, binary relevance
//   hit@k        1 if any positive is in the top k
//   precision@k  hits in top k / k
//
// Candidates are ordered by score descending, ties broken by
// item id ascending. Users without a positive row are skipped.

use serde::Serialize;
use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::data::dataloader::EvalRow;
use crate::domain::interaction::{ItemId, UserId, Vocab};
use crate::domain::rank::RankRow;
use crate::error::{RecError, RecResult};
use crate::infra::config::Config;

// ─── Metric names ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Recall,
    Mrr,
    Ndcg,
    Hit,
    Precision,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Recall    => "recall",
            Metric::Mrr       => "mrr",
            Metric::Ndcg      => "ndcg",
            Metric::Hit       => "hit",
            Metric::Precision => "precision",
        }
    }

    /// Value for one user, given the 0/1 labels of its ranked candidates.
    fn user_value(&self, ranked: &[u8], positives: usize, k: usize) -> f64 {
        let top  = &ranked[..k.min(ranked.len())];
        let hits = top.iter().filter(|l| **l == 1).count() as f64;
        match self {
            Metric::Recall    => hits / positives as f64,
            Metric::Precision => hits / k as f64,
            Metric::Hit       => if hits > 0.0 { 1.0 } else { 0.0 },
            Metric::Mrr       => top
                .iter()
                .position(|l| *l == 1)
                .map_or(0.0, |rank| 1.0 / (rank + 1) as f64),
            Metric::Ndcg => {
                let dcg: f64 = top
                    .iter()
                    .enumerate()
                    .filter(|(_, l)| **l == 1)
                    .map(|(i, _)| discount(i))
                    .sum();
                let idcg: f64 = (0..positives.min(k)).map(discount).sum();
                dcg / idcg
            }
        }
    }
}

fn discount(rank: usize) -> f64 {
    1.0 / ((rank + 2) as f64).log2()
}

impl FromStr for Metric {
    type Err = RecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "recall"    => Ok(Metric::Recall),
            "mrr"       => Ok(Metric::Mrr),
            "ndcg"      => Ok(Metric::Ndcg),
            "hit"       => Ok(Metric::Hit),
            "precision" => Ok(Metric::Precision),
            _ => Err(RecError::config(format!(
                "unknown metric `{s}` (expected Recall, MRR, NDCG, Hit or Precision)"
            ))),
        }
    }
}

/// A metric at a cutoff, written `MRR@10` in config and `mrr@10` in results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricKey {
    pub metric: Metric,
    pub k:      usize,
}

impl FromStr for MetricKey {
    type Err = RecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, k) = s.split_once('@').ok_or_else(|| {
            RecError::config(format!("metric key `{s}` must look like `MRR@10`"))
        })?;
        let k = k
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|k| *k > 0)
            .ok_or_else(|| RecError::config(format!("metric key `{s}` has an invalid cutoff")))?;
        Ok(Self { metric: name.parse()?, k })
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.metric.name(), self.k)
    }
}

// ─── MetricMap ────────────────────────────────────────────────────────────────

/// Ordered metric results, e.g. `{"mrr@10": 0.41, "recall@10": 0.73}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricMap(BTreeMap<String, f64>);

impl MetricMap {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl fmt::Display for MetricMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{k} : {v:.4}")).collect();
        write!(f, "{}", parts.join("    "))
    }
}

// ─── Evaluator ────────────────────────────────────────────────────────────────

/// An evaluation row with the model's score attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRow {
    pub user:  UserId,
    pub item:  ItemId,
    pub label: u8,
    pub score: f32,
}

impl ScoredRow {
    pub fn new(row: &EvalRow, score: f32) -> Self {
        Self { user: row.user, item: row.item, label: row.label, score }
    }
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    metrics: Vec<Metric>,
    topk:    Vec<usize>,
}

impl Evaluator {
    pub fn new(metrics: Vec<Metric>, topk: Vec<usize>) -> Self {
        Self { metrics, topk }
    }

    pub fn from_config(config: &Config) -> RecResult<Self> {
        let metrics = config
            .metrics
            .iter()
            .map(|m| m.parse())
            .collect::<RecResult<Vec<Metric>>>()?;
        Ok(Self::new(metrics, config.topk.clone()))
    }

    /// Rank each user's rows and compute every configured metric.
    ///
    /// Users come out in order of first appearance; within a user the
    /// rows are in rank order.
    pub fn evaluate(&self, rows: Vec<ScoredRow>) -> (MetricMap, Vec<ScoredRow>) {
        let ranked = rank_by_user(rows);

        let mut sums: BTreeMap<String, f64> = BTreeMap::new();
        let mut users = 0usize;
        for group in ranked.chunk_by(|a, b| a.user == b.user) {
            let labels: Vec<u8> = group.iter().map(|r| r.label).collect();
            let positives = labels.iter().filter(|l| **l == 1).count();
            if positives == 0 {
                continue;
            }
            users += 1;
            for metric in &self.metrics {
                for &k in &self.topk {
                    let key = MetricKey { metric: *metric, k }.to_string();
                    *sums.entry(key).or_default() += metric.user_value(&labels, positives, k);
                }
            }
        }

        let mut result = MetricMap::default();
        for metric in &self.metrics {
            for &k in &self.topk {
                let key   = MetricKey { metric: *metric, k }.to_string();
                let total = sums.get(&key).copied().unwrap_or(0.0);
                let mean  = if users == 0 { 0.0 } else { total / users as f64 };
                result.insert(key, mean);
            }
        }
        (result, ranked)
    }
}

/// Group rows by user (first appearance), then score desc / item asc.
pub fn rank_by_user(rows: Vec<ScoredRow>) -> Vec<ScoredRow> {
    let mut order: Vec<UserId> = Vec::new();
    let mut groups: BTreeMap<UserId, Vec<ScoredRow>> = BTreeMap::new();
    for row in rows {
        let group = groups.entry(row.user).or_default();
        if group.is_empty() {
            order.push(row.user);
        }
        group.push(row);
    }

    let mut ranked = Vec::new();
    for user in order {
        if let Some(mut group) = groups.remove(&user) {
            group.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.item.cmp(&b.item)));
            ranked.extend(group);
        }
    }
    ranked
}

/// Ranked rows with ids mapped back to the original tokens.
pub fn to_rank_rows(ranked: &[ScoredRow], vocab: &Vocab) -> Vec<RankRow> {
    ranked
        .iter()
        .map(|r| RankRow {
            uid:   vocab.user_token(r.user).to_string(),
            iid:   vocab.item_token(r.item).to_string(),
            score: r.score,
            label: r.label,
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn row(user: UserId, item: ItemId, label: u8, score: f32) -> ScoredRow {
        ScoredRow { user, item, label, score }
    }

    fn all_metrics(k: usize) -> Evaluator {
        let metrics = ["recall", "mrr", "ndcg", "hit", "precision"]
            .iter()
            .map(|m| m.parse().unwrap())
            .collect();
        Evaluator::new(metrics, vec![k])
    }

    #[test]
    fn test_metric_names_parse_case_insensitively() {
        assert_eq!("MRR".parse::<Metric>().unwrap(), Metric::Mrr);
        assert!(matches!("AUC".parse::<Metric>(), Err(RecError::Config(_))));

        let key: MetricKey = "NDCG@5".parse().unwrap();
        assert_eq!(key.to_string(), "ndcg@5");
        assert!("MRR@0".parse::<MetricKey>().is_err());
        assert!("MRR".parse::<MetricKey>().is_err());
    }

    #[test]
    fn test_perfect_ranking_scores_one() {
        let rows = vec![row(1, 1, 1, 0.9), row(1, 2, 0, 0.1)];
        let (m, _) = all_metrics(1).evaluate(rows);
        for key in ["recall@1", "mrr@1", "ndcg@1", "hit@1", "precision@1"] {
            assert!((m.get(key).unwrap() - 1.0).abs() < 1e-12, "{key}");
        }
    }

    #[test]
    fn test_second_place_hit() {
        // user 1: positive ranked 2nd of 3
        let rows = vec![row(1, 1, 0, 0.9), row(1, 2, 1, 0.5), row(1, 3, 0, 0.1)];
        let (m, _) = all_metrics(2).evaluate(rows);
        assert_eq!(m.get("recall@2"), Some(1.0));
        assert_eq!(m.get("mrr@2"), Some(0.5));
        assert_eq!(m.get("precision@2"), Some(0.5));
        assert!((m.get("ndcg@2").unwrap() - 1.0 / 3f64.log2()).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_average_over_users_with_positives() {
        let rows = vec![
            row(1, 1, 1, 0.9), row(1, 2, 0, 0.1), // hit
            row(2, 1, 0, 0.9), row(2, 2, 1, 0.1), // miss at k = 1
            row(3, 1, 0, 0.5),                    // no positives, skipped
        ];
        let (m, _) = all_metrics(1).evaluate(rows);
        assert_eq!(m.get("hit@1"), Some(0.5));
        assert_eq!(m.iter().count(), 5);
    }

    #[test]
    fn test_no_positive_users_gives_zeros() {
        let (m, _) = all_metrics(10).evaluate(vec![row(1, 1, 0, 0.3)]);
        assert_eq!(m.get("recall@10"), Some(0.0));
    }

    #[test]
    fn test_ranking_breaks_ties_by_item() {
        let rows = vec![row(2, 5, 0, 0.5), row(2, 3, 1, 0.5), row(1, 7, 1, 0.1), row(2, 9, 0, 0.8)];
        let ranked: Vec<(UserId, ItemId)> =
            rank_by_user(rows).iter().map(|r| (r.user, r.item)).collect();
        assert_eq!(ranked, vec![(2, 9), (2, 3), (2, 5), (1, 7)]);
    }

    #[test]
    fn test_metric_map_display() {
        let mut m = MetricMap::default();
        m.insert("recall@10", 0.5);
        m.insert("mrr@10", 0.25);
        assert_eq!(m.to_string(), "mrr@10 : 0.2500    recall@10 : 0.5000");
    }

    #[test]
    fn test_rank_rows_use_original_tokens() {
        let vocab = Vocab {
            users: vec!["[PAD]".into(), "alice".into()],
            items: vec!["[PAD]".into(), "oolong".into()],
        };
        let rows = to_rank_rows(&[row(1, 1, 1, 0.7)], &vocab);
        assert_eq!(rows[0].uid, "alice");
        assert_eq!(rows[0].iid, "oolong");
        assert_eq!(rows[0].label, 1);
    }
}
