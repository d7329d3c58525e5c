// ============================================================
// Layer 4 — Interaction Preprocessor
// ============================================================
// Cleans raw interaction rows before ids are remapped.
//
// Filters run in this order:
//
//   1. rating interval    (`val_interval`, e.g. "[3,inf)")
//   2. duplicate removal  (`rm_dup_inter`: first | last)
//   3. interaction counts (`user_inter_num_interval`,
//                          `item_inter_num_interval`)
//
// Step 3 repeats until nothing changes: dropping a sparse item
// can push a user under its minimum, and the other way round.
//
// Intervals use the bracket notation "[lo,hi)" with `inf`
// allowed as a bound; several intervals join with ';'.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use crate::domain::interaction::RawInteraction;
use crate::error::{RecError, RecResult};
use crate::infra::config::{Config, DupPolicy};

// ─── Interval ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    lower:        f64,
    upper:        f64,
    lower_closed: bool,
    upper_closed: bool,
}

impl Interval {
    /// Parse one interval such as "[0,inf)" or "(1.5,4]".
    pub fn parse(raw: &str) -> RecResult<Self> {
        let s   = raw.trim();
        let bad = || RecError::config(format!("malformed interval `{raw}` (expected e.g. \"[0,inf)\")"));

        let (lower_closed, rest) = if let Some(rest) = s.strip_prefix('[') {
            (true, rest)
        } else if let Some(rest) = s.strip_prefix('(') {
            (false, rest)
        } else {
            return Err(bad());
        };
        let (upper_closed, body) = if let Some(body) = rest.strip_suffix(']') {
            (true, body)
        } else if let Some(body) = rest.strip_suffix(')') {
            (false, body)
        } else {
            return Err(bad());
        };
        let (lo, hi) = body.split_once(',').ok_or_else(bad)?;
        let lower = f64::from_str(lo.trim()).map_err(|_| bad())?;
        let upper = f64::from_str(hi.trim()).map_err(|_| bad())?;
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(bad());
        }

        Ok(Self { lower, upper, lower_closed, upper_closed })
    }

    /// Parse a ';'-separated union of intervals.
    pub fn parse_union(raw: &str) -> RecResult<Vec<Self>> {
        raw.split(';').map(Interval::parse).collect()
    }

    pub fn contains(&self, x: f64) -> bool {
        let above = if self.lower_closed { x >= self.lower } else { x > self.lower };
        let below = if self.upper_closed { x <= self.upper } else { x < self.upper };
        above && below
    }

    /// True for "[0,inf)" and anything wider: every count passes.
    fn accepts_all_counts(&self) -> bool {
        self.contains(0.0) && self.upper == f64::INFINITY
    }
}

fn in_any(intervals: &[Interval], x: f64) -> bool {
    intervals.iter().any(|i| i.contains(x))
}

// ─── Preprocessor ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    rating_filter: Option<Vec<Interval>>,
    dup_policy:    Option<DupPolicy>,
    user_counts:   Vec<Interval>,
    item_counts:   Vec<Interval>,
}

impl Preprocessor {
    pub fn from_config(config: &Config) -> RecResult<Self> {
        let parse = |raw: &Option<String>| raw.as_deref().map(Interval::parse_union).transpose();
        let mut pre = Self { rating_filter: parse(&config.val_interval)?, ..Self::default() };
        if let Some(policy) = config.rm_dup_inter {
            pre = pre.with_dup_policy(policy);
        }
        Ok(pre.with_count_filters(
            parse(&config.user_inter_num_interval)?.unwrap_or_default(),
            parse(&config.item_inter_num_interval)?.unwrap_or_default(),
        ))
    }

    pub fn with_dup_policy(mut self, policy: DupPolicy) -> Self {
        self.dup_policy = Some(policy);
        self
    }

    pub fn with_count_filters(mut self, user: Vec<Interval>, item: Vec<Interval>) -> Self {
        self.user_counts = user;
        self.item_counts = item;
        self
    }

    /// Run every configured filter, in order.
    pub fn apply(&self, rows: Vec<RawInteraction>) -> Vec<RawInteraction> {
        let before = rows.len();
        let rows   = self.filter_by_rating(rows);
        let rows   = self.remove_duplicates(rows);
        let rows   = self.filter_by_inter_num(rows);
        tracing::debug!("Preprocessing kept {} of {} interactions", rows.len(), before);
        rows
    }

    fn filter_by_rating(&self, rows: Vec<RawInteraction>) -> Vec<RawInteraction> {
        let Some(intervals) = &self.rating_filter else {
            return rows;
        };
        if rows.iter().all(|r| r.rating.is_none()) {
            tracing::warn!("val_interval is set but the dataset has no rating column; skipping");
            return rows;
        }
        rows.into_iter()
            .filter(|r| r.rating.is_some_and(|x| in_any(intervals, x)))
            .collect()
    }

    fn remove_duplicates(&self, mut rows: Vec<RawInteraction>) -> Vec<RawInteraction> {
        let Some(policy) = self.dup_policy else {
            return rows;
        };

        // With timestamps, "first" and "last" mean in time, not in the file
        if rows.iter().any(|r| r.timestamp.is_some()) {
            rows.sort_by(|a, b| {
                a.timestamp
                    .partial_cmp(&b.timestamp)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        if policy == DupPolicy::Last {
            rows.reverse();
        }
        let mut seen = HashSet::new();
        rows.retain(|r| seen.insert((r.user.clone(), r.item.clone())));
        if policy == DupPolicy::Last {
            rows.reverse();
        }
        rows
    }

    fn filter_by_inter_num(&self, mut rows: Vec<RawInteraction>) -> Vec<RawInteraction> {
        let users_free = self.user_counts.iter().any(Interval::accepts_all_counts) || self.user_counts.is_empty();
        let items_free = self.item_counts.iter().any(Interval::accepts_all_counts) || self.item_counts.is_empty();
        if users_free && items_free {
            return rows;
        }

        loop {
            let mut user_n: HashMap<&str, usize> = HashMap::new();
            let mut item_n: HashMap<&str, usize> = HashMap::new();
            for r in &rows {
                *user_n.entry(r.user.as_str()).or_default() += 1;
                *item_n.entry(r.item.as_str()).or_default() += 1;
            }

            let keep: Vec<bool> = rows
                .iter()
                .map(|r| {
                    (users_free || in_any(&self.user_counts, user_n[r.user.as_str()] as f64))
                        && (items_free || in_any(&self.item_counts, item_n[r.item.as_str()] as f64))
                })
                .collect();

            if keep.iter().all(|k| *k) {
                return rows;
            }
            let mut flags = keep.into_iter();
            rows.retain(|_| flags.next().unwrap_or(false));
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn raw(user: &str, item: &str) -> RawInteraction {
        RawInteraction::new(user, item)
    }

    #[test]
    fn test_interval_parsing_and_bounds() {
        let i = Interval::parse("[2,inf)").unwrap();
        assert!(!i.contains(1.0));
        assert!(i.contains(2.0));
        assert!(i.contains(1e9));

        let j = Interval::parse("(1, 3]").unwrap();
        assert!(!j.contains(1.0));
        assert!(j.contains(3.0));
    }

    #[test]
    fn test_malformed_intervals_are_rejected() {
        for bad in ["", "[", "2,3", "[3,2]", "[a,b)", "{1,2}", "«0,inf)", "[0,inf»"] {
            assert!(Interval::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_interval_union() {
        let u = Interval::parse_union("[0,1];[5,inf)").unwrap();
        assert!(in_any(&u, 0.5));
        assert!(!in_any(&u, 3.0));
        assert!(in_any(&u, 7.0));
    }

    #[test]
    fn test_rating_filter() {
        let pre = Preprocessor {
            rating_filter: Some(Interval::parse_union("[3,inf)").unwrap()),
            ..Default::default()
        };
        let rows = vec![
            raw("u1", "i1").with_rating(5.0),
            raw("u1", "i2").with_rating(1.0),
            raw("u2", "i1"),
        ];
        let kept = pre.apply(rows);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].item, "i1");
    }

    #[test]
    fn test_duplicates_keep_first_or_last() {
        let rows = vec![
            raw("u1", "i1").with_rating(1.0),
            raw("u1", "i2"),
            raw("u1", "i1").with_rating(4.0),
        ];

        let first = Preprocessor::default().with_dup_policy(DupPolicy::First).apply(rows.clone());
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].rating, Some(1.0));

        let last = Preprocessor::default().with_dup_policy(DupPolicy::Last).apply(rows);
        assert_eq!(last.len(), 2);
        assert_eq!(last[1].rating, Some(4.0));
        assert_eq!(last[0].item, "i2");
    }

    #[test]
    fn test_count_filter_iterates_to_fixed_point() {
        // First pass drops i3 and u3 (one interaction each). That leaves
        // u2 with a single interaction, so the second pass drops u2.
        let rows = vec![
            raw("u1", "i1"), raw("u1", "i2"),
            raw("u2", "i1"), raw("u2", "i3"),
            raw("u3", "i2"),
            raw("u4", "i1"), raw("u4", "i2"),
        ];
        let at_least_two = Interval::parse_union("[2,inf)").unwrap();
        let pre = Preprocessor::default().with_count_filters(at_least_two.clone(), at_least_two);
        let kept = pre.apply(rows);

        let users: HashSet<&str> = kept.iter().map(|r| r.user.as_str()).collect();
        assert_eq!(users, HashSet::from(["u1", "u4"]));
        assert_eq!(kept.len(), 4);
    }
}
