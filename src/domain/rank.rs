// ============================================================
// Layer 3 — Rank Row
// ============================================================
// One line of the rank file: a scored (user, item) pair and
// whether the pair was actually observed in the test split.
//
// Field order here is the column order of the output file:
//   uid  iid  score  label

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankRow {
    /// Original user token
    pub uid: String,

    /// Original item token
    pub iid: String,

    /// Model prediction for the pair
    pub score: f32,

    /// 1 = observed positive, 0 = sampled negative
    pub label: u8,
}

/// Column names of the rank file, in order.
pub const RANK_COLUMNS: [&str; 4] = ["uid", "iid", "score", "label"];
