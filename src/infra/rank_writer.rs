// ============================================================
// Layer 6 — Rank File Writer
// ============================================================
// Persists the scored test pairs as
//
//   <rank_save_dir>/<dataset>/<model>_rank.csv
//
// Format: tab-separated, header row `uid iid score label`,
// no index column. The directory tree is created when missing
// and an existing file is truncated, never appended to.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::rank::{RankRow, RANK_COLUMNS};
use crate::error::RecResult;

/// Where the rank file of a (dataset, model) pair lives.
pub fn rank_file_path(root: &Path, dataset: &str, model: &str) -> PathBuf {
    root.join(dataset).join(format!("{model}_rank.csv"))
}

/// Write `rows` and return the path written.
pub fn write_rank_file(root: &Path, dataset: &str, model: &str, rows: &[RankRow]) -> RecResult<PathBuf> {
    let dir = root.join(dataset);
    fs::create_dir_all(&dir)?;
    let path = rank_file_path(root, dataset, model);

    // The header is written by hand so an empty result still has one
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(&path)?;
    writer.write_record(RANK_COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    tracing::debug!("Wrote {} rank rows to '{}'", rows.len(), path.display());
    Ok(path)
}
