// ============================================================
// Layer 6 — Epoch Metrics Logger
// ============================================================
// Appends one row per training epoch to
//
//   <checkpoint_dir>/metrics.csv
//
// so learning curves survive the run. The file is shared by
// every (model, dataset) pair, which is why those are columns.
//
// Example:
//   model,dataset,epoch,train_loss,valid_score
//   BPR,milk_tea,1,0.693012,0.412500
//   BPR,milk_tea,2,0.681944,
//
// An empty valid_score means the epoch was not evaluated.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::error::RecResult;

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Mean pairwise loss over all training batches
    pub train_loss: f64,

    /// Validation metric, when this epoch was evaluated
    pub valid_score: Option<f64>,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, valid_score: Option<f64>) -> Self {
        Self { epoch, train_loss, valid_score }
    }

    /// Does this epoch beat `best`? `bigger` says which direction is better.
    pub fn is_improvement(&self, best: f64, bigger: bool) -> bool {
        match self.valid_score {
            Some(score) if bigger => score > best,
            Some(score)           => score < best,
            None                  => false,
        }
    }
}

/// One `metrics.csv` record; floats are pre-formatted to six decimals.
#[derive(Serialize)]
struct MetricsRow<'a> {
    model:       &'a str,
    dataset:     &'a str,
    epoch:       usize,
    train_loss:  String,
    valid_score: Option<String>,
}

/// Appends epoch metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
    model:    String,
    dataset:  String,
}

impl MetricsLogger {
    pub fn new(dir: &Path, model: &str, dataset: &str) -> RecResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            csv_path: dir.join("metrics.csv"),
            model:    model.to_string(),
            dataset:  dataset.to_string(),
        })
    }

    /// Append one row; the header goes in only when the file is new or empty.
    pub fn log(&self, m: &EpochMetrics) -> RecResult<()> {
        let fresh = fs::metadata(&self.csv_path).map(|meta| meta.len() == 0).unwrap_or(true);
        let file  = OpenOptions::new().create(true).append(true).open(&self.csv_path)?;
        if fresh {
            tracing::debug!("Created metrics CSV: '{}'", self.csv_path.display());
        }

        let mut writer = csv::WriterBuilder::new().has_headers(fresh).from_writer(file);
        writer.serialize(MetricsRow {
            model:       &self.model,
            dataset:     &self.dataset,
            epoch:       m.epoch,
            train_loss:  format!("{:.6}", m.train_loss),
            valid_score: m.valid_score.map(|s| format!("{s:.6}")),
        })?;
        writer.flush()?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
