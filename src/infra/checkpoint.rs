// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves the best model of a run with burn's CompactRecorder,
// next to a JSON copy of the configuration that produced it:
//
//   <checkpoint_dir>/
//     BPR-milk_tea.mpk   ← weights (MessagePack)
//     BPR-milk_tea.json     ← merged config of the run
//
// A later run of the same (model, dataset) overwrites both.
// The config is needed to rebuild the exact architecture
// (embedding_size, user/item counts) before loading weights.

use burn::{prelude::*, record::CompactRecorder};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{RecError, RecResult};
use crate::infra::config::Config;

pub struct CheckpointManager {
    dir:  PathBuf,
    stem: String,
}

impl CheckpointManager {
    /// Creates `dir` if needed.
    pub fn new(dir: &Path, model: &str, dataset: &str) -> RecResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir:  dir.to_path_buf(),
            stem: format!("{model}-{dataset}"),
        })
    }

    /// Path without extension; the recorder appends `.mpk`.
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.stem)
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.stem))
    }

    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M) -> RecResult<()> {
        let path = self.model_path();
        model
            .clone()
            .save_file(path.clone(), &CompactRecorder::new())
            .map_err(|e| {
                RecError::Checkpoint(format!("failed to save '{}': {e:?}", path.display()))
            })?;
        tracing::debug!("Saved checkpoint '{}'", path.display());
        Ok(())
    }

    pub fn save_config(&self, config: &Config) -> RecResult<()> {
        let path = self.config_path();
        fs::write(&path, serde_json::to_string_pretty(config)?)?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{model::BprConfig, InferBackend};
    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::TempDir;

    #[test]
    fn test_saves_weights_under_model_dataset_stem() {
        let temp  = TempDir::new().unwrap();
        let ckpt  = CheckpointManager::new(&temp.path().join("saved"), "BPR", "milk_tea").unwrap();
        let model = BprConfig::new(3, 3, 4)
            .init::<InferBackend>(&Default::default(), &mut StdRng::seed_from_u64(0));

        ckpt.save_model::<InferBackend, _>(&model).unwrap();
        assert!(temp.path().join("saved/BPR-milk_tea.mpk").exists());
        assert_eq!(ckpt.config_path(), temp.path().join("saved/BPR-milk_tea.json"));
    }
}
