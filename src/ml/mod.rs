// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All burn model code lives here:
//
//   model.rs      — BPR (embedding tables, pairwise loss) and
//                   the non-trainable popularity baseline
//
//   registry.rs   — name → model constructor and
//                   (model type, name) → trainer constructor
//
//   trainer.rs    — epoch loop, early stopping, checkpoints,
//                   and the fairness-weighted variant
//
//   evaluator.rs  — per-user ranking and top-k metrics
//
// Training runs on Autodiff<NdArray>; evaluation uses
// `model.valid()`, which strips the autodiff wrapper.

use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};

use crate::error::{RecError, RecResult};
use crate::infra::config::Config;

/// Backend for scoring and evaluation.
pub type InferBackend = NdArray<f32>;

/// Backend for training.
pub type TrainBackend = Autodiff<InferBackend>;

pub type RecDevice = NdArrayDevice;

/// Resolve the `device` option. Only the CPU backend is compiled in.
pub fn device_from_config(config: &Config) -> RecResult<RecDevice> {
    match config.device.to_lowercase().as_str() {
        "cpu" | "auto" => Ok(NdArrayDevice::Cpu),
        other => Err(RecError::config(format!(
            "device `{other}` is not available (this build supports `cpu`)"
        ))),
    }
}

/// BPR and popularity models
pub mod model;

/// Model and trainer lookup tables
pub mod registry;

/// Training loops with validation and checkpointing
pub mod trainer;

/// Top-k ranking metrics
pub mod evaluator;
