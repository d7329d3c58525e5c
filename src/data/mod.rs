// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the atomic interaction file to tensor
// batches on the device:
//
//   <dataset>.inter
//       │
//       ▼
//   AtomicFileLoader     → typed rows with original tokens
//       │
//       ▼
//   Preprocessor         → rating / duplicate / count filters
//       │
//       ▼
//   RecDataset           → dense ids, [PAD] = 0
//       │
//       ▼
//   data_preparation     → train / valid / test + fairness groups
//       │
//       ▼
//   TrainLoader          → pairwise rows, negatives per epoch
//   EvalLoader           → labeled rows, negatives fixed once
//       │
//       ▼
//   InteractionBatcher   → burn tensors

/// Reads `.inter` atomic files with the csv crate
pub mod loader;

/// Rating, duplicate and interaction-count filters
pub mod preprocessor;

/// Id remapping and dataset statistics
pub mod dataset;

/// Uniform negative item sampling
pub mod sampler;

/// Ratio split and fairness user groups
pub mod splitter;

/// Train and evaluation loaders
pub mod dataloader;

/// Rows → burn tensors
pub mod batcher;
