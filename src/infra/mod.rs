// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several layers:
//
//   config.rs      — layered YAML configuration
//                    (defaults → files → command line)
//
//   seed.rs        — named, independently seeded RNG streams
//
//   logger.rs      — tracing subscriber (stderr + run log file)
//                    and coloured tags
//
//   checkpoint.rs  — best-model weights via burn's
//                    CompactRecorder, plus a JSON config copy
//
//   metrics.rs     — per-epoch loss / validation CSV
//
//   rank_writer.rs — the tab-separated rank file

/// Layered run configuration
pub mod config;

/// Seeded random streams
pub mod seed;

/// Logging setup and colour helpers
pub mod logger;

/// Model checkpoint saving
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Rank file output
pub mod rank_writer;
