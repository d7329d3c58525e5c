// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Coordinates the other layers for one experiment run.
//
// Rules for this layer:
//   - No model math (Layer 5)
//   - No argument parsing or printing (Layer 1)
//   - No direct file formats (Layers 4 and 6)
//   - Only step ordering and hand-off of results

/// Config → data → model → trainer → rank file
pub mod run_use_case;
