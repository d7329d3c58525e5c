// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer only talks to data sources through
// these traits, so a new storage format is a new impl and
// nothing else changes.

use crate::domain::interaction::RawInteraction;
use crate::error::RecResult;

// ─── InteractionSource ────────────────────────────────────────────────────────
/// Any component that can produce the raw interaction rows of a dataset.
///
/// Implementations:
///   - AtomicFileLoader → reads `<data_path>/<dataset>/<dataset>.inter`
pub trait InteractionSource {
    /// Load every interaction row, in file order.
    fn load_all(&self) -> RecResult<Vec<RawInteraction>>;
}
