// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that name the core
// concepts of a recommendation run:
//
//   interaction.rs — user/item ids, raw + remapped interactions,
//                    dataset schema and the id → token vocab
//   model_type.rs  — model families used for trainer lookup
//   rank.rs        — one row of the output rank file
//   traits.rs      — InteractionSource
//
// No burn types, no file I/O.

pub mod interaction;
pub mod model_type;
pub mod rank;
pub mod traits;
