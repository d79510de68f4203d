// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types describing the experiment's data:
// task attempts, EEG epochs, aligned records and the id maps
// used to turn categorical strings into embedding rows.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only structs, enums, traits and their invariants

/// Task attempts, EEG epochs and aligned records
pub mod records;

/// Dense id assignment with a reserved "unknown" id
pub mod vocab;

/// Domain error type
pub mod error;

/// Abstractions the data layer implements
pub mod traits;
