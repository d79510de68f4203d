// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// One use case per CLI command. Each coordinates the data, ml
// and infra layers; none does ML math or printing itself.

/// Task/EEG alignment workflow
pub mod align_use_case;

/// Training workflow
pub mod train_use_case;

/// Checkpoint scoring workflow
pub mod predict_use_case;
