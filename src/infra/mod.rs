// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the other
// layers:
//
//   dataset_store.rs — aligned data as JSON, written by `align`
//                      and read by `train` / `predict`
//
//   checkpoint.rs    — best model weights (burn CompactRecorder)
//                      plus the configs and skill vocabulary
//                      needed to rebuild the model later
//
//   metrics.rs       — per-epoch training metrics as CSV
//
//   predictions.rs   — per-record probabilities as CSV

/// Aligned dataset persistence
pub mod dataset_store;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Prediction CSV writer
pub mod predictions;
