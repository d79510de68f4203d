// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the raw CSV exports to tensor batches.
//
//   tasks.csv          eeg.csv
//       │                 │
//       ▼                 ▼
//   CsvTaskLoader     CsvEegLoader  → band powers (spectral)
//       │                 │
//       └──────┬──────────┘
//              ▼
//   align             → mean EEG vector per task attempt
//              │
//              ▼  (aligned.json, see infra::dataset_store)
//   prepare           → subject selection, normalisation,
//                       id encoding, subject hold-out
//              │
//              ▼
//   Sequence          → subject/time order, base positions
//              │
//              ▼
//   LookupTable       → EEG rows with a default row 0
//              │
//              ▼
//   KtDataset         → implements Burn's Dataset trait
//              │
//              ▼
//   KtBatcher         → tensors for one forward pass

/// CSV loaders for tasks and EEG epochs
pub mod loader;

/// FFT band powers
pub mod spectral;

/// Task / EEG time alignment
pub mod aligner;

/// Column-wise min-max scaling
pub mod normalize;

/// EEG lookup table with a default row
pub mod lookup;

/// Subject hold-out
pub mod splitter;

/// Selection, normalisation and id encoding
pub mod preparer;

/// Subject/time ordering and base positions
pub mod sequencer;

/// Burn Dataset over base positions
pub mod dataset;

/// Burn Batcher producing KtBatch tensors
pub mod batcher;
