// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model, training and scoring code lives here.
//
//   model.rs          — skill embedding, combiner network,
//                       classifier MLP, penalised loss
//
//   accumulator.rs    — per-position combiner state carried
//                       between predictions
//
//   early_stopping.rs — patience schedule on validation AUC
//
//   evaluation.rs     — AUC and accuracy over predictions
//
//   trainer.rs        — epoch loop, validation, checkpointing
//
//   predictor.rs      — loads the best checkpoint and replays
//                       a sequence through it

/// Knowledge-tracing network
pub mod model;

/// Recurrent state table
pub mod accumulator;

/// Patience-based stopping
pub mod early_stopping;

/// Ranking and accuracy metrics
pub mod evaluation;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Checkpoint-backed prediction
pub mod predictor;
