// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Scores every attempt of an aligned dataset with a trained
// checkpoint:
//
//   Step 1: Load the run's config and skill vocabulary
//   Step 2: Prepare the data the way training did (no hold-out),
//           scaling EEG with the training run's saved statistics
//   Step 3: Replay the sequence through the best model
//   Step 4: Write per-attempt probabilities as CSV
//
// The first two attempts of each subject have no history and
// are not scored.

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;

use crate::application::train_use_case::DeviceKind;
use crate::data::{lookup::LookupTable, preparer::prepare, sequencer::Sequence};
use crate::infra::{
    checkpoint::CheckpointManager,
    dataset_store::DatasetStore,
    predictions::{write_predictions, PredictionRow},
};
use crate::ml::{
    evaluation::accuracy,
    predictor::run_prediction,
};

pub struct PredictJob {
    pub data_path:      PathBuf,
    pub checkpoint_dir: PathBuf,
    pub out_path:       PathBuf,
    /// Falls back to the device the model was trained on
    pub device:         Option<DeviceKind>,
    pub batch_size:     usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictOutcome {
    pub predictions: usize,
    pub auc:         Option<f64>,
    pub accuracy:    Option<f64>,
}

pub struct PredictUseCase {
    job: PredictJob,
}

impl PredictUseCase {
    pub fn new(job: PredictJob) -> Self {
        Self { job }
    }

    pub fn execute(&self) -> Result<PredictOutcome> {
        let job  = &self.job;
        let ckpt = CheckpointManager::open(&job.checkpoint_dir)?;

        // ── Step 1 ────────────────────────────────────────────────────────────
        let train_cfg = ckpt.load_config()?;
        let skills    = ckpt.load_vocab()?;

        // ── Step 2 ────────────────────────────────────────────────────────────
        let aligned  = DatasetStore::new(&job.data_path).load()?;
        let prepared = prepare(&aligned, &train_cfg.prepare_config(), skills)?;
        let sequence = Arc::new(Sequence::from_prepared(&prepared));

        // Records without EEG, or a file with none at all, get the
        // training default row.
        let eeg = if train_cfg.wants_eeg() {
            let stats = ckpt.load_lookup_stats()?;
            Some(Arc::new(LookupTable::with_stats(&sequence.eeg, &stats)?))
        } else {
            None
        };

        // ── Step 3 ────────────────────────────────────────────────────────────
        let device = job.device.unwrap_or(train_cfg.device);
        let eval   = run_prediction(device, &ckpt, sequence.clone(), eeg, job.batch_size)?;

        // ── Step 4 ────────────────────────────────────────────────────────────
        let rows: Vec<PredictionRow> = eval
            .bases
            .iter()
            .zip(&eval.predictions)
            .map(|(&pos, &probability)| {
                let record = sequence.order[pos];
                PredictionRow {
                    subject: prepared.subjects.label(prepared.subject_ids[record]).to_string(),
                    skill:   prepared.skills.label(prepared.skill_ids[record]).to_string(),
                    start:   prepared.start[record],
                    correct: prepared.correct[record],
                    probability,
                }
            })
            .collect();
        write_predictions(&job.out_path, &rows)?;

        let outcome = PredictOutcome {
            predictions: rows.len(),
            auc:         eval.auc,
            accuracy:    accuracy(&eval.labels, &eval.predictions),
        };
        tracing::info!(
            "Scored {} attempts: auc={:?} accuracy={:?}",
            outcome.predictions,
            outcome.auc,
            outcome.accuracy
        );
        Ok(outcome)
    }
}
