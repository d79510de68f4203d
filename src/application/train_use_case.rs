// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Load aligned data           (Layer 6 - infra)
//   Step 2: Build the skill vocabulary  (Layer 3 - domain)
//   Step 3: Prepare + hold out subjects (Layer 4 - data)
//   Step 4: Sequence records            (Layer 4 - data)
//   Step 5: Build the EEG lookup table  (Layer 4 - data)
//   Step 6: Save configs, vocabulary and EEG scaling (Layer 6 - infra)
//   Step 7: Run the training loop       (Layer 5 - ml)

use std::{fs, path::Path, sync::Arc};

use anyhow::{ensure, Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::{
    lookup::LookupTable,
    preparer::{prepare, PrepareConfig},
    sequencer::Sequence,
    splitter::DEFAULT_HOLDOUT_FRACTION,
};
use crate::domain::{error::DataError, vocab::IdMap};
use crate::infra::{
    checkpoint::CheckpointManager,
    dataset_store::DatasetStore,
    metrics::MetricsLogger,
};
use crate::ml::{
    early_stopping::EarlyStoppingConfig,
    model::KtModelConfig,
    trainer::{run_training, TrainInputs, TrainOutcome},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Sgd,
    Adam,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// Every knob of a run. Saved next to the checkpoint so `predict` can
// rebuild the same preparation, and loadable as a whole with --params.
// Missing fields in a params file fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub data_path: String,
    pub out_dir:   String,
    pub seed:      u64,
    pub device:    DeviceKind,
    pub optimizer: OptimizerKind,

    pub learning_rate:    f64,
    pub l1_reg:           f64,
    pub l2_reg:           f64,
    pub n_epochs:         usize,
    pub batch_size:       usize,
    pub valid_batch_size: usize,
    pub dropout:          f64,

    pub skill_vector_len: usize,
    pub combiner_depth:   usize,
    pub combiner_width:   usize,
    pub main_net_depth:   usize,
    pub main_net_width:   usize,
    pub previous_eeg_on:  bool,
    pub current_eeg_on:   bool,
    pub mutable_skill:    bool,

    pub top_n:            usize,
    pub top_eeg_n:        usize,
    pub eeg_only:         bool,
    pub normalize:        bool,
    pub holdout_fraction: f64,

    pub patience:              usize,
    pub patience_increase:     usize,
    pub improvement_threshold: f64,
    pub validation_frequency:  usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        let stopping = EarlyStoppingConfig::default();
        Self {
            data_path: "aligned.json".to_string(),
            out_dir:   "checkpoints".to_string(),
            seed:      42,
            device:    DeviceKind::Cpu,
            optimizer: OptimizerKind::Sgd,

            learning_rate:    0.01,
            l1_reg:           0.0,
            l2_reg:           0.0001,
            n_epochs:         500,
            batch_size:       30,
            valid_batch_size: 1,
            dropout:          0.2,

            skill_vector_len: 100,
            combiner_depth:   1,
            combiner_width:   200,
            main_net_depth:   1,
            main_net_width:   500,
            previous_eeg_on:  true,
            current_eeg_on:   true,
            mutable_skill:    true,

            top_n:            0,
            top_eeg_n:        0,
            eeg_only:         false,
            normalize:        false,
            holdout_fraction: DEFAULT_HOLDOUT_FRACTION,

            patience:              stopping.patience,
            patience_increase:     stopping.patience_increase,
            improvement_threshold: stopping.improvement_threshold,
            validation_frequency:  stopping.validation_frequency,
        }
    }
}

impl TrainConfig {
    /// Read a whole configuration from a JSON params file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read params file '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not a valid training config", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(self.valid_batch_size > 0, "valid_batch_size must be positive");
        ensure!(self.combiner_depth > 0, "combiner_depth must be at least 1");
        ensure!(self.combiner_width > 0, "combiner_width must be positive");
        ensure!(self.skill_vector_len > 0, "skill_vector_len must be positive");
        ensure!(
            self.main_net_depth == 0 || self.main_net_width > 0,
            "main_net_width must be positive when main_net_depth > 0"
        );
        ensure!(self.learning_rate > 0.0, "learning_rate must be positive");
        ensure!(self.l1_reg >= 0.0 && self.l2_reg >= 0.0, "regularisation weights must be non-negative");
        ensure!((0.0..1.0).contains(&self.dropout), "dropout must be in [0, 1)");
        ensure!(
            (0.0..1.0).contains(&self.holdout_fraction),
            "holdout_fraction must be in [0, 1)"
        );
        ensure!(self.validation_frequency > 0, "validation_frequency must be positive");
        Ok(())
    }

    pub fn wants_eeg(&self) -> bool {
        self.previous_eeg_on || self.current_eeg_on
    }

    pub fn prepare_config(&self) -> PrepareConfig {
        PrepareConfig {
            top_n:     self.top_n,
            top_eeg_n: self.top_eeg_n,
            eeg_only:  self.eeg_only,
            normalize: self.normalize,
        }
    }

    pub fn early_stopping(&self) -> EarlyStoppingConfig {
        EarlyStoppingConfig {
            patience:              self.patience,
            patience_increase:     self.patience_increase,
            improvement_threshold: self.improvement_threshold,
            validation_frequency:  self.validation_frequency,
        }
    }

    pub fn model_config(&self, n_skills: usize, eeg_width: usize) -> KtModelConfig {
        KtModelConfig::new(n_skills, eeg_width)
            .with_skill_vector_len(self.skill_vector_len)
            .with_combiner_depth(self.combiner_depth)
            .with_combiner_width(self.combiner_width)
            .with_main_net_depth(self.main_net_depth)
            .with_main_net_width(self.main_net_width)
            .with_previous_eeg_on(self.previous_eeg_on)
            .with_current_eeg_on(self.current_eeg_on)
            .with_mutable_skill(self.mutable_skill)
            .with_dropout(self.dropout)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainOutcome> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Load aligned data ─────────────────────────────────────────
        let aligned = DatasetStore::new(&cfg.data_path).load()?;

        // ── Step 2: Skill vocabulary over the whole file ──────────────────────
        // Built before subject selection so prediction on the same file
        // never meets an unknown skill.
        let skills = IdMap::from_values(aligned.records.iter().map(|r| r.skill.as_str()));
        tracing::info!("{} distinct skills", skills.known());

        // ── Step 3: Prepare, then hold out whole subjects ─────────────────────
        let mut rng  = StdRng::seed_from_u64(cfg.seed);
        let prepared = prepare(&aligned, &cfg.prepare_config(), skills.clone())?
            .hold_out(cfg.holdout_fraction, &mut rng);

        if cfg.wants_eeg() && !prepared.has_eeg() {
            return Err(DataError::MissingEeg.into());
        }

        // ── Step 4: Sequence ──────────────────────────────────────────────────
        let sequence = Sequence::from_prepared(&prepared);
        ensure!(
            sequence.train_idx.len() >= cfg.batch_size,
            "Only {} training predictions, fewer than one batch of {}",
            sequence.train_idx.len(),
            cfg.batch_size
        );

        // ── Step 5: EEG lookup table over sequence positions ──────────────────
        let eeg = if cfg.wants_eeg() {
            Some(Arc::new(LookupTable::from_optional(&sequence.eeg)?))
        } else {
            None
        };
        let eeg_width = eeg.as_ref().map_or(0, |t| t.width());
        let model_cfg = cfg.model_config(skills.len(), eeg_width);

        // ── Step 6: Save what `predict` needs to rebuild the run ──────────────
        let ckpt = CheckpointManager::new(&cfg.out_dir)?;
        ckpt.save_config(cfg)?;
        ckpt.save_model_config(&model_cfg)?;
        ckpt.save_vocab(&skills)?;
        if let Some(table) = &eeg {
            ckpt.save_lookup_stats(table.stats())?;
        }
        let metrics = MetricsLogger::new(&cfg.out_dir)?;

        // ── Step 7: Train ─────────────────────────────────────────────────────
        let inputs = TrainInputs {
            sequence: Arc::new(sequence),
            eeg,
            model:    model_cfg,
        };
        let outcome = run_training(cfg, &inputs, &ckpt, &metrics)?;
        ckpt.save_summary(&outcome)?;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_combiner_depth_is_rejected() {
        let cfg = TrainConfig { combiner_depth: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let cfg = TrainConfig { batch_size: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_params_file_uses_defaults() {
        let cfg: TrainConfig =
            serde_json::from_str(r#"{"learning_rate": 0.5, "optimizer": "adam"}"#).unwrap();
        assert_eq!(cfg.learning_rate, 0.5);
        assert_eq!(cfg.optimizer, OptimizerKind::Adam);
        assert_eq!(cfg.batch_size, 30);
        assert_eq!(cfg.patience, 50);
    }

    #[test]
    fn test_model_config_carries_dimensions() {
        let cfg = TrainConfig { combiner_width: 7, current_eeg_on: false, ..Default::default() };
        let m = cfg.model_config(12, 4);
        assert_eq!(m.n_skills, 12);
        assert_eq!(m.eeg_width, 4);
        assert_eq!(m.combiner_width, 7);
        assert!(!m.eeg_inputs().current);
        assert!(m.eeg_inputs().previous);
    }
}
