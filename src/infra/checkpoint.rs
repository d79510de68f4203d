// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores everything `predict` needs to rebuild a
// trained model.
//
//   {out_dir}/
//     model_best.mpk.gz    ← weights of the best validation epoch
//     best_epoch.json      ← 1-based epoch those weights come from
//     train_config.json    ← TrainConfig of the run
//     model_config.json    ← KtModelConfig (dimensions, EEG width)
//     skills.json          ← skill IdMap used for encoding
//     eeg_lookup.json      ← EEG column bounds + default row (EEG runs only)
//     summary.json         ← TrainOutcome, written when training ends
//
// Weights go through Burn's CompactRecorder (MessagePack + gzip);
// loading fails if the architecture doesn't match. The recorder
// stores weights at half precision, so reloaded weights match the
// trained ones to about 1e-3, not bit for bit.

use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::application::train_use_case::TrainConfig;
use crate::data::lookup::LookupStats;
use crate::domain::vocab::IdMap;
use crate::ml::{
    model::{KtModel, KtModelConfig},
    trainer::TrainOutcome,
};

const MODEL_FILE:        &str = "model_best";
const BEST_EPOCH_FILE:   &str = "best_epoch.json";
const TRAIN_CONFIG_FILE: &str = "train_config.json";
const MODEL_CONFIG_FILE: &str = "model_config.json";
const VOCAB_FILE:        &str = "skills.json";
const LOOKUP_FILE:       &str = "eeg_lookup.json";
const SUMMARY_FILE:      &str = "summary.json";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Opens an existing checkpoint directory without creating it.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        anyhow::ensure!(
            dir.is_dir(),
            "Checkpoint directory '{}' does not exist. Have you run 'train' first?",
            dir.display()
        );
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Overwrite the best-model weights. `epoch` is 1-based.
    pub fn save_model<B: Backend>(&self, model: &KtModel<B>, epoch: usize) -> Result<()> {
        let path = self.dir.join(MODEL_FILE);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;
        self.write_json(BEST_EPOCH_FILE, &epoch)?;
        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// `model` must have the saved architecture; its weights are replaced.
    pub fn load_model<B: Backend>(
        &self,
        model:  KtModel<B>,
        device: &B::Device,
    ) -> Result<KtModel<B>> {
        let epoch = self.best_epoch()?;
        let path  = self.dir.join(MODEL_FILE);
        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })?;
        Ok(model.load_record(record))
    }

    pub fn best_epoch(&self) -> Result<usize> {
        self.read_json(BEST_EPOCH_FILE)
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        self.write_json(TRAIN_CONFIG_FILE, cfg)
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        self.read_json(TRAIN_CONFIG_FILE)
    }

    pub fn save_model_config(&self, cfg: &KtModelConfig) -> Result<()> {
        self.write_json(MODEL_CONFIG_FILE, cfg)
    }

    pub fn load_model_config(&self) -> Result<KtModelConfig> {
        self.read_json(MODEL_CONFIG_FILE)
    }

    pub fn save_vocab(&self, skills: &IdMap) -> Result<()> {
        self.write_json(VOCAB_FILE, skills)
    }

    pub fn load_vocab(&self) -> Result<IdMap> {
        Ok(self.read_json::<IdMap>(VOCAB_FILE)?.reindexed())
    }

    pub fn save_lookup_stats(&self, stats: &LookupStats) -> Result<()> {
        self.write_json(LOOKUP_FILE, stats)
    }

    pub fn load_lookup_stats(&self) -> Result<LookupStats> {
        self.read_json(LOOKUP_FILE)
    }

    pub fn save_summary(&self, outcome: &TrainOutcome) -> Result<()> {
        self.write_json(SUMMARY_FILE, outcome)
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json).with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Wrote '{}'", path.display());
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read '{}'. Make sure you have run 'train' first.", path.display())
        })?;
        serde_json::from_str(&json).with_context(|| format!("'{}' is corrupt", path.display()))
    }
}
