// ============================================================
// Layer 5 — Predictor
// ============================================================
// Loads the best checkpoint and replays a whole sequence through
// it, base by base, rebuilding the accumulator from zero the
// same way validation does.

use std::sync::Arc;

use anyhow::{ensure, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::*,
};

use crate::application::train_use_case::DeviceKind;
use crate::data::{batcher::KtBatcher, dataset::KtDataset, lookup::LookupTable, sequencer::Sequence};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    accumulator::Accumulator,
    model::{KtModel, KtModelConfig},
    trainer::{evaluate, Evaluation},
};

pub struct Predictor<B: Backend> {
    model:  KtModel<B>,
    config: KtModelConfig,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    pub fn from_checkpoint(ckpt: &CheckpointManager, device: B::Device) -> Result<Self> {
        let config = ckpt.load_model_config()?;
        let model  = ckpt.load_model(config.init::<B>(&device), &device)?;
        tracing::info!("Model loaded from checkpoint");
        Ok(Self { model, config, device })
    }

    pub fn config(&self) -> &KtModelConfig {
        &self.config
    }

    /// Score every base position of `sequence`. `eeg` must have the width
    /// the model was trained with whenever the model reads EEG.
    pub fn predict(
        &self,
        sequence:   Arc<Sequence>,
        eeg:        Option<Arc<LookupTable>>,
        batch_size: usize,
    ) -> Result<Evaluation> {
        ensure!(batch_size > 0, "batch size must be positive");
        let inputs = self.config.eeg_inputs();
        if inputs.previous || inputs.current {
            let width = eeg.as_ref().map(|t| t.width());
            ensure!(
                width == Some(self.config.eeg_width),
                "Model expects EEG vectors of width {}, data provides {:?}",
                self.config.eeg_width,
                width
            );
        }

        let batcher = KtBatcher::<B>::new(self.device.clone(), sequence.clone(), eeg, inputs);
        let dataset = KtDataset::new(sequence.bases.clone());
        let mut accumulator = Accumulator::new(sequence.len(), self.config.combiner_width);

        Ok(evaluate(
            &self.model,
            &batcher,
            &dataset,
            &sequence,
            &mut accumulator,
            batch_size,
            &self.device,
            (0.0, 0.0),
        ))
    }
}

/// Backend dispatch for a one-off prediction run.
pub fn run_prediction(
    device:     DeviceKind,
    ckpt:       &CheckpointManager,
    sequence:   Arc<Sequence>,
    eeg:        Option<Arc<LookupTable>>,
    batch_size: usize,
) -> Result<Evaluation> {
    match device {
        DeviceKind::Cpu => Predictor::<NdArray>::from_checkpoint(ckpt, NdArrayDevice::default())?
            .predict(sequence, eeg, batch_size),
        DeviceKind::Gpu => Predictor::<Wgpu>::from_checkpoint(ckpt, WgpuDevice::default())?
            .predict(sequence, eeg, batch_size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = NdArray;

    fn sequence() -> Arc<Sequence> {
        Arc::new(Sequence {
            order:       (0..6).collect(),
            subject_ids: vec![1; 6],
            skill_ids:   vec![1, 2, 1, 2, 1, 2],
            correct:     vec![true, false, true, false, false, true],
            eeg:         vec![Some(vec![1.0, 0.0]), None, Some(vec![0.0, 1.0]), None, None, None],
            bases:       vec![2, 3, 4, 5],
            train_idx:   vec![2, 3, 4, 5],
            valid_idx:   vec![],
        })
    }

    fn checkpoint(tag: &str, cfg: &KtModelConfig) -> (CheckpointManager, std::path::PathBuf) {
        let dir  = std::env::temp_dir().join(format!("eeg-kt-predict-{tag}-{}", std::process::id()));
        let ckpt = CheckpointManager::new(&dir).unwrap();
        let model: KtModel<TestBackend> = cfg.init(&Default::default());
        ckpt.save_model_config(cfg).unwrap();
        ckpt.save_model(&model, 1).unwrap();
        (ckpt, dir)
    }

    fn config() -> KtModelConfig {
        KtModelConfig::new(3, 2)
            .with_skill_vector_len(2)
            .with_combiner_width(3)
            .with_main_net_width(4)
    }

    #[test]
    fn test_predicts_every_base_in_order() {
        let (ckpt, dir) = checkpoint("all", &config());
        let seq   = sequence();
        let table = Arc::new(LookupTable::from_optional(&seq.eeg).unwrap());

        let p = Predictor::<TestBackend>::from_checkpoint(&ckpt, Default::default()).unwrap();
        let eval = p.predict(seq, Some(table), 1).unwrap();
        assert_eq!(eval.bases, vec![2, 3, 4, 5]);
        assert_eq!(eval.labels, vec![true, false, false, true]);
        assert_eq!(eval.predictions.len(), 4);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_eeg_is_rejected() {
        let (ckpt, dir) = checkpoint("noeeg", &config());
        let p = Predictor::<TestBackend>::from_checkpoint(&ckpt, Default::default()).unwrap();
        assert!(p.predict(sequence(), None, 1).is_err());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_replay_is_deterministic() {
        let (ckpt, dir) = checkpoint("det", &config().with_current_eeg_on(false).with_previous_eeg_on(false));
        let p = Predictor::<TestBackend>::from_checkpoint(&ckpt, Default::default()).unwrap();
        let a = p.predict(sequence(), None, 1).unwrap();
        let b = p.predict(sequence(), None, 1).unwrap();
        assert_eq!(a.predictions, b.predictions);
        std::fs::remove_dir_all(dir).ok();
    }
}
