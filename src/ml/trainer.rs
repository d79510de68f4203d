// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Mini-batch training with periodic validation and early
// stopping.
//
// Key points:
//   - Batches are consecutive windows of the training fold in
//     sequence order, never shuffled: each prediction reads the
//     accumulator row its predecessor wrote. The final partial
//     batch is dropped.
//   - Training uses B (Autodiff<_>) for gradients; model.valid()
//     returns the model on B::InnerBackend with dropout off.
//   - Validation runs every `validation_frequency` epochs with
//     `valid_batch_size` (1 by default, so the accumulator is
//     rebuilt one attempt at a time).
//   - The best validation AUC is checkpointed.

use std::{sync::Arc, time::Instant};

use anyhow::{ensure, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::{DeviceKind, OptimizerKind, TrainConfig};
use crate::data::{
    batcher::KtBatcher,
    dataset::KtDataset,
    lookup::LookupTable,
    sequencer::Sequence,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    accumulator::Accumulator,
    early_stopping::EarlyStopping,
    evaluation::auc,
    model::{probabilities, KtModel, KtModelConfig},
};

/// Everything the loop reads besides hyper-parameters.
pub struct TrainInputs {
    pub sequence: Arc<Sequence>,
    pub eeg:      Option<Arc<LookupTable>>,
    pub model:    KtModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOutcome {
    pub best_valid_auc:   Option<f64>,
    /// 1-based; None when no validation score was ever computed
    pub best_epoch:       Option<usize>,
    pub epochs_run:       usize,
    pub training_minutes: f64,
}

/// Predictions over one fold.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub bases:       Vec<usize>,
    pub predictions: Vec<f32>,
    pub labels:      Vec<bool>,
    /// Mean penalised loss per batch
    pub loss:        f64,
    pub auc:         Option<f64>,
}

pub fn run_training(
    cfg:     &TrainConfig,
    inputs:  &TrainInputs,
    ckpt:    &CheckpointManager,
    metrics: &MetricsLogger,
) -> Result<TrainOutcome> {
    match cfg.device {
        DeviceKind::Cpu => {
            let device = NdArrayDevice::default();
            tracing::info!("Using NdArray device: {:?}", device);
            with_optimizer::<Autodiff<NdArray>>(cfg, inputs, ckpt, metrics, device)
        }
        DeviceKind::Gpu => {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            with_optimizer::<Autodiff<Wgpu>>(cfg, inputs, ckpt, metrics, device)
        }
    }
}

fn with_optimizer<B: AutodiffBackend>(
    cfg:     &TrainConfig,
    inputs:  &TrainInputs,
    ckpt:    &CheckpointManager,
    metrics: &MetricsLogger,
    device:  B::Device,
) -> Result<TrainOutcome> {
    B::seed(cfg.seed);
    let model: KtModel<B> = inputs.model.init(&device);

    match cfg.optimizer {
        OptimizerKind::Sgd => {
            tracing::info!("Optimiser: SGD, lr={}", cfg.learning_rate);
            let optim = SgdConfig::new().init::<B, KtModel<B>>();
            train_loop(cfg, inputs, model, optim, ckpt, metrics, device)
        }
        OptimizerKind::Adam => {
            tracing::info!("Optimiser: Adam, lr={}", cfg.learning_rate);
            let optim = AdamConfig::new().with_epsilon(1e-8).init::<B, KtModel<B>>();
            train_loop(cfg, inputs, model, optim, ckpt, metrics, device)
        }
    }
}

pub fn train_loop<B, O>(
    cfg:       &TrainConfig,
    inputs:    &TrainInputs,
    mut model: KtModel<B>,
    mut optim: O,
    ckpt:      &CheckpointManager,
    metrics:   &MetricsLogger,
    device:    B::Device,
) -> Result<TrainOutcome>
where
    B: AutodiffBackend,
    O: Optimizer<KtModel<B>, B>,
{
    let started  = Instant::now();
    let sequence = inputs.sequence.clone();
    let eeg_in   = inputs.model.eeg_inputs();

    let train_batcher =
        KtBatcher::<B>::new(device.clone(), sequence.clone(), inputs.eeg.clone(), eeg_in);
    let valid_batcher =
        KtBatcher::<B::InnerBackend>::new(device.clone(), sequence.clone(), inputs.eeg.clone(), eeg_in);

    let train_set = KtDataset::new(sequence.train_idx.clone());
    let valid_set = KtDataset::new(sequence.valid_idx.clone());

    let n_batches = train_set.len() / cfg.batch_size;
    ensure!(n_batches > 0, "Training fold is smaller than one batch of {}", cfg.batch_size);
    if valid_set.is_empty() {
        tracing::warn!("Validation fold is empty; the final model will be kept");
    }

    let mut accumulator = Accumulator::new(sequence.len(), inputs.model.combiner_width);
    let mut stopper     = EarlyStopping::new(cfg.early_stopping());
    let mut epochs_run  = 0;

    tracing::info!("... training the model");

    for epoch in 0..cfg.n_epochs {
        epochs_run = epoch + 1;

        // ── Training phase ────────────────────────────────────────────────────
        let mut loss_sum    = 0.0f64;
        let mut predictions = Vec::with_capacity(n_batches * cfg.batch_size);
        let mut labels      = Vec::with_capacity(n_batches * cfg.batch_size);

        for b in 0..n_batches {
            let batch = train_batcher.batch(train_set.window(b * cfg.batch_size, cfg.batch_size));
            let acc   = accumulator.read_for::<B>(&batch.bases, &device);

            let (loss, output) = model.forward_loss(&batch, acc, cfg.l1_reg, cfg.l2_reg);
            loss_sum += loss.clone().into_scalar().elem::<f64>();

            accumulator.write_for(&batch.bases, output.state.detach());
            predictions.extend(probabilities(output.logits.detach()));
            labels.extend(batch.bases.iter().map(|&p| sequence.correct[p]));

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.learning_rate, model, grads);
        }

        let train_loss = loss_sum / n_batches as f64;
        let train_auc  = auc(&labels, &predictions);
        tracing::info!(
            "epoch {}, train_loss={:.4}, training auc: {}",
            epoch + 1,
            train_loss,
            fmt_auc(train_auc),
        );

        // ── Validation phase ──────────────────────────────────────────────────
        let mut row = EpochMetrics {
            epoch: epoch + 1,
            train_loss,
            train_auc,
            valid_auc:  None,
            valid_loss: None,
        };
        let validating = stopper.should_validate(epoch) && !valid_set.is_empty();

        if validating {
            let eval = evaluate(
                &model.valid(),
                &valid_batcher,
                &valid_set,
                &sequence,
                &mut accumulator,
                cfg.valid_batch_size,
                &device,
                (cfg.l1_reg, cfg.l2_reg),
            );
            row.valid_auc  = eval.auc;
            row.valid_loss = Some(eval.loss);
            tracing::info!("epoch {}, validation auc: {}", epoch + 1, fmt_auc(eval.auc));

            if let Some(score) = eval.auc {
                if stopper.observe(epoch, score) {
                    ckpt.save_model(&model, epoch + 1)?;
                    tracing::info!("  best validation auc so far, checkpoint saved");
                }
            }
        }

        metrics.log(&row)?;

        if validating && stopper.should_stop(epoch) {
            tracing::info!("Early stopping at epoch {} (patience {})", epoch + 1, stopper.patience());
            break;
        }
    }

    if stopper.best_epoch().is_none() {
        ckpt.save_model(&model, epochs_run)?;
        tracing::warn!("No validation score was computed; saved the model from epoch {}", epochs_run);
    }

    let outcome = TrainOutcome {
        best_valid_auc:   stopper.best_score(),
        best_epoch:       stopper.best_epoch().map(|e| e + 1),
        epochs_run,
        training_minutes: started.elapsed().as_secs_f64() / 60.0,
    };
    tracing::info!(
        "Optimization complete with best validation auc of {} at epoch {}",
        fmt_auc(outcome.best_valid_auc),
        outcome.best_epoch.map_or_else(|| "-".to_string(), |e| e.to_string()),
    );
    tracing::info!("The code ran for {:.2}m", outcome.training_minutes);
    Ok(outcome)
}

/// Predict every base in `dataset`, in order, updating the accumulator
/// as it goes. A final partial batch is included.
#[allow(clippy::too_many_arguments)]
pub fn evaluate<B: Backend>(
    model:       &KtModel<B>,
    batcher:     &KtBatcher<B>,
    dataset:     &KtDataset,
    sequence:    &Sequence,
    accumulator: &mut Accumulator,
    batch_size:  usize,
    device:      &B::Device,
    (l1_reg, l2_reg): (f64, f64),
) -> Evaluation {
    let mut bases       = Vec::with_capacity(dataset.len());
    let mut predictions = Vec::with_capacity(dataset.len());
    let mut loss_sum    = 0.0f64;
    let mut n_batches   = 0usize;

    let mut start = 0;
    while start < dataset.len() {
        let batch = batcher.batch(dataset.window(start, batch_size));
        let acc   = accumulator.read_for::<B>(&batch.bases, device);

        let (loss, output) = model.forward_loss(&batch, acc, l1_reg, l2_reg);
        loss_sum  += loss.into_scalar().elem::<f64>();
        n_batches += 1;

        accumulator.write_for(&batch.bases, output.state);
        predictions.extend(probabilities(output.logits));
        bases.extend_from_slice(&batch.bases);
        start += batch_size;
    }

    let labels: Vec<bool> = bases.iter().map(|&p| sequence.correct[p]).collect();
    let auc = auc(&labels, &predictions);
    let loss = if n_batches > 0 { loss_sum / n_batches as f64 } else { f64::NAN };

    Evaluation { bases, predictions, labels, loss, auc }
}

fn fmt_auc(v: Option<f64>) -> String {
    v.map_or_else(|| "undefined".to_string(), |a| format!("{a:.4}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = Autodiff<NdArray>;

    /// Two subjects of 12 alternating attempts; subject 2 is validation.
    fn sequence() -> Arc<Sequence> {
        let n = 24;
        let subject_ids: Vec<usize> = (0..n).map(|i| if i < 12 { 1 } else { 2 }).collect();
        let bases: Vec<usize> = (0..n).filter(|&i| i % 12 >= 2).collect();
        Arc::new(Sequence {
            order:       (0..n).collect(),
            skill_ids:   (0..n).map(|i| 1 + i % 2).collect(),
            correct:     (0..n).map(|i| i % 2 == 0).collect(),
            eeg:         (0..n).map(|i| (i % 3 != 0).then(|| vec![i as f32, 1.0])).collect(),
            train_idx:   bases.iter().copied().filter(|&b| b < 12).collect(),
            valid_idx:   bases.iter().copied().filter(|&b| b >= 12).collect(),
            subject_ids,
            bases,
        })
    }

    fn setup(tag: &str) -> (TrainConfig, TrainInputs, CheckpointManager, MetricsLogger, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("eeg-kt-train-{tag}-{}", std::process::id()));
        let cfg = TrainConfig {
            n_epochs:             6,
            batch_size:           4,
            validation_frequency: 2,
            skill_vector_len:     3,
            combiner_width:       4,
            main_net_width:       5,
            ..Default::default()
        };
        let seq = sequence();
        let eeg = Arc::new(LookupTable::from_optional(&seq.eeg).unwrap());
        let inputs = TrainInputs {
            model:    cfg.model_config(3, eeg.width()),
            sequence: seq,
            eeg:      Some(eeg),
        };
        let ckpt    = CheckpointManager::new(&dir).unwrap();
        let metrics = MetricsLogger::new(&dir).unwrap();
        (cfg, inputs, ckpt, metrics, dir)
    }

    #[test]
    fn test_short_run_validates_and_checkpoints() {
        let (cfg, inputs, ckpt, metrics, dir) = setup("run");
        let device = NdArrayDevice::default();
        let model: KtModel<TestBackend> = inputs.model.init(&device);
        let optim = SgdConfig::new().init::<TestBackend, KtModel<TestBackend>>();

        let outcome = train_loop(&cfg, &inputs, model, optim, &ckpt, &metrics, device).unwrap();

        assert_eq!(outcome.epochs_run, 6);
        assert!(outcome.best_valid_auc.is_some());
        let best = outcome.best_epoch.unwrap();
        assert!(best % 2 == 0 && best <= 6);
        assert_eq!(ckpt.best_epoch().unwrap(), best);

        // header + one row per epoch
        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 7);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_early_stopping_ends_run_before_epoch_limit() {
        let (cfg, inputs, ckpt, metrics, dir) = setup("stop");
        // patience never grows past the epoch, so the run ends at 0-based epoch 2
        let cfg = TrainConfig {
            n_epochs:             20,
            patience:             2,
            patience_increase:    0,
            validation_frequency: 1,
            ..cfg
        };
        let device = NdArrayDevice::default();
        let model: KtModel<TestBackend> = inputs.model.init(&device);
        let optim = SgdConfig::new().init::<TestBackend, KtModel<TestBackend>>();

        let outcome = train_loop(&cfg, &inputs, model, optim, &ckpt, &metrics, device).unwrap();

        assert!(outcome.epochs_run < 20);
        assert_eq!(outcome.epochs_run, 3);
        let best = outcome.best_epoch.unwrap();
        assert!(best <= 3);
        assert_eq!(ckpt.best_epoch().unwrap(), best);

        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 4);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_evaluate_covers_partial_batch() {
        let (_, inputs, _, _, dir) = setup("eval");
        let device  = NdArrayDevice::default();
        let model: KtModel<NdArray> = inputs.model.init(&device);
        let batcher = KtBatcher::<NdArray>::new(
            device,
            inputs.sequence.clone(),
            inputs.eeg.clone(),
            inputs.model.eeg_inputs(),
        );
        let dataset = KtDataset::new(inputs.sequence.valid_idx.clone());
        let mut acc = Accumulator::new(inputs.sequence.len(), inputs.model.combiner_width);

        // 10 bases in batches of 4 → 4 + 4 + 2
        let eval = evaluate(&model, &batcher, &dataset, &inputs.sequence, &mut acc, 4, &device, (0.0, 0.0));
        assert_eq!(eval.predictions.len(), 10);
        assert_eq!(eval.bases, inputs.sequence.valid_idx);
        assert!(eval.predictions.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(eval.loss.is_finite());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_run_without_validation_fold_saves_final_model() {
        let (cfg, mut inputs, ckpt, metrics, dir) = setup("novalid");
        let mut seq = (*inputs.sequence).clone();
        seq.valid_idx.clear();
        inputs.sequence = Arc::new(seq);

        let cfg    = TrainConfig { n_epochs: 2, ..cfg };
        let device = NdArrayDevice::default();
        let model: KtModel<TestBackend> = inputs.model.init(&device);
        let optim = AdamConfig::new().init::<TestBackend, KtModel<TestBackend>>();

        let outcome = train_loop(&cfg, &inputs, model, optim, &ckpt, &metrics, device).unwrap();
        assert_eq!(outcome.best_epoch, None);
        assert_eq!(ckpt.best_epoch().unwrap(), 2);
        std::fs::remove_dir_all(dir).ok();
    }
}
