// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands and their flags:
//
//   align    tasks.csv + eeg.csv → aligned.json
//   train    aligned.json        → checkpoint directory
//   predict  aligned.json + checkpoint → predictions.csv
//
// Each Args struct converts into its application-layer config,
// so the application layer never sees clap types.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};

use crate::application::{
    align_use_case::AlignJob,
    predict_use_case::PredictJob,
    train_use_case::{DeviceKind, OptimizerKind, TrainConfig},
};
use crate::data::{
    aligner::{AlignConfig, AlignMode, DEFAULT_SIGQUAL_CUTOFF},
    loader::DEFAULT_TIME_FORMAT,
    spectral::{SpectralConfig, DEFAULT_CUTOFFS, DEFAULT_SAMPLING_RATE},
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Attach EEG band powers to task attempts
    Align(AlignArgs),

    /// Train the knowledge-tracing model on aligned data
    Train(TrainArgs),

    /// Score aligned data with a trained checkpoint
    Predict(PredictArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceArg {
    Cpu,
    Gpu,
}

impl From<DeviceArg> for DeviceKind {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Cpu => DeviceKind::Cpu,
            DeviceArg::Gpu => DeviceKind::Gpu,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerArg {
    Sgd,
    Adam,
}

impl From<OptimizerArg> for OptimizerKind {
    fn from(o: OptimizerArg) -> Self {
        match o {
            OptimizerArg::Sgd  => OptimizerKind::Sgd,
            OptimizerArg::Adam => OptimizerKind::Adam,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignModeArg {
    /// Epoch midpoint inside the task window
    Midpoint,
    /// Any overlap between epoch and task windows
    Overlap,
}

impl From<AlignModeArg> for AlignMode {
    fn from(m: AlignModeArg) -> Self {
        match m {
            AlignModeArg::Midpoint => AlignMode::Midpoint,
            AlignModeArg::Overlap  => AlignMode::Overlap,
        }
    }
}

// ─── align ────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct AlignArgs {
    /// CSV of task attempts: subject,skill,correct,start_time,end_time
    #[arg(long)]
    pub tasks: PathBuf,

    /// CSV of EEG epochs: subject,start_time,end_time,sigqual,rawwave
    #[arg(long)]
    pub eeg: PathBuf,

    /// Where to write the aligned dataset
    #[arg(long, default_value = "aligned.json")]
    pub out: PathBuf,

    /// Epochs with signal quality at or above this are dropped
    #[arg(long, default_value_t = DEFAULT_SIGQUAL_CUTOFF)]
    pub sigqual_cutoff: u32,

    #[arg(long, value_enum, default_value_t = AlignModeArg::Midpoint)]
    pub mode: AlignModeArg,

    /// chrono format for non-numeric timestamps
    #[arg(long, default_value = DEFAULT_TIME_FORMAT)]
    pub time_format: String,

    /// Raw wave sampling rate in Hz
    #[arg(long, default_value_t = DEFAULT_SAMPLING_RATE)]
    pub sampling_rate: f64,

    /// Band edges in Hz, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_CUTOFFS.to_vec())]
    pub band_cutoffs: Vec<f64>,
}

impl From<AlignArgs> for AlignJob {
    fn from(a: AlignArgs) -> Self {
        AlignJob {
            tasks_path:  a.tasks,
            eeg_path:    a.eeg,
            out_path:    a.out,
            time_format: a.time_format,
            align:       AlignConfig { sigqual_cutoff: a.sigqual_cutoff, mode: a.mode.into() },
            spectral:    SpectralConfig { sampling_rate: a.sampling_rate, cutoffs: a.band_cutoffs },
        }
    }
}

// ─── train ────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Aligned dataset written by `align`
    #[arg(long, default_value = "aligned.json")]
    pub data: String,

    /// Directory for checkpoints, configs and metrics
    #[arg(long, default_value = "checkpoints")]
    pub out_dir: String,

    /// JSON file holding a whole training config. Its values replace
    /// every flag below; --data and --out-dir still apply.
    #[arg(long)]
    pub params: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = DeviceArg::Cpu)]
    pub device: DeviceArg,

    /// Seeds the subject hold-out and weight initialisation
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, value_enum, default_value_t = OptimizerArg::Sgd)]
    pub optimizer: OptimizerArg,

    #[arg(long, default_value_t = 0.01)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 0.0)]
    pub l1_reg: f64,

    #[arg(long, default_value_t = 0.0001)]
    pub l2_reg: f64,

    /// Upper bound; early stopping usually ends the run sooner
    #[arg(long, default_value_t = 500)]
    pub n_epochs: usize,

    #[arg(long, default_value_t = 30)]
    pub batch_size: usize,

    /// 1 replays validation subjects one attempt at a time
    #[arg(long, default_value_t = 1)]
    pub valid_batch_size: usize,

    #[arg(long, default_value_t = 0.2)]
    pub dropout: f64,

    #[arg(long, default_value_t = 100)]
    pub skill_vector_len: usize,

    #[arg(long, default_value_t = 1)]
    pub combiner_depth: usize,

    #[arg(long, default_value_t = 200)]
    pub combiner_width: usize,

    #[arg(long, default_value_t = 1)]
    pub main_net_depth: usize,

    #[arg(long, default_value_t = 500)]
    pub main_net_width: usize,

    /// Don't feed the previous attempt's EEG to the combiner
    #[arg(long)]
    pub no_previous_eeg: bool,

    /// Don't feed the current attempt's EEG to the classifier
    #[arg(long)]
    pub no_current_eeg: bool,

    /// Keep skill vectors at their initial values
    #[arg(long)]
    pub frozen_skills: bool,

    /// Keep only the N subjects with the most attempts (0 = all)
    #[arg(long, default_value_t = 0)]
    pub top_n: usize,

    /// Keep only the N subjects with the most EEG-bearing attempts (0 = all)
    #[arg(long, default_value_t = 0)]
    pub top_eeg_n: usize,

    /// Drop attempts without EEG
    #[arg(long)]
    pub eeg_only: bool,

    /// Min-max normalise EEG per subject
    #[arg(long)]
    pub normalize: bool,

    /// Fraction of subjects held out for validation
    #[arg(long, default_value_t = 0.1)]
    pub holdout_fraction: f64,

    #[arg(long, default_value_t = 50)]
    pub patience: usize,

    #[arg(long, default_value_t = 40)]
    pub patience_increase: usize,

    #[arg(long, default_value_t = 1.0)]
    pub improvement_threshold: f64,

    /// Validate every N epochs
    #[arg(long, default_value_t = 5)]
    pub validation_frequency: usize,
}

impl TrainArgs {
    /// The config to train with: the --params file when given,
    /// otherwise the flags.
    pub fn into_config(self) -> Result<TrainConfig> {
        match &self.params {
            Some(path) => {
                let mut cfg = TrainConfig::from_json_file(path)?;
                tracing::info!("Loaded training parameters from '{}'", path.display());
                cfg.data_path = self.data;
                cfg.out_dir   = self.out_dir;
                Ok(cfg)
            }
            None => Ok(self.into()),
        }
    }
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_path:             a.data,
            out_dir:               a.out_dir,
            seed:                  a.seed,
            device:                a.device.into(),
            optimizer:             a.optimizer.into(),
            learning_rate:         a.learning_rate,
            l1_reg:                a.l1_reg,
            l2_reg:                a.l2_reg,
            n_epochs:              a.n_epochs,
            batch_size:            a.batch_size,
            valid_batch_size:      a.valid_batch_size,
            dropout:               a.dropout,
            skill_vector_len:      a.skill_vector_len,
            combiner_depth:        a.combiner_depth,
            combiner_width:        a.combiner_width,
            main_net_depth:        a.main_net_depth,
            main_net_width:        a.main_net_width,
            previous_eeg_on:       !a.no_previous_eeg,
            current_eeg_on:        !a.no_current_eeg,
            mutable_skill:         !a.frozen_skills,
            top_n:                 a.top_n,
            top_eeg_n:             a.top_eeg_n,
            eeg_only:              a.eeg_only,
            normalize:             a.normalize,
            holdout_fraction:      a.holdout_fraction,
            patience:              a.patience,
            patience_increase:     a.patience_increase,
            improvement_threshold: a.improvement_threshold,
            validation_frequency:  a.validation_frequency,
        }
    }
}

// ─── predict ──────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct PredictArgs {
    #[arg(long, default_value = "aligned.json")]
    pub data: PathBuf,

    /// Directory written by `train`
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    #[arg(long, default_value = "predictions.csv")]
    pub out: PathBuf,

    /// Defaults to the device the model was trained on
    #[arg(long, value_enum)]
    pub device: Option<DeviceArg>,

    #[arg(long, default_value_t = 1)]
    pub batch_size: usize,
}

impl From<PredictArgs> for PredictJob {
    fn from(a: PredictArgs) -> Self {
        PredictJob {
            data_path:      a.data,
            checkpoint_dir: a.checkpoint_dir,
            out_path:       a.out,
            device:         a.device.map(Into::into),
            batch_size:     a.batch_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(std::iter::once("eeg-kt").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_train_flag_defaults_match_config_defaults() {
        let Commands::Train(args) = parse(&["train"]) else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg, TrainConfig::default());
    }

    #[test]
    fn test_train_flags_override() {
        let Commands::Train(args) = parse(&[
            "train", "--optimizer", "adam", "--batch-size", "8", "--no-current-eeg", "--device", "gpu",
        ]) else {
            panic!("expected train")
        };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.optimizer, OptimizerKind::Adam);
        assert_eq!(cfg.batch_size, 8);
        assert_eq!(cfg.device, DeviceKind::Gpu);
        assert!(!cfg.current_eeg_on);
        assert!(cfg.previous_eeg_on);
    }

    #[test]
    fn test_params_file_wins_over_flags() {
        let path = std::env::temp_dir().join(format!("eeg-kt-params-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"batch_size": 5, "top_n": 3}"#).unwrap();

        let p = path.display().to_string();
        let Commands::Train(args) = parse(&["train", "--params", &p, "--batch-size", "9", "--data", "x.json"])
        else {
            panic!("expected train")
        };
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.batch_size, 5);
        assert_eq!(cfg.top_n, 3);
        assert_eq!(cfg.data_path, "x.json");
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_align_band_cutoffs() {
        let Commands::Align(args) = parse(&[
            "align", "--tasks", "t.csv", "--eeg", "e.csv", "--band-cutoffs", "1,8,13", "--mode", "overlap",
        ]) else {
            panic!("expected align")
        };
        let job: AlignJob = args.into();
        assert_eq!(job.spectral.cutoffs, vec![1.0, 8.0, 13.0]);
        assert_eq!(job.align.mode, AlignMode::Overlap);
        assert_eq!(job.align.sigqual_cutoff, 200);
    }

    #[test]
    fn test_default_cutoffs() {
        let Commands::Align(args) = parse(&["align", "--tasks", "t.csv", "--eeg", "e.csv"]) else {
            panic!("expected align")
        };
        assert_eq!(args.band_cutoffs, DEFAULT_CUTOFFS.to_vec());
    }
}
