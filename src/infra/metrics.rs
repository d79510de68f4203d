// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch to {out_dir}/metrics.csv:
//
//   epoch,train_loss,train_auc,valid_auc,valid_loss
//   1,0.693100,0.512000,,
//   ...
//   5,0.652300,0.601200,0.574400,0.671900
//
// Validation columns are empty on epochs without a validation
// pass. AUC is empty when a fold holds only one class.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based
    pub epoch:      usize,
    /// Mean penalised loss over the epoch's training batches
    pub train_loss: f64,
    pub train_auc:  Option<f64>,
    pub valid_auc:  Option<f64>,
    pub valid_loss: Option<f64>,
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Starts a fresh metrics file in `dir`, replacing any previous one.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        let mut w = csv::Writer::from_path(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        w.write_record(["epoch", "train_loss", "train_auc", "valid_auc", "valid_loss"])?;
        w.flush()?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let file = OpenOptions::new().append(true).open(&self.csv_path)?;
        let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        w.write_record([
            m.epoch.to_string(),
            format!("{:.6}", m.train_loss),
            fmt_opt(m.train_auc),
            fmt_opt(m.valid_auc),
            fmt_opt(m.valid_loss),
        ])?;
        w.flush()?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}
