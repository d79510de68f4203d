// ============================================================
// Layer 2 — AlignUseCase
// ============================================================
// Builds the aligned dataset every later command reads:
//
//   Step 1: Load task attempts       (TaskSource)
//   Step 2: Load EEG epochs          (EegSource; band powers)
//   Step 3: Align epochs to tasks    (Layer 4 - data)
//   Step 4: Save aligned data        (Layer 6 - infra)

use std::path::PathBuf;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    aligner::{align, to_aligned_data, AlignConfig, AlignStats},
    loader::{CsvEegLoader, CsvTaskLoader},
    spectral::SpectralConfig,
};
use crate::domain::traits::{EegSource, TaskSource};
use crate::infra::dataset_store::DatasetStore;

/// Everything `align` is configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignJob {
    pub tasks_path:  PathBuf,
    pub eeg_path:    PathBuf,
    pub out_path:    PathBuf,
    pub time_format: String,
    pub align:       AlignConfig,
    pub spectral:    SpectralConfig,
}

pub struct AlignUseCase<T: TaskSource, E: EegSource> {
    tasks:      T,
    eeg:        E,
    config:     AlignConfig,
    band_names: Vec<String>,
    store:      DatasetStore,
}

impl AlignJob {
    pub fn validate(&self) -> Result<()> {
        let cutoffs = &self.spectral.cutoffs;
        ensure!(cutoffs.len() >= 2, "At least two band cutoffs are needed, got {}", cutoffs.len());
        ensure!(
            cutoffs.windows(2).all(|w| w[0] < w[1]),
            "Band cutoffs must be strictly increasing: {:?}",
            cutoffs
        );
        ensure!(self.spectral.sampling_rate > 0.0, "Sampling rate must be positive");
        Ok(())
    }
}

impl AlignUseCase<CsvTaskLoader, CsvEegLoader> {
    pub fn from_csv(job: AlignJob) -> Result<Self> {
        job.validate()?;
        let band_names = job.spectral.band_names();
        Ok(Self {
            tasks: CsvTaskLoader::new(&job.tasks_path, job.time_format.clone()),
            eeg:   CsvEegLoader::new(&job.eeg_path, job.time_format, job.spectral),
            config: job.align,
            band_names,
            store: DatasetStore::new(&job.out_path),
        })
    }
}

impl<T: TaskSource, E: EegSource> AlignUseCase<T, E> {
    pub fn new(tasks: T, eeg: E, config: AlignConfig, band_names: Vec<String>, store: DatasetStore) -> Self {
        Self { tasks, eeg, config, band_names, store }
    }

    pub fn execute(&self) -> Result<AlignStats> {
        let tasks  = self.tasks.load_tasks()?;
        let epochs = self.eeg.load_epochs()?;

        tracing::info!(
            "Aligning with {:?} matching, signal quality cutoff {}",
            self.config.mode,
            self.config.sigqual_cutoff
        );
        let alignment = align(&tasks, &epochs, &self.config)?;
        let stats     = alignment.stats.clone();

        let data = to_aligned_data(tasks, alignment, self.band_names.clone());
        self.store.save(&data)?;
        Ok(stats)
    }
}
