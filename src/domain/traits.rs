// ============================================================
// Layer 3 — Core Traits
// ============================================================
// The application layer loads records through these traits so
// the CSV loaders can be swapped for any other source.

use anyhow::Result;

use crate::domain::records::{EegEpoch, TaskRecord};

/// Any component that can load task attempts.
pub trait TaskSource {
    fn load_tasks(&self) -> Result<Vec<TaskRecord>>;
}

/// Any component that can load EEG epochs.
pub trait EegSource {
    fn load_epochs(&self) -> Result<Vec<EegEpoch>>;
}
