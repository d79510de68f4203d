// ============================================================
// Layer 4 — Task / EEG Aligner
// ============================================================
// Attaches EEG features to task attempts.
//
// An epoch belongs to a task when:
//   - both come from the same subject
//   - the epoch's time window matches the task's (see AlignMode)
//   - the epoch's signal quality is below the cutoff
//
// A task's feature vector is the element-wise mean of its
// matched epochs' band powers, or None when nothing matched.
//
// Per subject, tasks and epochs are each sorted by start time and
// walked with two pointers:
//
//   epochs: [e0][e1][e2][e3][e4][e5] ...
//                 ^lo         ^scan stops at first start >= task.end
//
// `lo` only moves forward: an epoch that ended before this task
// started also ended before every later task started.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::DataError;
use crate::domain::records::{AlignedData, AlignedRecord, EegEpoch, TaskRecord};

pub const DEFAULT_SIGQUAL_CUTOFF: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignMode {
    /// Epoch midpoint lies in [task.start, task.end)
    Midpoint,
    /// Epoch window intersects the task window at all
    Overlap,
}

impl AlignMode {
    fn matches(self, task: &TaskRecord, epoch: &EegEpoch) -> bool {
        match self {
            AlignMode::Midpoint => task.contains(epoch.midpoint()),
            AlignMode::Overlap  => epoch.end >= task.start && epoch.start < task.end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignConfig {
    pub sigqual_cutoff: u32,
    pub mode:           AlignMode,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self { sigqual_cutoff: DEFAULT_SIGQUAL_CUTOFF, mode: AlignMode::Midpoint }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignStats {
    pub tasks:              usize,
    pub matched_tasks:      usize,
    pub epochs_used:        usize,
    /// Time-matched epochs dropped for poor signal quality
    pub quality_rejections: usize,
    pub subjects_without_eeg: usize,
}

#[derive(Debug, Clone)]
pub struct Alignment {
    /// One entry per input task, in input order
    pub features: Vec<Option<Vec<f32>>>,
    pub stats:    AlignStats,
}

pub fn align(
    tasks:  &[TaskRecord],
    epochs: &[EegEpoch],
    cfg:    &AlignConfig,
) -> Result<Alignment, DataError> {
    let task_groups = group_by_subject(tasks.iter().map(|t| (t.subject.as_str(), t.start)));
    let eeg_groups  = group_by_subject(epochs.iter().map(|e| (e.subject.as_str(), e.start)));

    let mut features = vec![None; tasks.len()];
    let mut stats    = AlignStats { tasks: tasks.len(), ..Default::default() };

    for (subject, task_ids) in &task_groups {
        let Some(eeg_ids) = eeg_groups.get(subject) else {
            stats.subjects_without_eeg += 1;
            continue;
        };

        let mut lo = 0usize;
        for &ti in task_ids {
            let task = &tasks[ti];

            while lo < eeg_ids.len() && epochs[eeg_ids[lo]].end < task.start {
                lo += 1;
            }

            let mut matched: Vec<&EegEpoch> = Vec::new();
            for &ei in eeg_ids[lo..].iter() {
                let epoch = &epochs[ei];
                if epoch.start >= task.end {
                    break;
                }
                if !cfg.mode.matches(task, epoch) {
                    continue;
                }
                if epoch.signal_quality < cfg.sigqual_cutoff {
                    matched.push(epoch);
                } else {
                    stats.quality_rejections += 1;
                }
            }

            if !matched.is_empty() {
                stats.matched_tasks += 1;
                stats.epochs_used   += matched.len();
                features[ti] = Some(mean_bands(&matched)?);
            }
        }
    }

    tracing::info!(
        "Aligned EEG to {}/{} tasks ({} epochs used, {} rejected for signal quality)",
        stats.matched_tasks,
        stats.tasks,
        stats.epochs_used,
        stats.quality_rejections,
    );
    if stats.subjects_without_eeg > 0 {
        tracing::warn!("{} subjects have no EEG recordings", stats.subjects_without_eeg);
    }

    Ok(Alignment { features, stats })
}

/// Combine tasks with their aligned features into the persisted form.
pub fn to_aligned_data(
    tasks:      Vec<TaskRecord>,
    alignment:  Alignment,
    band_names: Vec<String>,
) -> AlignedData {
    let records = tasks
        .into_iter()
        .zip(alignment.features)
        .map(|(t, eeg)| AlignedRecord {
            subject: t.subject,
            skill:   t.skill,
            correct: t.correct,
            start:   t.start,
            eeg,
        })
        .collect();
    AlignedData { band_names, records }
}

/// subject → row indices sorted by start time (ties keep input order)
fn group_by_subject<'a>(
    rows: impl Iterator<Item = (&'a str, f64)>,
) -> BTreeMap<&'a str, Vec<usize>> {
    let rows: Vec<(&str, f64)> = rows.collect();
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, (subject, _)) in rows.iter().enumerate() {
        groups.entry(*subject).or_default().push(i);
    }
    for ids in groups.values_mut() {
        ids.sort_by(|&a, &b| rows[a].1.total_cmp(&rows[b].1));
    }
    groups
}

fn mean_bands(epochs: &[&EegEpoch]) -> Result<Vec<f32>, DataError> {
    let width = epochs[0].bands.len();
    let mut sum = vec![0.0f64; width];
    for (i, e) in epochs.iter().enumerate() {
        if e.bands.len() != width {
            return Err(DataError::RaggedFeatures { index: i, got: e.bands.len(), expected: width });
        }
        for (s, &b) in sum.iter_mut().zip(&e.bands) {
            *s += b as f64;
        }
    }
    let n = epochs.len() as f64;
    Ok(sum.into_iter().map(|s| (s / n) as f32).collect())
}
