// ============================================================
// Layer 4 — Data Preparation
// ============================================================
// Turns AlignedData into the flat, id-encoded arrays the model
// reads from, in four steps:
//
//   1. subject selection   keep the subjects with the most rows
//                          (top_n) and/or the most EEG-bearing
//                          rows (top_eeg_n); 0 disables a filter
//   2. normalisation       optional per-subject min-max scaling
//                          of EEG vectors
//   3. masking             optionally drop rows without EEG
//   4. id encoding         subjects and skills through IdMaps
//
// The train/validation split is applied afterwards with
// `PreparedData::hold_out`, so prediction runs can prepare data
// without splitting it.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::normalize::normalize_columns;
use crate::data::splitter::{holdout_subjects, split_by_subject};
use crate::domain::error::DataError;
use crate::domain::records::AlignedData;
use crate::domain::vocab::IdMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrepareConfig {
    pub top_n:     usize,
    pub top_eeg_n: usize,
    pub eeg_only:  bool,
    pub normalize: bool,
}

#[derive(Debug, Clone)]
pub struct PreparedData {
    pub subjects:    IdMap,
    pub skills:      IdMap,
    pub subject_ids: Vec<usize>,
    pub skill_ids:   Vec<usize>,
    pub correct:     Vec<bool>,
    pub start:       Vec<f64>,
    pub eeg:         Vec<Option<Vec<f32>>>,
    pub train_idx:   Vec<usize>,
    pub valid_idx:   Vec<usize>,
}

impl PreparedData {
    pub fn len(&self) -> usize {
        self.subject_ids.len()
    }

    pub fn has_eeg(&self) -> bool {
        self.eeg.iter().any(Option::is_some)
    }

    /// Move a random subset of subjects into the validation fold.
    pub fn hold_out<R: Rng>(mut self, fraction: f64, rng: &mut R) -> Self {
        let held = holdout_subjects(&self.subject_ids, fraction, rng);
        let names: Vec<&str> = held.iter().map(|&s| self.subjects.label(s)).collect();
        tracing::info!("Subjects {:?} are held out", names);

        let (train, valid) = split_by_subject(&self.subject_ids, &held);
        self.train_idx = train;
        self.valid_idx = valid;
        self
    }
}

/// `skills` decides skill ids; pass the training vocabulary when
/// preparing data for a model that was trained earlier.
pub fn prepare(
    data:   &AlignedData,
    cfg:    &PrepareConfig,
    skills: IdMap,
) -> Result<PreparedData, DataError> {
    tracing::info!("Preparing {} aligned records", data.records.len());

    let selected = select_subjects(data, cfg);

    let mut eeg: Vec<Option<Vec<f32>>> = data.records.iter().map(|r| r.eeg.clone()).collect();
    if cfg.normalize {
        normalize_per_subject(data, &selected, &mut eeg);
    }

    let keep: Vec<usize> = (0..data.records.len())
        .filter(|&i| selected.contains(data.records[i].subject.as_str()))
        .filter(|&i| !cfg.eeg_only || eeg[i].is_some())
        .collect();

    if keep.is_empty() {
        return Err(DataError::EmptySelection);
    }

    let subjects = IdMap::from_values(keep.iter().map(|&i| data.records[i].subject.as_str()));

    let mut out = PreparedData {
        subject_ids: Vec::with_capacity(keep.len()),
        skill_ids:   Vec::with_capacity(keep.len()),
        correct:     Vec::with_capacity(keep.len()),
        start:       Vec::with_capacity(keep.len()),
        eeg:         Vec::with_capacity(keep.len()),
        train_idx:   (0..keep.len()).collect(),
        valid_idx:   Vec::new(),
        subjects,
        skills,
    };

    for i in keep {
        let r = &data.records[i];
        out.subject_ids.push(out.subjects.id(&r.subject));
        out.skill_ids.push(out.skills.id(&r.skill));
        out.correct.push(r.correct);
        out.start.push(r.start);
        out.eeg.push(eeg[i].take());
    }

    tracing::info!(
        "Prepared {} records from {} subjects ({} with EEG)",
        out.len(),
        out.subjects.known(),
        out.eeg.iter().filter(|e| e.is_some()).count(),
    );
    Ok(out)
}

fn select_subjects<'a>(data: &'a AlignedData, cfg: &PrepareConfig) -> BTreeSet<&'a str> {
    // subject → (rows, rows with EEG)
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for r in &data.records {
        let c = counts.entry(r.subject.as_str()).or_default();
        c.0 += 1;
        c.1 += usize::from(r.eeg.is_some());
    }

    let mut subjects: Vec<(&str, (usize, usize))> = counts.into_iter().collect();

    if cfg.top_n > 0 {
        subjects.sort_by_key(|&(_, (rows, _))| rows);
        let skip = subjects.len().saturating_sub(cfg.top_n);
        subjects.drain(..skip);
    }
    if cfg.top_eeg_n > 0 {
        subjects.sort_by_key(|&(_, (_, eeg_rows))| eeg_rows);
        let skip = subjects.len().saturating_sub(cfg.top_eeg_n);
        subjects.drain(..skip);
    }

    subjects.into_iter().map(|(s, _)| s).collect()
}

fn normalize_per_subject(
    data:     &AlignedData,
    selected: &BTreeSet<&str>,
    eeg:      &mut [Option<Vec<f32>>],
) {
    for &subject in selected {
        let idxs: Vec<usize> = (0..data.records.len())
            .filter(|&i| data.records[i].subject == subject && eeg[i].is_some())
            .collect();

        let mut table: Vec<Vec<f32>> = idxs.iter().filter_map(|&i| eeg[i].clone()).collect();
        normalize_columns(&mut table);

        for (&i, row) in idxs.iter().zip(table) {
            eeg[i] = Some(row);
        }
    }
}
