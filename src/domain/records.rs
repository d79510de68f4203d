// ============================================================
// Layer 3 — Record Types
// ============================================================
// The three shapes data takes on its way to the model:
//
//   TaskRecord   ─┐
//                 ├─ align ─→ AlignedRecord ─→ prepare ─→ tensors
//   EegEpoch     ─┘
//
// All timestamps are seconds as f64 so that both epoch-seconds
// and parsed calendar times compare on the same axis.

use serde::{Deserialize, Serialize};

use crate::domain::error::DataError;

/// One skill-practice attempt by one learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub subject: String,
    pub skill:   String,
    pub correct: bool,
    pub start:   f64,
    pub end:     f64,
}

impl TaskRecord {
    pub fn new(
        subject: impl Into<String>,
        skill:   impl Into<String>,
        correct: bool,
        start:   f64,
        end:     f64,
    ) -> Result<Self, DataError> {
        if !(start.is_finite() && end.is_finite()) {
            return Err(DataError::NonFiniteTime { start, end });
        }
        if end < start {
            return Err(DataError::InvertedInterval { start, end });
        }
        Ok(Self { subject: subject.into(), skill: skill.into(), correct, start, end })
    }

    /// Half-open containment: `start <= t < end`
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}

/// A timestamped EEG segment reduced to frequency-band powers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EegEpoch {
    pub subject: String,
    pub start:   f64,
    pub end:     f64,
    /// Headset signal-quality reading. Lower is better; 0 is a clean contact.
    pub signal_quality: u32,
    pub bands: Vec<f32>,
}

impl EegEpoch {
    pub fn new(
        subject:        impl Into<String>,
        start:          f64,
        end:            f64,
        signal_quality: u32,
        bands:          Vec<f32>,
    ) -> Result<Self, DataError> {
        if !(start.is_finite() && end.is_finite()) {
            return Err(DataError::NonFiniteTime { start, end });
        }
        if end < start {
            return Err(DataError::InvertedInterval { start, end });
        }
        Ok(Self { subject: subject.into(), start, end, signal_quality, bands })
    }

    pub fn midpoint(&self) -> f64 {
        self.start + (self.end - self.start) / 2.0
    }
}

/// A task attempt with the mean band-power vector of the EEG
/// epochs aligned to it, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedRecord {
    pub subject: String,
    pub skill:   String,
    pub correct: bool,
    pub start:   f64,
    pub eeg:     Option<Vec<f32>>,
}

/// The output of `align`, persisted as JSON and consumed by
/// `train` and `predict`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignedData {
    /// Human-readable label per EEG feature column, e.g. "delta"
    pub band_names: Vec<String>,
    pub records:    Vec<AlignedRecord>,
}

impl AlignedData {
    pub fn eeg_count(&self) -> usize {
        self.records.iter().filter(|r| r.eeg.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_rejects_inverted_interval() {
        assert!(TaskRecord::new("s1", "add", true, 10.0, 5.0).is_err());
        assert!(TaskRecord::new("s1", "add", true, 5.0, 5.0).is_ok());
    }

    #[test]
    fn test_non_finite_bounds_are_rejected() {
        assert!(matches!(
            TaskRecord::new("s1", "add", true, f64::NAN, 5.0),
            Err(DataError::NonFiniteTime { .. })
        ));
        assert!(matches!(
            EegEpoch::new("s1", 0.0, f64::INFINITY, 0, vec![1.0]),
            Err(DataError::NonFiniteTime { .. })
        ));
    }

    #[test]
    fn test_task_interval_is_half_open() {
        let t = TaskRecord::new("s1", "add", true, 10.0, 20.0).unwrap();
        assert!(t.contains(10.0));
        assert!(t.contains(19.999));
        assert!(!t.contains(20.0));
    }

    #[test]
    fn test_epoch_midpoint() {
        let e = EegEpoch::new("s1", 4.0, 6.0, 0, vec![1.0]).unwrap();
        assert_eq!(e.midpoint(), 5.0);
    }
}
