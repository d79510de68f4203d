// ============================================================
// Layer 4 — Sequencer
// ============================================================
// Lays prepared records out so every prediction can read its
// learner's history by plain index arithmetic.
//
// Records are ordered by subject, then by start time:
//
//   pos:      0    1    2    3    4    5    6
//   subject:  a    a    a    a    b    b    b
//                       ^base      ^       ^base
//
// A "base index" is the position being predicted. The model
// reads base-1 (previous attempt) and base-2 (accumulated state
// before that), so the first HISTORY positions of every subject
// cannot be bases.

use crate::data::preparer::PreparedData;

/// Attempts a base index needs behind it within the same subject.
pub const HISTORY: usize = 2;

#[derive(Debug, Clone)]
pub struct Sequence {
    /// position → index into PreparedData
    pub order:       Vec<usize>,
    pub subject_ids: Vec<usize>,
    pub skill_ids:   Vec<usize>,
    pub correct:     Vec<bool>,
    pub eeg:         Vec<Option<Vec<f32>>>,
    /// All valid base positions, ascending
    pub bases:       Vec<usize>,
    /// Base positions belonging to the training fold, ascending
    pub train_idx:   Vec<usize>,
    /// Base positions belonging to the validation fold, ascending
    pub valid_idx:   Vec<usize>,
}

impl Sequence {
    pub fn from_prepared(data: &PreparedData) -> Self {
        let mut order: Vec<usize> = (0..data.len()).collect();
        order.sort_by(|&a, &b| {
            data.subject_ids[a]
                .cmp(&data.subject_ids[b])
                .then(data.start[a].total_cmp(&data.start[b]))
        });

        let subject_ids: Vec<usize> = order.iter().map(|&i| data.subject_ids[i]).collect();
        let skill_ids   = order.iter().map(|&i| data.skill_ids[i]).collect();
        let correct     = order.iter().map(|&i| data.correct[i]).collect();
        let eeg         = order.iter().map(|&i| data.eeg[i].clone()).collect();

        let bases = base_positions(&subject_ids);

        // prepared index → fold membership
        let mut in_train = vec![false; data.len()];
        let mut in_valid = vec![false; data.len()];
        data.train_idx.iter().for_each(|&i| in_train[i] = true);
        data.valid_idx.iter().for_each(|&i| in_valid[i] = true);

        let train_idx: Vec<usize> = bases.iter().copied().filter(|&p| in_train[order[p]]).collect();
        let valid_idx: Vec<usize> = bases.iter().copied().filter(|&p| in_valid[order[p]]).collect();

        tracing::info!("training set size: {}", train_idx.len());
        tracing::info!("validation set size: {}", valid_idx.len());

        Self { order, subject_ids, skill_ids, correct, eeg, bases, train_idx, valid_idx }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

fn base_positions(subject_ids: &[usize]) -> Vec<usize> {
    let mut bases = Vec::new();
    let mut run   = 0usize;
    for (pos, s) in subject_ids.iter().enumerate() {
        if pos > 0 && subject_ids[pos - 1] == *s {
            run += 1;
        } else {
            run = 0;
        }
        if run >= HISTORY {
            bases.push(pos);
        }
    }
    bases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocab::IdMap;

    fn prepared(subjects: Vec<usize>, start: Vec<f64>, valid: Vec<usize>) -> PreparedData {
        let n = subjects.len();
        PreparedData {
            subjects:    IdMap::from_values(["a", "b"]),
            skills:      IdMap::from_values(["add"]),
            skill_ids:   vec![1; n],
            correct:     (0..n).map(|i| i % 2 == 0).collect(),
            eeg:         vec![None; n],
            train_idx:   (0..n).filter(|i| !valid.contains(i)).collect(),
            valid_idx:   valid,
            subject_ids: subjects,
            start,
        }
    }

    #[test]
    fn test_first_two_attempts_per_subject_are_not_bases() {
        assert_eq!(base_positions(&[1, 1, 1, 1, 2, 2, 2]), vec![2, 3, 6]);
        assert_eq!(base_positions(&[1, 2, 3]), Vec::<usize>::new());
    }

    #[test]
    fn test_orders_by_subject_then_time() {
        let p = prepared(vec![2, 1, 2, 1, 1], vec![5.0, 3.0, 1.0, 1.0, 2.0], vec![]);
        let s = Sequence::from_prepared(&p);
        assert_eq!(s.order, vec![3, 4, 1, 2, 0]);
        assert_eq!(s.subject_ids, vec![1, 1, 1, 2, 2]);
        assert_eq!(s.bases, vec![2]);
    }

    #[test]
    fn test_folds_are_expressed_in_positions() {
        // subject 1: prepared 0..4, subject 2 (validation): prepared 4..8
        let p = prepared(
            vec![1, 1, 1, 1, 2, 2, 2, 2],
            (0..8u32).map(f64::from).collect(),
            vec![4, 5, 6, 7],
        );
        let s = Sequence::from_prepared(&p);
        assert_eq!(s.train_idx, vec![2, 3]);
        assert_eq!(s.valid_idx, vec![6, 7]);
    }
}
