// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Holds out whole subjects for validation.
//
// Splitting by record would put the same learner on both sides,
// and the model would be scored on a sequence it has already
// tracked. Holding out subjects measures how well the model
// generalises to learners it has never seen.
//
// The hold-out count is round(n_subjects * fraction), clamped so
// that at least one subject lands on each side whenever there
// are two or more subjects.

use std::collections::BTreeSet;

use rand::{seq::SliceRandom, Rng};

pub const DEFAULT_HOLDOUT_FRACTION: f64 = 0.1;

/// Pick the subject ids to hold out.
pub fn holdout_subjects<R: Rng>(
    subject_ids: &[usize],
    fraction:    f64,
    rng:         &mut R,
) -> BTreeSet<usize> {
    let mut distinct: Vec<usize> = subject_ids
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let total = distinct.len();
    if total < 2 {
        tracing::warn!("Only {} subject(s); nothing can be held out for validation", total);
        return BTreeSet::new();
    }

    let count = ((total as f64) * fraction).round() as usize;
    let count = count.clamp(1, total - 1);

    distinct.shuffle(rng);
    distinct.into_iter().take(count).collect()
}

/// Record indices split into (train, validation) by subject.
pub fn split_by_subject(
    subject_ids: &[usize],
    held_out:    &BTreeSet<usize>,
) -> (Vec<usize>, Vec<usize>) {
    let (valid, train): (Vec<usize>, Vec<usize>) = (0..subject_ids.len())
        .partition(|&i| held_out.contains(&subject_ids[i]));

    tracing::debug!(
        "Dataset split: {} training, {} validation records",
        train.len(),
        valid.len(),
    );

    (train, valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_holds_out_rounded_fraction_of_subjects() {
        let subjects: Vec<usize> = (0..20).flat_map(|s| [s, s, s]).collect();
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(holdout_subjects(&subjects, 0.1, &mut rng).len(), 2);
    }

    #[test]
    fn test_at_least_one_each_side() {
        let subjects = vec![1, 2, 3];
        let mut rng  = StdRng::seed_from_u64(1);
        assert_eq!(holdout_subjects(&subjects, 0.01, &mut rng).len(), 1);
        assert_eq!(holdout_subjects(&subjects, 0.99, &mut rng).len(), 2);
    }

    #[test]
    fn test_single_subject_holds_out_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(holdout_subjects(&[4, 4, 4], 0.5, &mut rng).is_empty());
    }

    #[test]
    fn test_split_keeps_subjects_together() {
        let subjects = vec![0, 1, 0, 2, 1];
        let held: BTreeSet<usize> = [1].into_iter().collect();
        let (train, valid) = split_by_subject(&subjects, &held);
        assert_eq!(train, vec![0, 2, 3]);
        assert_eq!(valid, vec![1, 4]);
    }

    #[test]
    fn test_same_seed_same_holdout() {
        let subjects: Vec<usize> = (0..30).collect();
        let a = holdout_subjects(&subjects, 0.2, &mut StdRng::seed_from_u64(42));
        let b = holdout_subjects(&subjects, 0.2, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
