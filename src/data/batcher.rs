// ============================================================
// Layer 4 — Knowledge-Tracing Batcher
// ============================================================
// Implements Burn's Batcher trait: turns a list of base
// positions into the tensors one forward pass needs.
//
// For each base position b in the batch:
//
//   current_skill     skill id at b              [n, 1] Int
//   previous_skill    skill id at b-1            [n, 1] Int
//   previous_correct  1.0 / 0.0 at b-1           [n, 1]
//   previous_eeg      lookup row at b-1          [n, eeg_width]  (optional)
//   current_eeg       lookup row at b            [n, eeg_width]  (optional)
//   labels            correctness at b           [n]    Int
//
// The combiner's recurrent input (accumulator row b-2) changes
// as training proceeds, so the trainer supplies it separately.

use std::sync::Arc;

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::{dataset::KtItem, lookup::LookupTable, sequencer::Sequence};

#[derive(Debug, Clone)]
pub struct KtBatch<B: Backend> {
    /// Base positions, kept so the trainer can update the accumulator
    pub bases:            Vec<usize>,
    pub current_skill:    Tensor<B, 2, Int>,
    pub previous_skill:   Tensor<B, 2, Int>,
    pub previous_correct: Tensor<B, 2>,
    pub previous_eeg:     Option<Tensor<B, 2>>,
    pub current_eeg:      Option<Tensor<B, 2>>,
    pub labels:           Tensor<B, 1, Int>,
}

/// Which EEG lookups feed the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EegInputs {
    pub previous: bool,
    pub current:  bool,
}

#[derive(Clone, Debug)]
pub struct KtBatcher<B: Backend> {
    device:   B::Device,
    sequence: Arc<Sequence>,
    eeg:      Option<Arc<LookupTable>>,
    inputs:   EegInputs,
}

impl<B: Backend> KtBatcher<B> {
    pub fn new(
        device:   B::Device,
        sequence: Arc<Sequence>,
        eeg:      Option<Arc<LookupTable>>,
        inputs:   EegInputs,
    ) -> Self {
        // No table means no EEG inputs, whatever was asked for.
        let inputs = if eeg.is_some() { inputs } else { EegInputs::default() };
        Self { device, sequence, eeg, inputs }
    }

    fn skill_column(&self, positions: &[usize]) -> Tensor<B, 2, Int> {
        let ids: Vec<i32> = positions.iter().map(|&p| self.sequence.skill_ids[p] as i32).collect();
        Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &self.device).reshape([positions.len(), 1])
    }

    fn eeg_block(&self, positions: &[usize], enabled: bool) -> Option<Tensor<B, 2>> {
        let table = self.eeg.as_ref().filter(|_| enabled)?;
        let flat  = table.gather(positions);
        Some(
            Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device)
                .reshape([positions.len(), table.width()]),
        )
    }
}

impl<B: Backend> Batcher<KtItem, KtBatch<B>> for KtBatcher<B> {
    fn batch(&self, items: Vec<KtItem>) -> KtBatch<B> {
        let bases: Vec<usize>    = items.iter().map(|i| i.base).collect();
        let previous: Vec<usize> = bases.iter().map(|&b| b - 1).collect();
        let n = bases.len();

        let previous_correct: Vec<f32> = previous
            .iter()
            .map(|&p| if self.sequence.correct[p] { 1.0 } else { 0.0 })
            .collect();
        let labels: Vec<i32> = bases
            .iter()
            .map(|&b| i32::from(self.sequence.correct[b]))
            .collect();

        KtBatch {
            current_skill:    self.skill_column(&bases),
            previous_skill:   self.skill_column(&previous),
            previous_correct: Tensor::<B, 1>::from_floats(previous_correct.as_slice(), &self.device)
                .reshape([n, 1]),
            previous_eeg:     self.eeg_block(&previous, self.inputs.previous),
            current_eeg:      self.eeg_block(&bases, self.inputs.current),
            labels:           Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device),
            bases,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn sequence() -> Arc<Sequence> {
        Arc::new(Sequence {
            order:       (0..4).collect(),
            subject_ids: vec![1; 4],
            skill_ids:   vec![1, 2, 3, 1],
            correct:     vec![true, false, true, true],
            eeg:         vec![Some(vec![0.0]), None, Some(vec![2.0]), None],
            bases:       vec![2, 3],
            train_idx:   vec![2, 3],
            valid_idx:   vec![],
        })
    }

    #[test]
    fn test_batch_shapes_and_values() {
        let seq   = sequence();
        let table = Arc::new(LookupTable::from_optional(&seq.eeg).unwrap());
        let batcher = KtBatcher::<TestBackend>::new(
            Default::default(),
            seq,
            Some(table),
            EegInputs { previous: true, current: true },
        );
        let batch = batcher.batch(vec![KtItem { base: 2 }, KtItem { base: 3 }]);

        assert_eq!(batch.bases, vec![2, 3]);
        assert_eq!(batch.current_skill.dims(), [2, 1]);
        assert_eq!(batch.labels.dims(), [2]);

        let prev_skill: Vec<i64> = batch.previous_skill.into_data().iter::<i64>().collect();
        assert_eq!(prev_skill, vec![2, 3]);

        let prev_correct: Vec<f32> = batch.previous_correct.into_data().iter::<f32>().collect();
        assert_eq!(prev_correct, vec![0.0, 1.0]);

        // position 1 has no EEG → default row (mean = 0.5), position 2 → 1.0
        let prev_eeg: Vec<f32> = batch.previous_eeg.unwrap().into_data().iter::<f32>().collect();
        assert_eq!(prev_eeg, vec![0.5, 1.0]);
    }

    #[test]
    fn test_no_table_disables_eeg_inputs() {
        let batcher = KtBatcher::<TestBackend>::new(
            Default::default(),
            sequence(),
            None,
            EegInputs { previous: true, current: true },
        );
        let batch = batcher.batch(vec![KtItem { base: 2 }]);
        assert!(batch.previous_eeg.is_none());
        assert!(batch.current_eeg.is_none());
    }
}
