// ============================================================
// Layer 5 — Skill Accumulator
// ============================================================
// The learner's running state, one row per sequence position.
//
// After predicting base position b the combiner has summarised
// everything up to b-1, so its output is stored at row b-1. The
// prediction for b+1 then reads that row as its "b-2" input:
//
//   predict b:    read row b-2  →  combiner  →  write row b-1
//   predict b+1:  read row b-1  →  combiner  →  write row b
//
// Rows are plain data: gradients never flow through them, so the
// recurrence is truncated to one step.

use burn::prelude::*;

#[derive(Debug, Clone)]
pub struct Accumulator {
    width: usize,
    rows:  Vec<f32>,
}

impl Accumulator {
    pub fn new(num_rows: usize, width: usize) -> Self {
        Self { width, rows: vec![0.0; num_rows * width] }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, position: usize) -> &[f32] {
        &self.rows[position * self.width..(position + 1) * self.width]
    }

    /// State read by the predictions at `bases` (rows base-2).
    pub fn read_for<B: Backend>(&self, bases: &[usize], device: &B::Device) -> Tensor<B, 2> {
        let mut flat = Vec::with_capacity(bases.len() * self.width);
        for &b in bases {
            flat.extend_from_slice(self.row(b - 2));
        }
        Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([bases.len(), self.width])
    }

    /// Store combiner outputs for the predictions at `bases` (rows base-1).
    /// `state` is `[bases.len(), width]`.
    pub fn write_for<B: Backend>(&mut self, bases: &[usize], state: Tensor<B, 2>) {
        let values: Vec<f32> = state.into_data().iter::<f32>().collect();
        for (&b, chunk) in bases.iter().zip(values.chunks_exact(self.width)) {
            let start = (b - 1) * self.width;
            self.rows[start..start + self.width].copy_from_slice(chunk);
        }
    }
}
