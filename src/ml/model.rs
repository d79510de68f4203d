use burn::{
    nn::{
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{relu, softmax, tanh},
};

use crate::data::batcher::{EegInputs, KtBatch};

/// Correct / incorrect.
pub const NUM_CLASSES: usize = 2;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct KtModelConfig {
    /// Embedding rows, UNKNOWN included
    pub n_skills: usize,
    /// Width of an EEG lookup row; 0 when the data has no EEG
    pub eeg_width: usize,
    #[config(default = 100)]
    pub skill_vector_len: usize,
    #[config(default = 1)]
    pub combiner_depth: usize,
    #[config(default = 200)]
    pub combiner_width: usize,
    #[config(default = 1)]
    pub main_net_depth: usize,
    #[config(default = 500)]
    pub main_net_width: usize,
    #[config(default = true)]
    pub previous_eeg_on: bool,
    #[config(default = true)]
    pub current_eeg_on: bool,
    /// When false the skill vectors stay at their initial values
    #[config(default = true)]
    pub mutable_skill: bool,
    #[config(default = 0.2)]
    pub dropout: f64,
}

impl KtModelConfig {
    /// The EEG lookups this configuration actually consumes.
    pub fn eeg_inputs(&self) -> EegInputs {
        EegInputs {
            previous: self.previous_eeg_on && self.eeg_width > 0,
            current:  self.current_eeg_on && self.eeg_width > 0,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> KtModel<B> {
        let inputs = self.eeg_inputs();

        // [accumulator, previous skill, previous correct, previous eeg?]
        let combiner_in = self.combiner_width
            + self.skill_vector_len
            + 1
            + if inputs.previous { self.eeg_width } else { 0 };
        // [combiner state, current skill, current eeg?]
        let classifier_in = self.combiner_width
            + self.skill_vector_len
            + if inputs.current { self.eeg_width } else { 0 };

        // Depth 0 classifier feeds its input straight to the output layer
        let output_in = if self.main_net_depth == 0 { classifier_in } else { self.main_net_width };

        KtModel {
            skill_embedding: EmbeddingConfig::new(self.n_skills, self.skill_vector_len).init(device),
            combiner: HiddenNetwork::new(
                combiner_in, self.combiner_width, self.combiner_depth, self.dropout, device,
            ),
            classifier: HiddenNetwork::new(
                classifier_in, self.main_net_width, self.main_net_depth, self.dropout, device,
            ),
            output: LinearConfig::new(output_in, NUM_CLASSES).init(device),
            skill_vector_len: self.skill_vector_len,
            mutable_skill:    self.mutable_skill,
        }
    }
}

/// A stack of equally wide dense layers with dropout after each
/// activation. Depth 0 is the identity.
#[derive(Module, Debug)]
pub struct HiddenNetwork<B: Backend> {
    pub layers:  Vec<Linear<B>>,
    pub dropout: Dropout,
}

impl<B: Backend> HiddenNetwork<B> {
    fn new(n_in: usize, width: usize, depth: usize, dropout: f64, device: &B::Device) -> Self {
        let layers = (0..depth)
            .map(|i| LinearConfig::new(if i == 0 { n_in } else { width }, width).init(device))
            .collect();
        Self { layers, dropout: DropoutConfig::new(dropout).init() }
    }

    pub fn forward(
        &self,
        mut x:      Tensor<B, 2>,
        activation: impl Fn(Tensor<B, 2>) -> Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        for layer in &self.layers {
            x = self.dropout.forward(activation(layer.forward(x)));
        }
        x
    }

    fn weights(&self) -> impl Iterator<Item = Tensor<B, 2>> + '_ {
        self.layers.iter().map(|l| l.weight.val())
    }
}

#[derive(Module, Debug)]
pub struct KtModel<B: Backend> {
    pub skill_embedding:  Embedding<B>,
    /// Folds the previous attempt into the learner's running state
    pub combiner:         HiddenNetwork<B>,
    pub classifier:       HiddenNetwork<B>,
    pub output:           Linear<B>,
    pub skill_vector_len: usize,
    pub mutable_skill:    bool,
}

pub struct KtOutput<B: Backend> {
    /// [batch, NUM_CLASSES]
    pub logits: Tensor<B, 2>,
    /// Combiner output, [batch, combiner_width]; becomes accumulator row base-1
    pub state:  Tensor<B, 2>,
}

impl<B: Backend> KtModel<B> {
    /// `accumulator`: combiner state at base-2, [batch, combiner_width]
    pub fn forward(&self, batch: &KtBatch<B>, accumulator: Tensor<B, 2>) -> KtOutput<B> {
        let previous_skill = self.embed(batch.previous_skill.clone());
        let current_skill  = self.embed(batch.current_skill.clone());

        let mut combiner_in = vec![accumulator, previous_skill, batch.previous_correct.clone()];
        if let Some(eeg) = &batch.previous_eeg {
            combiner_in.push(eeg.clone());
        }
        let state = self.combiner.forward(Tensor::cat(combiner_in, 1), relu);

        let mut classifier_in = vec![state.clone(), current_skill];
        if let Some(eeg) = &batch.current_eeg {
            classifier_in.push(eeg.clone());
        }
        let hidden = self.classifier.forward(Tensor::cat(classifier_in, 1), tanh);

        KtOutput { logits: self.output.forward(hidden), state }
    }

    /// Cross-entropy plus L1/L2 penalties on every dense weight matrix.
    pub fn forward_loss(
        &self,
        batch:       &KtBatch<B>,
        accumulator: Tensor<B, 2>,
        l1_reg:      f64,
        l2_reg:      f64,
    ) -> (Tensor<B, 1>, KtOutput<B>) {
        let output = self.forward(batch, accumulator);
        let ce = CrossEntropyLossConfig::new().init(&output.logits.device());
        let nll = ce.forward(output.logits.clone(), batch.labels.clone());

        let (l1, l2) = self.weight_penalties();
        let loss = nll + l1.mul_scalar(l1_reg) + l2.mul_scalar(l2_reg);
        (loss, output)
    }

    /// (Σ|W|, ΣW²) over the combiner, classifier and output weights.
    pub fn weight_penalties(&self) -> (Tensor<B, 1>, Tensor<B, 1>) {
        let out = self.output.weight.val();
        let mut l1 = out.clone().abs().sum();
        let mut l2 = (out.clone() * out).sum();
        for w in self.combiner.weights().chain(self.classifier.weights()) {
            l1 = l1 + w.clone().abs().sum();
            l2 = l2 + (w.clone() * w).sum();
        }
        (l1, l2)
    }

    fn embed(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [n, _] = ids.dims();
        let v = self
            .skill_embedding
            .forward(ids)
            .reshape([n, self.skill_vector_len]);
        if self.mutable_skill { v } else { v.detach() }
    }
}

/// P(correct) per row of `logits`.
pub fn probabilities<B: Backend>(logits: Tensor<B, 2>) -> Vec<f32> {
    let [n, _] = logits.dims();
    softmax(logits, 1)
        .slice([0..n, 1..2])
        .reshape([n])
        .into_data()
        .iter::<f32>()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use burn::backend::{Autodiff, NdArray};
    use burn::data::dataloader::batcher::Batcher;

    use crate::data::{batcher::KtBatcher, dataset::KtItem, lookup::LookupTable, sequencer::Sequence};

    type TestBackend = NdArray;

    fn sequence() -> Arc<Sequence> {
        Arc::new(Sequence {
            order:       (0..5).collect(),
            subject_ids: vec![1; 5],
            skill_ids:   vec![1, 2, 1, 2, 1],
            correct:     vec![true, false, true, false, true],
            eeg:         vec![Some(vec![1.0, 2.0]), None, Some(vec![3.0, 0.0]), None, None],
            bases:       vec![2, 3, 4],
            train_idx:   vec![2, 3, 4],
            valid_idx:   vec![],
        })
    }

    fn config(eeg_width: usize) -> KtModelConfig {
        KtModelConfig::new(3, eeg_width)
            .with_skill_vector_len(4)
            .with_combiner_width(6)
            .with_main_net_width(5)
    }

    fn batch<B: Backend>(cfg: &KtModelConfig) -> KtBatch<B> {
        let seq   = sequence();
        let table = Arc::new(LookupTable::from_optional(&seq.eeg).unwrap());
        KtBatcher::<B>::new(Default::default(), seq, Some(table), cfg.eeg_inputs())
            .batch(vec![KtItem { base: 2 }, KtItem { base: 3 }, KtItem { base: 4 }])
    }

    #[test]
    fn test_forward_shapes_with_eeg() {
        let device = Default::default();
        let cfg    = config(2);
        let model: KtModel<TestBackend> = cfg.init(&device);
        let acc    = Tensor::<TestBackend, 2>::zeros([3, 6], &device);

        let out = model.forward(&batch(&cfg), acc);
        assert_eq!(out.logits.dims(), [3, NUM_CLASSES]);
        assert_eq!(out.state.dims(), [3, 6]);
    }

    #[test]
    fn test_forward_without_eeg_inputs() {
        let device = Default::default();
        let cfg    = config(2).with_previous_eeg_on(false).with_current_eeg_on(false);
        let model: KtModel<TestBackend> = cfg.init(&device);
        let acc    = Tensor::<TestBackend, 2>::zeros([3, 6], &device);

        let b = batch::<TestBackend>(&cfg);
        assert!(b.previous_eeg.is_none());
        assert_eq!(model.forward(&b, acc).logits.dims(), [3, NUM_CLASSES]);
    }

    #[test]
    fn test_probabilities_are_in_unit_interval() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0], [0.0, 10.0]], &device);
        let p = probabilities(logits);
        assert!((p[0] - 0.5).abs() < 1e-6);
        assert!(p[1] > 0.99);
    }

    #[test]
    fn test_penalties_grow_with_weights() {
        let device = Default::default();
        let model: KtModel<TestBackend> = config(0).init(&device);
        let (l1, l2) = model.weight_penalties();
        assert!(l1.into_scalar() > 0.0);
        assert!(l2.into_scalar() > 0.0);
    }

    #[test]
    fn test_loss_is_finite_and_backpropagates() {
        type AD = Autodiff<TestBackend>;
        let device = Default::default();
        let cfg    = config(2);
        let model: KtModel<AD> = cfg.init(&device);
        let acc    = Tensor::<AD, 2>::zeros([3, 6], &device);

        let (loss, _) = model.forward_loss(&batch(&cfg), acc, 0.0, 1e-4);
        let value: f32 = loss.clone().into_scalar();
        assert!(value.is_finite() && value > 0.0);
        let grads = loss.backward();
        assert!(model.output.weight.val().grad(&grads).is_some());
    }
}
