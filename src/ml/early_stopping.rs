// ============================================================
// Layer 5 — Early Stopping
// ============================================================
// Patience-based stopping on a validation score that is
// maximised (AUC).
//
//   - Validation runs every `validation_frequency` epochs.
//   - Training always runs at least `patience` epochs.
//   - A new best score that beats the old one by the
//     improvement threshold extends patience to
//     `epoch + patience_increase`.
//   - Training stops once `patience <= epoch`.
//
// Epochs are 0-based here; logs and checkpoints report them
// 1-based.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarlyStoppingConfig {
    pub patience:              usize,
    pub patience_increase:     usize,
    /// A score must exceed `best * threshold` to extend patience
    pub improvement_threshold: f64,
    pub validation_frequency:  usize,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        Self {
            patience:              50,
            patience_increase:     40,
            improvement_threshold: 1.0,
            validation_frequency:  5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    cfg:        EarlyStoppingConfig,
    patience:   usize,
    best_score: Option<f64>,
    best_epoch: Option<usize>,
}

impl EarlyStopping {
    pub fn new(cfg: EarlyStoppingConfig) -> Self {
        Self { patience: cfg.patience, cfg, best_score: None, best_epoch: None }
    }

    pub fn should_validate(&self, epoch: usize) -> bool {
        let freq = self.cfg.validation_frequency.max(1);
        (epoch + 1) % freq == 0
    }

    /// Record a validation score. Returns true when it is a new best.
    pub fn observe(&mut self, epoch: usize, score: f64) -> bool {
        let improved = self.best_score.map_or(true, |best| score > best);
        if !improved {
            return false;
        }
        let significant = self
            .best_score
            .map_or(true, |best| score > best * self.cfg.improvement_threshold);
        if significant {
            self.patience = self.patience.max(epoch + self.cfg.patience_increase);
        }
        self.best_score = Some(score);
        self.best_epoch = Some(epoch);
        true
    }

    /// Only meaningful on validation epochs, as in the loop that drives it.
    pub fn should_stop(&self, epoch: usize) -> bool {
        self.patience <= epoch
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn patience(&self) -> usize {
        self.patience
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stopper(patience: usize, increase: usize) -> EarlyStopping {
        EarlyStopping::new(EarlyStoppingConfig {
            patience,
            patience_increase: increase,
            improvement_threshold: 1.0,
            validation_frequency: 5,
        })
    }

    #[test]
    fn test_validates_every_fifth_epoch() {
        let s = stopper(50, 40);
        let validated: Vec<usize> = (0..15).filter(|&e| s.should_validate(e)).collect();
        assert_eq!(validated, vec![4, 9, 14]);
    }

    #[test]
    fn test_improvement_extends_patience() {
        let mut s = stopper(10, 40);
        assert!(s.observe(4, 0.6));
        assert_eq!(s.patience(), 44);
        assert!(!s.should_stop(40));
        assert!(s.should_stop(44));
    }

    #[test]
    fn test_worse_score_is_not_a_best() {
        let mut s = stopper(10, 5);
        s.observe(4, 0.7);
        assert!(!s.observe(9, 0.65));
        assert_eq!(s.best_score(), Some(0.7));
        assert_eq!(s.best_epoch(), Some(4));
        assert!(s.should_stop(10));
    }

    #[test]
    fn test_small_gain_below_threshold_keeps_patience() {
        let mut s = EarlyStopping::new(EarlyStoppingConfig {
            patience: 10,
            patience_increase: 40,
            improvement_threshold: 1.1,
            validation_frequency: 1,
        });
        s.observe(0, 0.5);
        let p = s.patience();
        // 0.52 is a new best but not 10% better
        assert!(s.observe(1, 0.52));
        assert_eq!(s.patience(), p);
        assert_eq!(s.best_score(), Some(0.52));
    }
}
