use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One prediction target: a base position in the Sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KtItem {
    pub base: usize,
}

/// The base positions of one fold, in sequence order.
pub struct KtDataset {
    bases: Vec<usize>,
}

impl KtDataset {
    pub fn new(bases: Vec<usize>) -> Self { Self { bases } }

    /// Consecutive items `[start, start + size)`, clipped to the end.
    pub fn window(&self, start: usize, size: usize) -> Vec<KtItem> {
        (start..(start + size).min(self.len()))
            .filter_map(|i| self.get(i))
            .collect()
    }
}

impl Dataset<KtItem> for KtDataset {
    fn get(&self, index: usize) -> Option<KtItem> {
        self.bases.get(index).map(|&base| KtItem { base })
    }

    fn len(&self) -> usize {
        self.bases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_clipped() {
        let d = KtDataset::new(vec![5, 6, 7]);
        assert_eq!(d.window(0, 2), vec![KtItem { base: 5 }, KtItem { base: 6 }]);
        assert_eq!(d.window(2, 2), vec![KtItem { base: 7 }]);
        assert!(d.window(3, 2).is_empty());
    }
}
