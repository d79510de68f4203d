// ============================================================
// Layer 3 — IdMap
// ============================================================
// Assigns dense integer ids to categorical strings (skills,
// subjects) so they can index embedding rows.
//
// Id 0 is reserved for UNKNOWN. A skill that never appeared in
// the data the model was trained on still resolves to a row, and
// that row is the designated default vector.
//
// Ids are assigned in sorted order, so building an IdMap twice
// from the same values yields the same ids.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

pub const UNKNOWN_ID: usize = 0;
pub const UNKNOWN_LABEL: &str = "<unknown>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdMap {
    /// id → label; index 0 is always UNKNOWN_LABEL
    labels: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl IdMap {
    /// Build from every value observed, duplicates allowed.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let distinct: BTreeSet<&str> = values.into_iter().collect();
        let mut labels = Vec::with_capacity(distinct.len() + 1);
        labels.push(UNKNOWN_LABEL.to_string());
        labels.extend(distinct.into_iter().map(str::to_string));
        Self::from_labels(labels)
    }

    fn from_labels(labels: Vec<String>) -> Self {
        let index = labels
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Self { labels, index }
    }

    /// Rebuild the reverse index after deserialisation.
    pub fn reindexed(self) -> Self {
        Self::from_labels(self.labels)
    }

    /// Id for `label`, or UNKNOWN_ID when it was never seen.
    pub fn id(&self, label: &str) -> usize {
        self.index.get(label).copied().unwrap_or(UNKNOWN_ID)
    }

    pub fn label(&self, id: usize) -> &str {
        self.labels.get(id).map(String::as_str).unwrap_or(UNKNOWN_LABEL)
    }

    /// Number of rows an embedding over this map needs, UNKNOWN included.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Number of real (non-UNKNOWN) labels.
    pub fn known(&self) -> usize {
        self.labels.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sorted_and_start_at_one() {
        let m = IdMap::from_values(["sub", "add", "add", "mul"]);
        assert_eq!(m.id("add"), 1);
        assert_eq!(m.id("mul"), 2);
        assert_eq!(m.id("sub"), 3);
        assert_eq!(m.len(), 4);
        assert_eq!(m.known(), 3);
    }

    #[test]
    fn test_unseen_label_maps_to_unknown() {
        let m = IdMap::from_values(["add"]);
        assert_eq!(m.id("divide"), UNKNOWN_ID);
        assert_eq!(m.label(UNKNOWN_ID), UNKNOWN_LABEL);
        assert_eq!(m.label(99), UNKNOWN_LABEL);
    }

    #[test]
    fn test_json_roundtrip_restores_index() {
        let m = IdMap::from_values(["b", "a"]);
        let json = serde_json::to_string(&m).unwrap();
        let back: IdMap = serde_json::from_str::<IdMap>(&json).unwrap().reindexed();
        assert_eq!(back.id("b"), 2);
        assert_eq!(back, m);
    }
}
