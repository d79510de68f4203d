use thiserror::Error;

/// Failures in the data pipeline that are the input's fault
/// rather than the filesystem's.
#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    #[error("interval ends ({end}) before it starts ({start})")]
    InvertedInterval { start: f64, end: f64 },

    #[error("interval has a non-finite bound ({start}, {end})")]
    NonFiniteTime { start: f64, end: f64 },

    #[error("can't create lookup table from no data")]
    EmptyLookup,

    #[error("feature vector {index} has width {got}, expected {expected}")]
    RaggedFeatures { index: usize, got: usize, expected: usize },

    #[error("saved lookup statistics cover {got} columns, expected {expected}")]
    StatsWidth { got: usize, expected: usize },

    #[error("no records left after subject selection")]
    EmptySelection,

    #[error("model needs EEG features but the dataset has none")]
    MissingEeg,
}
