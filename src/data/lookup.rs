// ============================================================
// Layer 4 — Lookup Table
// ============================================================
// Stores optional per-record feature vectors as a dense table
// plus one row index per record:
//
//   row 0      default vector (mean of all present rows)
//   row 1..=n  present vectors, min-max normalised per column
//
//   records:  [Some(a), None, Some(b), None]
//   index:    [   1,     0,     2,      0  ]
//
// Missing entries share row 0, so the table costs one row per
// present vector rather than one per record.
//
// The column bounds and default row are kept as `LookupStats`.
// Training saves them; prediction rebuilds its table from them
// with `with_stats`, so a record scores the same whatever else
// is in the file.

use serde::{Deserialize, Serialize};

use crate::data::normalize::{column_bounds, scale_columns};
use crate::domain::error::DataError;

pub const DEFAULT_ROW: usize = 0;

/// Scaling learned from the training table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupStats {
    pub min:         Vec<f32>,
    pub max:         Vec<f32>,
    pub default_row: Vec<f32>,
}

impl LookupStats {
    pub fn width(&self) -> usize {
        self.default_row.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    rows:  Vec<Vec<f32>>,
    index: Vec<usize>,
    width: usize,
    stats: LookupStats,
}

impl LookupTable {
    pub fn from_optional(entries: &[Option<Vec<f32>>]) -> Result<Self, DataError> {
        let width = entries
            .iter()
            .flatten()
            .map(Vec::len)
            .next()
            .ok_or(DataError::EmptyLookup)?;

        let (mut rows, index) = collect_rows(entries, width)?;
        let (min, max) = column_bounds(&rows[1..]);
        scale_columns(&mut rows[1..], &min, &max);
        let default_row = column_mean(&rows[1..], width);
        rows[DEFAULT_ROW] = default_row.clone();

        Ok(Self { rows, index, width, stats: LookupStats { min, max, default_row } })
    }

    /// Build with saved statistics instead of the entries' own. Works
    /// with no present entries at all: every record gets the default row.
    pub fn with_stats(entries: &[Option<Vec<f32>>], stats: &LookupStats) -> Result<Self, DataError> {
        let width = stats.width();
        for got in [stats.min.len(), stats.max.len()] {
            if got != width {
                return Err(DataError::StatsWidth { got, expected: width });
            }
        }

        let (mut rows, index) = collect_rows(entries, width)?;
        scale_columns(&mut rows[1..], &stats.min, &stats.max);
        rows[DEFAULT_ROW] = stats.default_row.clone();

        Ok(Self { rows, index, width, stats: stats.clone() })
    }

    pub fn stats(&self) -> &LookupStats {
        &self.stats
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of table rows, default row included.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn row_of(&self, record: usize) -> usize {
        self.index.get(record).copied().unwrap_or(DEFAULT_ROW)
    }

    pub fn vector(&self, record: usize) -> &[f32] {
        &self.rows[self.row_of(record)]
    }

    /// Flattened `[records.len(), width]` block for a batch.
    pub fn gather(&self, records: &[usize]) -> Vec<f32> {
        let mut out = Vec::with_capacity(records.len() * self.width);
        for &r in records {
            out.extend_from_slice(self.vector(r));
        }
        out
    }
}

/// Raw rows (row 0 left empty) and the per-record row index.
fn collect_rows(
    entries: &[Option<Vec<f32>>],
    width:   usize,
) -> Result<(Vec<Vec<f32>>, Vec<usize>), DataError> {
    let mut rows  = vec![Vec::new()];
    let mut index = Vec::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        match entry {
            Some(v) if v.len() != width => {
                return Err(DataError::RaggedFeatures { index: i, got: v.len(), expected: width });
            }
            Some(v) => {
                index.push(rows.len());
                rows.push(v.clone());
            }
            None => index.push(DEFAULT_ROW),
        }
    }
    Ok((rows, index))
}

fn column_mean(rows: &[Vec<f32>], width: usize) -> Vec<f32> {
    let n = rows.len().max(1) as f32;
    (0..width)
        .map(|c| rows.iter().map(|r| r[c]).sum::<f32>() / n)
        .collect()
}
