// ============================================================
// Layer 4 — Column Normalisation
// ============================================================
// Min-max scales each column of a row-major table to [0, 1].
// A column whose values are all equal carries no information,
// so it maps to 0 rather than dividing by zero.

/// Normalise `rows` in place. All rows must share a width.
pub fn normalize_columns(rows: &mut [Vec<f32>]) {
    let (min, max) = column_bounds(rows);
    scale_columns(rows, &min, &max);
}

/// Per-column `(min, max)`; both empty when there are no rows.
pub fn column_bounds(rows: &[Vec<f32>]) -> (Vec<f32>, Vec<f32>) {
    let width = rows.first().map_or(0, Vec::len);
    let mut min = vec![f32::INFINITY; width];
    let mut max = vec![f32::NEG_INFINITY; width];
    for row in rows {
        for (col, &v) in row.iter().enumerate().take(width) {
            min[col] = min[col].min(v);
            max[col] = max[col].max(v);
        }
    }
    (min, max)
}

/// Scale `rows` with bounds taken from some other table. Values outside
/// `[min, max]` land outside `[0, 1]`.
pub fn scale_columns(rows: &mut [Vec<f32>], min: &[f32], max: &[f32]) {
    for row in rows.iter_mut() {
        for ((v, &lo), &hi) in row.iter_mut().zip(min).zip(max) {
            let range = hi - lo;
            *v = if range > 0.0 { (*v - lo) / range } else { 0.0 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scales_each_column_independently() {
        let mut t = vec![vec![0.0, 10.0], vec![5.0, 20.0], vec![10.0, 30.0]];
        normalize_columns(&mut t);
        assert_eq!(t, vec![vec![0.0, 0.0], vec![0.5, 0.5], vec![1.0, 1.0]]);
    }

    #[test]
    fn test_constant_column_becomes_zero() {
        let mut t = vec![vec![3.0, 1.0], vec![3.0, 2.0]];
        normalize_columns(&mut t);
        assert_eq!(t, vec![vec![0.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_bounds_from_one_table_scale_another() {
        let (min, max) = column_bounds(&[vec![0.0, 5.0], vec![10.0, 5.0]]);
        assert_eq!((min.clone(), max.clone()), (vec![0.0, 5.0], vec![10.0, 5.0]));

        let mut t = vec![vec![5.0, 9.0], vec![20.0, 1.0]];
        scale_columns(&mut t, &min, &max);
        assert_eq!(t, vec![vec![0.5, 0.0], vec![2.0, 0.0]]);
    }

    #[test]
    fn test_empty_table() {
        let mut t: Vec<Vec<f32>> = Vec::new();
        normalize_columns(&mut t);
        assert!(t.is_empty());
    }
}
