// ============================================================
// Layer 5 — Evaluation Metrics
// ============================================================
// ROC AUC via the Mann-Whitney U statistic:
//
//   AUC = (R+ - P(P+1)/2) / (P * N)
//
// where R+ is the rank sum of the positive examples, P and N the
// positive and negative counts. Tied scores share the average of
// their ranks, which counts a tied pair as half correct.

/// Area under the ROC curve, or None when either class is absent.
///
/// Only the first `scores.len()` labels are used, so predictions
/// from an epoch that dropped its trailing partial batch still
/// line up with their labels.
pub fn auc(labels: &[bool], scores: &[f32]) -> Option<f64> {
    let n = scores.len().min(labels.len());
    let labels = &labels[..n];
    let scores = &scores[..n];

    let positives = labels.iter().filter(|&&l| l).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0f64; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; positions i..=j share their mean
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = rank;
        }
        i = j + 1;
    }

    let rank_sum: f64 = (0..n).filter(|&k| labels[k]).map(|k| ranks[k]).sum();
    let p = positives as f64;
    let u = rank_sum - p * (p + 1.0) / 2.0;
    Some(u / (p * negatives as f64))
}

/// Fraction of predictions on the right side of 0.5.
pub fn accuracy(labels: &[bool], scores: &[f32]) -> Option<f64> {
    let n = scores.len().min(labels.len());
    if n == 0 {
        return None;
    }
    let hits = labels
        .iter()
        .zip(scores)
        .filter(|&(&l, &s)| l == (s >= 0.5))
        .count();
    Some(hits as f64 / n as f64)
}
