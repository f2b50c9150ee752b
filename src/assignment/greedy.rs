//! Greedy maximum-score assignment

use nalgebra::DMatrix;

use super::hungarian::Assignment;

/// Assigns pairs in order of decreasing score.
///
/// Ties go to the lower row, then the lower column. Cells scoring below
/// `min_score` are never assigned. The returned cost is the total score of
/// the assigned pairs.
pub fn greedy(score: &DMatrix<f64>, min_score: f64) -> Assignment {
    let mut candidates: Vec<(usize, usize, f64)> = Vec::new();
    for i in 0..score.nrows() {
        for j in 0..score.ncols() {
            let s = score[(i, j)];
            if s.is_finite() && s >= min_score {
                candidates.push((i, j, s));
            }
        }
    }
    candidates.sort_by(|a, b| {
        b.2.total_cmp(&a.2)
            .then_with(|| a.0.cmp(&b.0))
            .then_with(|| a.1.cmp(&b.1))
    });

    let mut mapping = vec![None; score.nrows()];
    let mut col_taken = vec![false; score.ncols()];
    let mut total = 0.0;
    for (i, j, s) in candidates {
        if mapping[i].is_some() || col_taken[j] {
            continue;
        }
        mapping[i] = Some(j);
        col_taken[j] = true;
        total += s;
    }

    Assignment::new(mapping, total)
}
