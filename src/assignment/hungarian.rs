//! Hungarian algorithm for optimal assignment
//!
//! Kuhn-Munkres with row/column potentials, O(n³) on the padded square
//! matrix. Rectangular problems are padded with zero-cost cells; every
//! complete assignment uses the same number of them, so the padding never
//! changes which real pairs are chosen.

use nalgebra::DMatrix;

use crate::TrackerError;

/// Result of an assignment problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Row `i` is assigned to column `mapping[i]`, `None` if unassigned
    pub mapping: Vec<Option<usize>>,
    /// Total cost of the assigned pairs
    pub cost: f64,
}

impl Assignment {
    pub fn new(mapping: Vec<Option<usize>>, cost: f64) -> Self {
        Self { mapping, cost }
    }

    pub fn num_assigned(&self) -> usize {
        self.mapping.iter().filter(|x| x.is_some()).count()
    }

    /// Iterator over assigned `(row, col)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.mapping
            .iter()
            .enumerate()
            .filter_map(|(row, col)| col.map(|c| (row, c)))
    }
}

/// Minimum-cost assignment of rows to columns.
///
/// # Errors
/// [`TrackerError::AssignmentFailed`] if any cost is not finite.
pub fn hungarian(cost: &DMatrix<f64>) -> Result<Assignment, TrackerError> {
    let n_rows = cost.nrows();
    let n_cols = cost.ncols();

    if n_rows == 0 || n_cols == 0 {
        return Ok(Assignment::new(vec![None; n_rows], 0.0));
    }
    if cost.iter().any(|c| !c.is_finite()) {
        return Err(TrackerError::AssignmentFailed);
    }

    let n = n_rows.max(n_cols);
    let mut matrix = DMatrix::<f64>::zeros(n, n);
    matrix.view_mut((0, 0), (n_rows, n_cols)).copy_from(cost);

    // dual variables
    let mut u = vec![0.0_f64; n];
    let mut v = vec![0.0_f64; n];

    let mut col_assignment: Vec<Option<usize>> = vec![None; n];

    for i in 0..n {
        let mut min_to = vec![f64::INFINITY; n];
        // previous column on the augmenting path, None = path start
        let mut way = vec![None::<usize>; n];
        let mut used = vec![false; n];

        let mut cur_row = i;
        let mut cur_col: Option<usize> = None;

        loop {
            let mut min_val = f64::INFINITY;
            let mut min_col = 0;

            for j in 0..n {
                if used[j] {
                    continue;
                }

                let reduced_cost = matrix[(cur_row, j)] - u[cur_row] - v[j];
                if reduced_cost < min_to[j] {
                    min_to[j] = reduced_cost;
                    way[j] = cur_col;
                }
                if min_to[j] < min_val {
                    min_val = min_to[j];
                    min_col = j;
                }
            }

            for j in 0..n {
                if used[j] {
                    if let Some(row) = col_assignment[j] {
                        u[row] += min_val;
                    }
                    v[j] -= min_val;
                } else {
                    min_to[j] -= min_val;
                }
            }
            u[i] += min_val;

            used[min_col] = true;
            cur_col = Some(min_col);

            match col_assignment[min_col] {
                Some(row) => cur_row = row,
                None => break,
            }
        }

        // augment along the path
        while let Some(col) = cur_col {
            let prev_col = way[col];
            col_assignment[col] = match prev_col {
                Some(pc) => col_assignment[pc],
                None => Some(i),
            };
            cur_col = prev_col;
        }
    }

    let mut mapping = vec![None; n_rows];
    let mut total_cost = 0.0;
    for (j, row) in col_assignment.iter().enumerate() {
        if let Some(i) = *row {
            if i < n_rows && j < n_cols {
                mapping[i] = Some(j);
                total_cost += cost[(i, j)];
            }
        }
    }

    Ok(Assignment::new(mapping, total_cost))
}
