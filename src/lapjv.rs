use ndarray::{Array2, ArrayView2};

use crate::error::Error;

/// Minimum-cost assignment over a rectangular cost matrix, Jonker-Volgenant
/// style: dual potentials with Dijkstra shortest augmenting paths.
///
/// Rectangular inputs are padded to a square with a cost larger than any
/// real entry; a row that ends up on a padding column is reported as
/// unassigned.
pub fn solve(cost: ArrayView2<'_, f32>) -> Result<Vec<Option<usize>>, Error> {
    let (rows, cols) = cost.dim();
    if rows == 0 {
        return Ok(Vec::new());
    }
    if cols == 0 {
        return Ok(vec![None; rows]);
    }

    let mut max_cost = 0f32;
    for &v in cost.iter() {
        if !v.is_finite() {
            return Err(Error::Unsolvable(format!(
                "cost matrix contains a non-finite entry {v}"
            )));
        }
        if v > max_cost {
            max_cost = v;
        }
    }

    let n = rows.max(cols);
    let big = max_cost * 10.0 + 1.0;
    let mut square = Array2::from_elem((n, n), big);
    square.slice_mut(ndarray::s![..rows, ..cols]).assign(&cost);

    // 1-based bookkeeping: index 0 is the virtual unmatched column.
    let inf = f32::INFINITY;
    let mut u = vec![0f32; n + 1];
    let mut v = vec![0f32; n + 1];
    let mut matched_row = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for row in 1..=n {
        matched_row[0] = row;
        let mut j0 = 0usize;
        let mut min_slack = vec![inf; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = matched_row[j0];
            let mut delta = inf;
            let mut j1 = 0usize;

            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let slack = square[(i0 - 1, j - 1)] - u[i0] - v[j];
                if slack < min_slack[j] {
                    min_slack[j] = slack;
                    way[j] = j0;
                }
                if min_slack[j] < delta {
                    delta = min_slack[j];
                    j1 = j;
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[matched_row[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_slack[j] -= delta;
                }
            }

            j0 = j1;
            if matched_row[j0] == 0 {
                break;
            }
        }

        // Walk the augmenting path back, flipping matches.
        while j0 != 0 {
            let j1 = way[j0];
            matched_row[j0] = matched_row[j1];
            j0 = j1;
        }
    }

    let mut assignment = vec![None; rows];
    for j in 1..=n {
        let row = matched_row[j];
        if row >= 1 && row <= rows && j <= cols {
            assignment[row - 1] = Some(j - 1);
        }
    }

    Ok(assignment)
}
