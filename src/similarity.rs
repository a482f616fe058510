//! Sparse matrix product that keeps only the best `ntop` entries per row.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use sprs::{CsMat, CsMatView};

use crate::error::{ChainError, Result};

#[derive(Debug, Copy, Clone, PartialEq)]
struct Scored {
    sim: f64,
    idx: usize,
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    /// Higher similarity wins; on equal similarity the lower column wins.
    fn cmp(&self, other: &Self) -> Ordering {
        self.sim
            .partial_cmp(&other.sim)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

/// Compute `A · B`, keeping per row at most `ntop` entries strictly greater
/// than `lower_bound`.
///
/// `a` is `M x K`, `b` is `K x N`; either may be stored row- or
/// column-major, both are coerced to CSR first. The result is an `M x N`
/// CSR matrix whose rows list their surviving entries in ascending column
/// order. A row of `a` without non-zeros produces an empty row.
///
/// # Errors
/// [`ChainError::InvalidParameter`] when `ntop` is zero and
/// [`ChainError::DimensionMismatch`] when the inner dimensions differ.
pub fn sparse_dot_topn(
    a: CsMatView<'_, f64>,
    b: CsMatView<'_, f64>,
    ntop: usize,
    lower_bound: f64,
) -> Result<CsMat<f64>> {
    if ntop == 0 {
        return Err(ChainError::invalid(
            "ntop",
            "must keep at least one entry per row",
        ));
    }
    let (m, inner) = a.shape();
    let (b_inner, n) = b.shape();
    if inner != b_inner {
        return Err(ChainError::DimensionMismatch(format!(
            "cannot multiply {m}x{inner} by {b_inner}x{n}"
        )));
    }

    let a_csr;
    let a = if a.is_csr() {
        a
    } else {
        a_csr = a.to_csr();
        a_csr.view()
    };
    let b_csr;
    let b = if b.is_csr() {
        b
    } else {
        b_csr = b.to_csr();
        b_csr.view()
    };

    let mut indptr = Vec::with_capacity(m + 1);
    let mut indices = Vec::with_capacity(m * ntop.min(n));
    let mut data = Vec::with_capacity(m * ntop.min(n));
    indptr.push(0);

    // Dense accumulator for one output row, reset after every row.
    let mut sums = vec![0.0_f64; n];
    let mut seen = vec![false; n];
    let mut touched: Vec<usize> = Vec::new();

    for a_row in a.outer_iterator() {
        for (k, &a_val) in a_row.iter() {
            let Some(b_row) = b.outer_view(k) else {
                continue;
            };
            for (j, &b_val) in b_row.iter() {
                if !seen[j] {
                    seen[j] = true;
                    touched.push(j);
                }
                sums[j] += a_val * b_val;
            }
        }

        touched.sort_unstable();
        let mut heap: BinaryHeap<Reverse<Scored>> = BinaryHeap::with_capacity(ntop + 1);
        for &j in &touched {
            let entry = Scored { sim: sums[j], idx: j };
            sums[j] = 0.0;
            seen[j] = false;
            if entry.sim <= lower_bound {
                continue;
            }
            if heap.len() < ntop {
                heap.push(Reverse(entry));
            } else if let Some(Reverse(min_entry)) = heap.peek() {
                if entry > *min_entry {
                    heap.pop();
                    heap.push(Reverse(entry));
                }
            }
        }
        touched.clear();

        let mut kept: Vec<Scored> = heap.into_iter().map(|Reverse(scored)| scored).collect();
        kept.sort_unstable_by_key(|scored| scored.idx);
        for scored in kept {
            indices.push(scored.idx);
            data.push(scored.sim);
        }
        indptr.push(indices.len());
    }

    Ok(CsMat::new((m, n), indptr, indices, data))
}

/// Cosine top-N of a row-normalized matrix against itself (`M · Mᵀ`).
///
/// # Errors
/// See [`sparse_dot_topn`].
pub fn cosine_top_n(matrix: &CsMat<f64>, ntop: usize, lower_bound: f64) -> Result<CsMat<f64>> {
    cosine_rows_top_n(matrix.view(), matrix, ntop, lower_bound)
}

/// Cosine top-N of `rows` against every row of `matrix`. Scores are capped
/// at 1.0.
///
/// # Errors
/// See [`sparse_dot_topn`].
pub fn cosine_rows_top_n(
    rows: CsMatView<'_, f64>,
    matrix: &CsMat<f64>,
    ntop: usize,
    lower_bound: f64,
) -> Result<CsMat<f64>> {
    let mut result = sparse_dot_topn(rows, matrix.transpose_view(), ntop, lower_bound)?;
    for score in result.data_mut() {
        *score = score.min(1.0);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sprs::TriMat;

    fn from_dense(rows: &[Vec<f64>]) -> CsMat<f64> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut tri = TriMat::new((rows.len(), cols));
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    tri.add_triplet(i, j, v);
                }
            }
        }
        tri.to_csr()
    }

    /// Dense reference: full product, full sort, same tie rule.
    fn dense_top_n(
        a: &[Vec<f64>],
        b: &[Vec<f64>],
        ntop: usize,
        lower_bound: f64,
    ) -> Vec<Vec<(usize, f64)>> {
        let n = b.first().map_or(0, Vec::len);
        a.iter()
            .map(|row| {
                let mut scores: Vec<(usize, f64)> = (0..n)
                    .map(|j| (j, row.iter().zip(b).map(|(x, b_row)| x * b_row[j]).sum()))
                    .filter(|&(_, s)| s > lower_bound)
                    .collect();
                scores.sort_by(|x, y| y.1.partial_cmp(&x.1).unwrap().then(x.0.cmp(&y.0)));
                scores.truncate(ntop);
                scores.sort_by_key(|&(j, _)| j);
                scores
            })
            .collect()
    }

    fn rows_of(matrix: &CsMat<f64>) -> Vec<Vec<(usize, f64)>> {
        matrix
            .outer_iterator()
            .map(|row| row.iter().map(|(j, &v)| (j, v)).collect())
            .collect()
    }

    fn transpose(dense: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let cols = dense.first().map_or(0, Vec::len);
        (0..cols).map(|j| dense.iter().map(|row| row[j]).collect()).collect()
    }

    #[test]
    fn keeps_top_entries_per_row() {
        let a = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]];
        let matrix = from_dense(&a);
        let result = cosine_top_n(&matrix, 2, 0.0).unwrap();
        assert_eq!(result.shape(), (3, 3));
        let rows = rows_of(&result);
        // row 0: self (1.0) and row 2 (0.6); row 1 is orthogonal
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[0][0].0, 0);
        assert!((rows[0][0].1 - 1.0).abs() < 1e-12);
        assert_eq!(rows[0][1].0, 2);
        assert!((rows[0][1].1 - 0.6).abs() < 1e-12);
        // row 2 keeps self and row 1 (0.8) over row 0 (0.6)
        let cols: Vec<usize> = rows[2].iter().map(|&(j, _)| j).collect();
        assert_eq!(cols, vec![1, 2]);
    }

    #[test]
    fn lower_bound_is_exclusive() {
        let matrix = from_dense(&[vec![1.0, 0.0], vec![0.6, 0.8]]);
        let result = cosine_top_n(&matrix, 5, 0.6).unwrap();
        let rows = rows_of(&result);
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[0][0].0, 0);
    }

    #[test]
    fn ties_prefer_lower_columns() {
        let matrix = from_dense(&[vec![1.0], vec![1.0], vec![1.0], vec![1.0]]);
        let result = cosine_top_n(&matrix, 2, 0.0).unwrap();
        for row in rows_of(&result) {
            let cols: Vec<usize> = row.iter().map(|&(j, _)| j).collect();
            assert_eq!(cols, vec![0, 1]);
        }
    }

    #[test]
    fn zero_rows_stay_empty() {
        let matrix = from_dense(&[vec![0.0, 0.0], vec![1.0, 0.0]]);
        let result = cosine_top_n(&matrix, 3, 0.0).unwrap();
        assert_eq!(result.outer_view(0).unwrap().nnz(), 0);
        assert_eq!(result.outer_view(1).unwrap().nnz(), 1);
    }

    #[test]
    fn layout_does_not_change_the_result() {
        let a = vec![vec![0.2, 0.0, 0.9], vec![0.0, 0.5, 0.1], vec![0.7, 0.7, 0.0]];
        let matrix = from_dense(&a);
        let transposed = matrix.transpose_view().to_owned();
        let from_csc = sparse_dot_topn(matrix.to_csc().view(), transposed.view(), 2, 0.0).unwrap();
        let from_csr = sparse_dot_topn(matrix.view(), transposed.to_csr().view(), 2, 0.0).unwrap();
        assert_eq!(rows_of(&from_csc), rows_of(&from_csr));
    }

    #[test]
    fn cosine_scores_never_exceed_one() {
        let v = 1.0 / 3.0_f64.sqrt();
        let row = vec![v, v, v];
        let matrix = from_dense(&[row.clone(), row.clone(), row]);
        let result = cosine_top_n(&matrix, 3, 0.0).unwrap();
        assert_eq!(result.nnz(), 9);
        for &score in result.data() {
            assert!(score <= 1.0);
            assert!((score - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn row_subset_matches_full_product() {
        let a = vec![vec![0.2, 0.0, 0.9], vec![0.0, 0.5, 0.1], vec![0.7, 0.7, 0.0]];
        let matrix = from_dense(&a);
        let full = rows_of(&cosine_top_n(&matrix, 2, 0.0).unwrap());
        let last = rows_of(&cosine_rows_top_n(matrix.slice_outer(2..3), &matrix, 2, 0.0).unwrap());
        assert_eq!(last.len(), 1);
        assert_eq!(last[0], full[2]);
    }

    #[test]
    fn rejects_bad_arguments() {
        let matrix = from_dense(&[vec![1.0, 0.0]]);
        assert!(matches!(
            cosine_top_n(&matrix, 0, 0.0),
            Err(ChainError::InvalidParameter { name: "ntop", .. })
        ));
        assert!(matches!(
            sparse_dot_topn(matrix.view(), matrix.view(), 1, 0.0),
            Err(ChainError::DimensionMismatch(_))
        ));
    }

    fn dense_matrix(rows: usize, cols: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
        prop::collection::vec(
            prop::collection::vec(prop_oneof![3 => Just(0.0), 2 => 0.05f64..1.0], cols),
            rows,
        )
    }

    proptest! {
        #[test]
        fn matches_dense_reference(
            a in dense_matrix(6, 5),
            ntop in 1usize..5,
            lower_bound in 0.0f64..0.5,
        ) {
            let b = transpose(&a);
            let (a_sparse, b_sparse) = (from_dense(&a), from_dense(&b));
            let result =
                sparse_dot_topn(a_sparse.view(), b_sparse.view(), ntop, lower_bound).unwrap();
            let expected = dense_top_n(&a, &b, ntop, lower_bound);
            let actual = rows_of(&result);
            prop_assert_eq!(actual.len(), expected.len());
            for (got, want) in actual.iter().zip(&expected) {
                prop_assert!(got.len() <= ntop);
                let got_cols: Vec<usize> = got.iter().map(|&(j, _)| j).collect();
                let want_cols: Vec<usize> = want.iter().map(|&(j, _)| j).collect();
                prop_assert_eq!(got_cols, want_cols);
                for (&(_, g), &(_, w)) in got.iter().zip(want) {
                    prop_assert!((g - w).abs() < 1e-9);
                    prop_assert!(g > lower_bound);
                }
            }
        }
    }
}
