// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Sparse linear algebra for the adjoint solve.
//!
//! Contributions are accumulated as `(row, col, value)` triplets in an
//! append-only list and assembled into a compressed column matrix once.
//! Duplicate coordinates are summed during assembly, which is required
//! when several axes contribute to the same diagonal entry.

use std::panic::{self, AssertUnwindSafe};

use faer::solvers::SpSolver;
use faer::sparse::SparseColMat;

use crate::error::{EikonalError, Result};

/// Append-only accumulator of sparse matrix contributions.
#[derive(Debug, Clone, Default)]
pub struct TripletBuilder {
    dim: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl TripletBuilder {
    /// Create an empty accumulator for a `dim x dim` matrix.
    pub fn new(dim: usize) -> Self {
        TripletBuilder {
            dim,
            entries: Vec::new(),
        }
    }

    /// Create an empty accumulator with room for `capacity` triplets.
    pub fn with_capacity(dim: usize, capacity: usize) -> Self {
        TripletBuilder {
            dim,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of accumulated triplets (duplicates counted separately).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no triplet has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The accumulated triplets in insertion order.
    pub fn entries(&self) -> &[(usize, usize, f64)] {
        &self.entries
    }

    /// Append a contribution.
    #[inline]
    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.dim && col < self.dim);
        self.entries.push((row, col, value));
    }

    /// Drop every contribution for which `zeroed(row, col)` holds.
    pub fn zero_where<F>(&mut self, mut zeroed: F)
    where
        F: FnMut(usize, usize) -> bool,
    {
        self.entries.retain(|&(row, col, _)| !zeroed(row, col));
    }

    /// Transpose every contribution.
    pub fn transpose(mut self) -> Self {
        for entry in &mut self.entries {
            *entry = (entry.1, entry.0, entry.2);
        }
        self
    }

    /// Sum duplicate coordinates. The result is sorted column-major and
    /// duplicates are added in insertion order.
    pub fn summed(&self) -> Vec<(usize, usize, f64)> {
        let mut sorted = self.entries.clone();
        sorted.sort_by_key(|&(row, col, _)| (col, row));
        let mut merged: Vec<(usize, usize, f64)> = Vec::with_capacity(sorted.len());
        for (row, col, value) in sorted {
            match merged.last_mut() {
                Some(last) if last.0 == row && last.1 == col => last.2 += value,
                _ => merged.push((row, col, value)),
            }
        }
        merged
    }

    /// Assemble the accumulated contributions into a sparse matrix.
    ///
    /// # Errors
    /// Returns an error if the sparse structure cannot be created.
    pub fn assemble(&self) -> Result<SparseMatrix> {
        let merged = self.summed();
        let nnz = merged.len();
        let inner = SparseColMat::<usize, f64>::try_new_from_triplets(self.dim, self.dim, &merged)
            .map_err(|e| EikonalError::Factorization(format!("sparse assembly failed: {:?}", e)))?;
        Ok(SparseMatrix {
            dim: self.dim,
            nnz,
            inner,
        })
    }
}

/// A square sparse matrix in compressed column storage.
pub struct SparseMatrix {
    dim: usize,
    nnz: usize,
    inner: SparseColMat<usize, f64>,
}

impl std::fmt::Debug for SparseMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseMatrix")
            .field("dim", &self.dim)
            .field("nnz", &self.nnz)
            .finish()
    }
}

impl SparseMatrix {
    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    /// Factor the matrix with sparse LU and solve `A x = rhs`.
    ///
    /// The factorization is not cached; every call factors from scratch.
    ///
    /// # Errors
    /// Returns [`EikonalError::Factorization`] if the matrix is structurally
    /// singular or a zero pivot is met during factorization, and
    /// [`EikonalError::SingularLinearization`] if the solution contains a
    /// non-finite value.
    pub fn lu_solve(&self, rhs: &[f64]) -> Result<Vec<f64>> {
        if rhs.len() != self.dim {
            return Err(EikonalError::ShapeMismatch {
                name: "rhs",
                expected: vec![self.dim],
                got: vec![rhs.len()],
            });
        }
        if self.dim == 0 {
            return Ok(Vec::new());
        }

        // faer panics on an exact zero pivot instead of returning an error
        let solved = panic::catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .as_ref()
                .sp_lu()
                .map(|lu| lu.solve(faer::col::from_slice::<f64>(rhs)))
        }));
        let x = match solved {
            Ok(Ok(x)) => x,
            Ok(Err(e)) => return Err(EikonalError::Factorization(format!("{:?}", e))),
            Err(_) => {
                return Err(EikonalError::Factorization(
                    "zero pivot during numeric factorization".to_string(),
                ))
            }
        };

        let solution: Vec<f64> = (0..self.dim).map(|i| x.read(i)).collect();
        if let Some(index) = solution.iter().position(|v| !v.is_finite()) {
            return Err(EikonalError::SingularLinearization { index });
        }
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn duplicates_are_summed() {
        let mut b = TripletBuilder::new(2);
        b.push(0, 0, 1.5);
        b.push(1, 0, -1.0);
        b.push(0, 0, 2.5);
        b.push(1, 1, 3.0);
        assert_eq!(b.len(), 4);
        assert_eq!(
            b.summed(),
            vec![(0, 0, 4.0), (1, 0, -1.0), (1, 1, 3.0)]
        );
        assert_eq!(b.assemble().unwrap().nnz(), 3);
    }

    #[test]
    fn transpose_swaps_coordinates() {
        let mut b = TripletBuilder::new(3);
        b.push(0, 2, 7.0);
        let t = b.transpose();
        assert_eq!(t.entries(), &[(2, 0, 7.0)]);
    }

    #[test]
    fn zero_where_drops_matching_rows_and_columns() {
        let mut b = TripletBuilder::new(3);
        b.push(0, 0, 1.0);
        b.push(1, 0, -1.0);
        b.push(1, 1, 1.0);
        b.push(2, 1, -1.0);
        b.zero_where(|row, col| row == 0 || col == 0);
        assert_eq!(b.entries(), &[(1, 1, 1.0), (2, 1, -1.0)]);
    }

    #[test]
    fn lu_solves_nonsymmetric_system() {
        // [ 2 -1  0 ] [x0]   [1]
        // [ 0  3  1 ] [x1] = [5]
        // [ 1  0  4 ] [x2]   [9]
        let mut b = TripletBuilder::new(3);
        for &(r, c, v) in &[
            (0, 0, 2.0),
            (0, 1, -1.0),
            (1, 1, 3.0),
            (1, 2, 1.0),
            (2, 0, 1.0),
            (2, 2, 4.0),
        ] {
            b.push(r, c, v);
        }
        let x = b.assemble().unwrap().lu_solve(&[1.0, 5.0, 9.0]).unwrap();
        // verify A x = rhs
        assert_abs_diff_eq!(2.0 * x[0] - x[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(3.0 * x[1] + x[2], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[0] + 4.0 * x[2], 9.0, epsilon = 1e-12);
    }

    #[test]
    fn split_diagonal_contributions_solve_like_merged() {
        let mut b = TripletBuilder::new(2);
        b.push(0, 0, 1.0);
        b.push(0, 0, 1.0);
        b.push(1, 1, 4.0);
        let x = b.assemble().unwrap().lu_solve(&[4.0, 2.0]).unwrap();
        assert_abs_diff_eq!(x[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn structurally_singular_matrix_is_an_error() {
        // column 1 has no entries
        let mut b = TripletBuilder::new(3);
        b.push(0, 0, 1.0);
        b.push(1, 0, 1.0);
        b.push(2, 2, 1.0);
        let result = b.assemble().unwrap().lu_solve(&[1.0, 1.0, 1.0]);
        assert!(matches!(result, Err(EikonalError::Factorization(_))));
    }

    #[test]
    fn zero_pivot_is_an_error() {
        // [[1, 1], [1, 1]] eliminates to an exact zero pivot
        let mut b = TripletBuilder::new(2);
        for &(r, c) in &[(0, 0), (0, 1), (1, 0), (1, 1)] {
            b.push(r, c, 1.0);
        }
        let result = b.assemble().unwrap().lu_solve(&[1.0, 2.0]);
        assert!(matches!(result, Err(EikonalError::Factorization(_))));
    }

    #[test]
    fn non_finite_solution_is_reported() {
        let mut b = TripletBuilder::new(3);
        for i in 0..3 {
            b.push(i, i, 2.0);
        }
        let result = b.assemble().unwrap().lu_solve(&[1.0, f64::NAN, 1.0]);
        assert!(matches!(
            result,
            Err(EikonalError::SingularLinearization { index: 1 })
        ));
    }

    #[test]
    fn rhs_length_checked() {
        let mut b = TripletBuilder::new(2);
        b.push(0, 0, 1.0);
        b.push(1, 1, 1.0);
        let result = b.assemble().unwrap().lu_solve(&[1.0]);
        assert!(matches!(result, Err(EikonalError::ShapeMismatch { .. })));
    }
}
