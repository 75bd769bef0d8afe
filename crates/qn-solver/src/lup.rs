//! Dense LUP decomposition over exact rationals.
//!
//! Partial pivoting compares exact magnitudes, so there is no epsilon
//! tolerance anywhere: a pivot column is either identically zero (singular)
//! or usable.

use num_traits::{Signed, Zero};
use qn_core::Rational;

use crate::error::{SolverError, SolverResult};

/// Dense square matrix of exact rationals, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquareMatrix {
    dim: usize,
    data: Vec<Rational>,
}

impl SquareMatrix {
    /// Zero matrix of the given dimension.
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            data: vec![Rational::zero(); dim * dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn at(&self, row: usize, col: usize) -> &Rational {
        &self.data[row * self.dim + col]
    }

    pub fn at_mut(&mut self, row: usize, col: usize) -> &mut Rational {
        &mut self.data[row * self.dim + col]
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for col in 0..self.dim {
            self.data.swap(a * self.dim + col, b * self.dim + col);
        }
    }
}

/// A pivot column with no non-zero entry: the matrix is singular.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingularColumn {
    pub column: usize,
}

/// Permuted LU factorization of a [`SquareMatrix`].
///
/// Valid for the lifetime of one diagonal block: decomposed once, then
/// re-solved against many right-hand sides.
#[derive(Debug, Clone)]
pub struct LupDecomposition {
    dim: usize,
    /// L (strict lower, unit diagonal implied) and U packed together.
    lu: SquareMatrix,
    /// Row permutation: `perm[i]` is the source row of factored row `i`.
    perm: Vec<usize>,
}

impl LupDecomposition {
    /// Factor the matrix in place, consuming it.
    pub fn decompose(mut matrix: SquareMatrix) -> Result<Self, SingularColumn> {
        let n = matrix.dim();
        let mut perm: Vec<usize> = (0..n).collect();

        for k in 0..n {
            // Exact-magnitude partial pivoting
            let mut pivot_row = k;
            let mut pivot_mag = matrix.at(k, k).abs();
            for i in (k + 1)..n {
                let mag = matrix.at(i, k).abs();
                if mag > pivot_mag {
                    pivot_mag = mag;
                    pivot_row = i;
                }
            }
            if pivot_mag.is_zero() {
                return Err(SingularColumn { column: k });
            }
            matrix.swap_rows(k, pivot_row);
            perm.swap(k, pivot_row);

            for i in (k + 1)..n {
                if matrix.at(i, k).is_zero() {
                    continue;
                }
                let factor = matrix.at(i, k) / matrix.at(k, k);
                for j in (k + 1)..n {
                    let delta = &factor * matrix.at(k, j);
                    *matrix.at_mut(i, j) -= delta;
                }
                *matrix.at_mut(i, k) = factor;
            }
        }

        Ok(Self {
            dim: n,
            lu: matrix,
            perm,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Permuted forward substitution followed by back substitution.
    pub fn solve(&self, rhs: &[Rational]) -> SolverResult<Vec<Rational>> {
        if rhs.len() != self.dim {
            return Err(SolverError::Internal {
                what: format!(
                    "right-hand side length {} does not match decomposition dimension {}",
                    rhs.len(),
                    self.dim
                ),
            });
        }
        let n = self.dim;

        // Ly = Pb
        let mut y: Vec<Rational> = Vec::with_capacity(n);
        for i in 0..n {
            let mut acc = rhs[self.perm[i]].clone();
            for (j, yj) in y.iter().enumerate() {
                acc -= self.lu.at(i, j) * yj;
            }
            y.push(acc);
        }

        // Ux = y
        let mut x = vec![Rational::zero(); n];
        for i in (0..n).rev() {
            let mut acc = y[i].clone();
            for j in (i + 1)..n {
                acc -= self.lu.at(i, j) * &x[j];
            }
            x[i] = acc / self.lu.at(i, i);
        }
        Ok(x)
    }
}
