#![allow(clippy::needless_range_loop)]
//! Matrix decompositions for covariance handling.
//!
//! LU with partial pivoting supplies determinants and inverses for the
//! multivariate normal density; Cholesky supplies the correlating factor
//! used when drawing random start values.

use crate::dense::DenseMatrix;
use thiserror::Error;

/// Relative pivot threshold below which a matrix is treated as singular.
pub const SINGULAR_PIVOT_TOL: f64 = 1e-12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinalgError {
    #[error("Matrix is not positive definite")]
    NotPositiveDefinite,

    #[error("Singular matrix encountered")]
    SingularMatrix,

    #[error("Matrix must be square, got {nrows}x{ncols}")]
    NotSquare { nrows: usize, ncols: usize },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

fn ensure_square(a: &DenseMatrix) -> Result<usize, LinalgError> {
    if !a.is_square() {
        return Err(LinalgError::NotSquare {
            nrows: a.nrows(),
            ncols: a.ncols(),
        });
    }
    Ok(a.nrows())
}

/// Result of an LU decomposition with partial pivoting: P * A = L * U.
///
/// L (unit lower) and U are packed into a single matrix.
#[derive(Debug, Clone)]
pub struct LuDecomp {
    lu: DenseMatrix,
    perm: Vec<usize>,
    sign: f64,
}

impl LuDecomp {
    /// Factorize a square matrix.
    ///
    /// Fails with `SingularMatrix` when a pivot falls below
    /// `SINGULAR_PIVOT_TOL` times the largest absolute entry of `a`.
    pub fn new(a: &DenseMatrix) -> Result<Self, LinalgError> {
        let n = ensure_square(a)?;
        let scale = a.max_abs();
        if !scale.is_finite() || scale == 0.0 {
            return Err(LinalgError::SingularMatrix);
        }
        let tol = SINGULAR_PIVOT_TOL * scale;

        let mut lu = a.clone();
        let mut perm: Vec<usize> = (0..n).collect();
        let mut sign = 1.0;

        for k in 0..n {
            let mut p = k;
            let mut max = lu.get(k, k).abs();
            for i in (k + 1)..n {
                let v = lu.get(i, k).abs();
                if v > max {
                    max = v;
                    p = i;
                }
            }
            if max <= tol {
                return Err(LinalgError::SingularMatrix);
            }
            if p != k {
                for j in 0..n {
                    let tmp = lu.get(k, j);
                    lu.set(k, j, lu.get(p, j));
                    lu.set(p, j, tmp);
                }
                perm.swap(k, p);
                sign = -sign;
            }

            let pivot = lu.get(k, k);
            for i in (k + 1)..n {
                let factor = lu.get(i, k) / pivot;
                lu.set(i, k, factor);
                for j in (k + 1)..n {
                    lu.set(i, j, lu.get(i, j) - factor * lu.get(k, j));
                }
            }
        }

        Ok(LuDecomp { lu, perm, sign })
    }

    pub fn dim(&self) -> usize {
        self.lu.nrows()
    }

    /// Determinant of the original matrix.
    pub fn determinant(&self) -> f64 {
        let mut det = self.sign;
        for i in 0..self.dim() {
            det *= self.lu.get(i, i);
        }
        det
    }

    /// Sign of det(A) (+1 or -1), exact even when the magnitude underflows.
    pub fn determinant_sign(&self) -> f64 {
        let mut sign = self.sign;
        for i in 0..self.dim() {
            if self.lu.get(i, i) < 0.0 {
                sign = -sign;
            }
        }
        sign
    }

    /// Natural log of |det(A)| accumulated pivot by pivot, so it stays
    /// finite where the determinant itself would underflow.
    pub fn ln_abs_determinant(&self) -> f64 {
        (0..self.dim()).map(|i| self.lu.get(i, i).abs().ln()).sum()
    }

    /// Solve A * x = b.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.dim();
        assert_eq!(b.len(), n);

        // Forward substitution with unit diagonal: L * y = P * b
        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut sum = b[self.perm[i]];
            for j in 0..i {
                sum -= self.lu.get(i, j) * y[j];
            }
            y[i] = sum;
        }

        // Backward substitution: U * x = y
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in (i + 1)..n {
                sum -= self.lu.get(i, j) * x[j];
            }
            x[i] = sum / self.lu.get(i, i);
        }
        x
    }

    /// Inverse of the original matrix, one solved unit column at a time.
    pub fn inverse(&self) -> DenseMatrix {
        let n = self.dim();
        let mut inv = DenseMatrix::zeros(n, n);
        for j in 0..n {
            let mut e = vec![0.0; n];
            e[j] = 1.0;
            inv.set_col(j, &self.solve(&e));
        }
        inv
    }
}

/// Result of a Cholesky decomposition.
#[derive(Debug, Clone)]
pub struct CholeskyDecomp {
    /// Lower triangular factor L such that A = L * L'.
    pub l: DenseMatrix,
}

impl CholeskyDecomp {
    /// Compute the Cholesky decomposition of a symmetric positive definite matrix.
    pub fn new(a: &DenseMatrix) -> Result<Self, LinalgError> {
        let n = ensure_square(a)?;
        let mut l = DenseMatrix::zeros(n, n);

        for j in 0..n {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l.get(j, k) * l.get(j, k);
            }
            let diag = a.get(j, j) - sum;
            if diag <= 0.0 || !diag.is_finite() {
                return Err(LinalgError::NotPositiveDefinite);
            }
            l.set(j, j, diag.sqrt());

            for i in (j + 1)..n {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += l.get(i, k) * l.get(j, k);
                }
                l.set(i, j, (a.get(i, j) - sum) / l.get(j, j));
            }
        }

        Ok(CholeskyDecomp { l })
    }

    /// L * z, mapping independent draws onto the covariance of A.
    pub fn correlate(&self, z: &[f64]) -> Result<Vec<f64>, LinalgError> {
        let n = self.l.nrows();
        if z.len() != n {
            return Err(LinalgError::DimensionMismatch {
                expected: n,
                got: z.len(),
            });
        }
        let mut out = vec![0.0; n];
        for i in 0..n {
            for k in 0..=i {
                out[i] += self.l.get(i, k) * z[k];
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lu_determinant() {
        let a = DenseMatrix::from_row_major(3, 3, &[4.0, 2.0, 1.0, 2.0, 5.0, 3.0, 1.0, 3.0, 6.0]);
        let lu = LuDecomp::new(&a).unwrap();
        // 4(30-9) - 2(12-3) + 1(6-5) = 84 - 18 + 1
        assert!((lu.determinant() - 67.0).abs() < 1e-10);
        assert!((lu.ln_abs_determinant() - 67.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_lu_pivoting_sign() {
        // Needs a row swap; det = -1.
        let a = DenseMatrix::from_row_major(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let lu = LuDecomp::new(&a).unwrap();
        assert!((lu.determinant() + 1.0).abs() < 1e-12);
        assert_eq!(lu.determinant_sign(), -1.0);
    }

    #[test]
    fn test_lu_solve_and_inverse() {
        let a = DenseMatrix::from_row_major(3, 3, &[2.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 4.0]);
        let b = vec![1.0, 2.0, 3.0];
        let lu = LuDecomp::new(&a).unwrap();
        let x = lu.solve(&b);
        let ax = a.mat_vec(&x);
        for i in 0..3 {
            assert!((ax[i] - b[i]).abs() < 1e-10, "ax[{}]={} != b[{}]={}", i, ax[i], i, b[i]);
        }

        let inv = lu.inverse();
        for j in 0..3 {
            let column = a.mat_vec(&inv.col(j));
            for i in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (column[i] - expected).abs() < 1e-10,
                    "A*A^{{-1}}[{},{}] = {}",
                    i,
                    j,
                    column[i]
                );
            }
        }
    }

    #[test]
    fn test_lu_collinear_is_singular() {
        // Second row is twice the first.
        let a = DenseMatrix::from_row_major(2, 2, &[1.5, 3.0, 3.0, 6.0]);
        assert_eq!(LuDecomp::new(&a).unwrap_err(), LinalgError::SingularMatrix);
    }

    #[test]
    fn test_lu_zero_and_nonsquare() {
        assert_eq!(
            LuDecomp::new(&DenseMatrix::zeros(2, 2)).unwrap_err(),
            LinalgError::SingularMatrix
        );
        assert!(matches!(
            LuDecomp::new(&DenseMatrix::zeros(2, 3)),
            Err(LinalgError::NotSquare { nrows: 2, ncols: 3 })
        ));
    }

    #[test]
    fn test_cholesky() {
        // A = [[4, 2], [2, 3]]
        let a = DenseMatrix::from_row_major(2, 2, &[4.0, 2.0, 2.0, 3.0]);
        let chol = CholeskyDecomp::new(&a).unwrap();
        // L should be [[2, 0], [1, sqrt(2)]]
        assert!((chol.l.get(0, 0) - 2.0).abs() < 1e-10);
        assert!((chol.l.get(1, 0) - 1.0).abs() < 1e-10);
        assert!((chol.l.get(1, 1) - 2.0f64.sqrt()).abs() < 1e-10);
        assert_eq!(chol.l.get(0, 1), 0.0);
    }

    #[test]
    fn test_cholesky_correlate() {
        let a = DenseMatrix::from_row_major(2, 2, &[4.0, 2.0, 2.0, 3.0]);
        let chol = CholeskyDecomp::new(&a).unwrap();
        let v = chol.correlate(&[1.0, 1.0]).unwrap();
        assert!((v[0] - 2.0).abs() < 1e-12);
        assert!((v[1] - (1.0 + 2.0f64.sqrt())).abs() < 1e-12);
        assert!(matches!(
            chol.correlate(&[1.0]),
            Err(LinalgError::DimensionMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_cholesky_not_pd() {
        let a = DenseMatrix::from_row_major(2, 2, &[1.0, 3.0, 3.0, 1.0]);
        assert_eq!(
            CholeskyDecomp::new(&a).unwrap_err(),
            LinalgError::NotPositiveDefinite
        );
    }

    #[test]
    fn test_lu_inverse_spd() {
        let a = DenseMatrix::from_row_major(2, 2, &[4.0, 2.0, 2.0, 3.0]);
        let inv = LuDecomp::new(&a).unwrap().inverse();
        // 1/8 * [[3, -2], [-2, 4]]
        assert!((inv.get(0, 0) - 0.375).abs() < 1e-12);
        assert!((inv.get(0, 1) + 0.25).abs() < 1e-12);
        assert!((inv.get(1, 1) - 0.5).abs() < 1e-12);
    }
}
