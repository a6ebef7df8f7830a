//! A single multivariate normal mixture component.
//!
//! The LU factorization of the covariance is computed once whenever a
//! covariance is installed, so density evaluation in the E-step only costs
//! a quadratic form. A covariance that cannot be factorized is kept as-is
//! and every density call reports the factorization error.

use std::f64::consts::PI;

use psymix_linalg::{CholeskyDecomp, DenseMatrix, LinalgError, LuDecomp};
use rand::Rng;
use rand_distr::StandardNormal;

/// Inverse covariance and log-determinant.
#[derive(Debug, Clone)]
struct Precision {
    inverse: DenseMatrix,
    ln_det: f64,
}

impl Precision {
    fn from_covariance(covariance: &DenseMatrix) -> Result<Self, LinalgError> {
        let lu = LuDecomp::new(covariance)?;
        if lu.determinant_sign() <= 0.0 {
            return Err(LinalgError::NotPositiveDefinite);
        }
        Ok(Self {
            inverse: lu.inverse(),
            ln_det: lu.ln_abs_determinant(),
        })
    }
}

/// Mean, covariance and mixing proportion of one mixture component.
#[derive(Debug, Clone)]
pub struct ComponentDistribution {
    mean: Vec<f64>,
    covariance: DenseMatrix,
    mixing_proportion: f64,
    precision: Result<Precision, LinalgError>,
}

impl ComponentDistribution {
    pub fn new(mean: Vec<f64>, covariance: DenseMatrix, mixing_proportion: f64) -> Self {
        assert_eq!(covariance.nrows(), mean.len());
        assert_eq!(covariance.ncols(), mean.len());
        let precision = Precision::from_covariance(&covariance);
        Self {
            mean,
            covariance,
            mixing_proportion,
            precision,
        }
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn covariance(&self) -> &DenseMatrix {
        &self.covariance
    }

    pub fn mixing_proportion(&self) -> f64 {
        self.mixing_proportion
    }

    pub fn set_mean(&mut self, mean: Vec<f64>) {
        assert_eq!(mean.len(), self.dim());
        self.mean = mean;
    }

    /// Replace the covariance and refresh the cached factorization.
    pub fn set_covariance(&mut self, covariance: DenseMatrix) {
        assert_eq!(covariance.nrows(), self.dim());
        assert_eq!(covariance.ncols(), self.dim());
        self.precision = Precision::from_covariance(&covariance);
        self.covariance = covariance;
    }

    pub fn set_mixing_proportion(&mut self, mixing_proportion: f64) {
        self.mixing_proportion = mixing_proportion;
    }

    /// The error from factorizing the current covariance, if any.
    pub fn factorization_error(&self) -> Option<&LinalgError> {
        self.precision.as_ref().err()
    }

    pub fn is_singular(&self) -> bool {
        self.precision.is_err()
    }

    /// Multivariate normal density at `x`:
    /// (2pi)^(-D/2) |S|^(-1/2) exp(-(x-m)' S^-1 (x-m) / 2).
    pub fn density(&self, x: &[f64]) -> Result<f64, LinalgError> {
        if x.len() != self.dim() {
            return Err(LinalgError::DimensionMismatch {
                expected: self.dim(),
                got: x.len(),
            });
        }
        let precision = self.precision.as_ref().map_err(Clone::clone)?;
        let diff: Vec<f64> = x.iter().zip(self.mean.iter()).map(|(xi, mi)| xi - mi).collect();
        let q = precision.inverse.quadratic_form(&diff);
        let d = self.dim() as f64;
        Ok((-0.5 * (d * (2.0 * PI).ln() + precision.ln_det + q)).exp())
    }

    /// Replace the mean with a correlated draw around `global_mean`:
    /// m = global_mean + jitter * L * z, with L the Cholesky factor of
    /// `global_cov` and z standard normal. Covariance and mixing
    /// proportion are left alone.
    pub fn generate_start_values<R: Rng + ?Sized>(
        &mut self,
        global_mean: &[f64],
        global_cov: &DenseMatrix,
        jitter: f64,
        rng: &mut R,
    ) -> Result<(), LinalgError> {
        if global_mean.len() != self.dim() {
            return Err(LinalgError::DimensionMismatch {
                expected: self.dim(),
                got: global_mean.len(),
            });
        }
        let chol = CholeskyDecomp::new(global_cov)?;
        let z: Vec<f64> = (0..self.dim()).map(|_| rng.sample(StandardNormal)).collect();
        let offset = chol.correlate(&z)?;
        self.mean = global_mean
            .iter()
            .zip(offset.iter())
            .map(|(m, o)| m + jitter * o)
            .collect();
        Ok(())
    }
}
