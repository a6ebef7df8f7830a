//! Immutable parameter snapshots and the E-step computations over them.
//!
//! The E-step only ever reads a `MixtureParameters`; the M-step builds a
//! fresh one. Per-observation work is split into fixed-size chunks on the
//! rayon pool and the partial results are combined in chunk order, so the
//! floating-point result does not depend on scheduling.

use psymix_linalg::DenseMatrix;
use rayon::prelude::*;

use super::component::ComponentDistribution;
use crate::util::math::{nan_to_zero, x_ln_x};

/// Observations per rayon work item.
const CHUNK_SIZE: usize = 256;

/// A complete set of component parameters.
#[derive(Debug, Clone)]
pub struct MixtureParameters {
    components: Vec<ComponentDistribution>,
}

/// Responsibility-weighted sums for one M-step.
///
/// t1[g] = sum_i r_gi, t2[g] = sum_i r_gi x_i, t3[g] = sum_i r_gi x_i x_i'.
#[derive(Debug, Clone)]
pub struct SufficientStats {
    pub t1: Vec<f64>,
    pub t2: Vec<Vec<f64>>,
    pub t3: Vec<DenseMatrix>,
}

impl SufficientStats {
    pub fn zeros(groups: usize, dim: usize) -> Self {
        Self {
            t1: vec![0.0; groups],
            t2: vec![vec![0.0; dim]; groups],
            t3: (0..groups).map(|_| DenseMatrix::zeros(dim, dim)).collect(),
        }
    }

    /// Add one observation. NaN responsibilities contribute nothing.
    fn add_observation(&mut self, x: &[f64], responsibilities: &[f64]) {
        for (g, &r) in responsibilities.iter().enumerate() {
            let r = nan_to_zero(r);
            if r == 0.0 {
                continue;
            }
            self.t1[g] += r;
            for (acc, &xi) in self.t2[g].iter_mut().zip(x.iter()) {
                *acc += r * xi;
            }
            self.t3[g].add_weighted_outer(x, r);
        }
    }

    fn merge(&mut self, other: &SufficientStats) {
        for g in 0..self.t1.len() {
            self.t1[g] += other.t1[g];
            for (a, b) in self.t2[g].iter_mut().zip(other.t2[g].iter()) {
                *a += b;
            }
            self.t3[g].add_scaled(&other.t3[g], 1.0);
        }
    }
}

impl MixtureParameters {
    pub fn new(components: Vec<ComponentDistribution>) -> Self {
        assert!(!components.is_empty());
        let dim = components[0].dim();
        assert!(components.iter().all(|c| c.dim() == dim));
        Self { components }
    }

    pub fn groups(&self) -> usize {
        self.components.len()
    }

    pub fn dim(&self) -> usize {
        self.components[0].dim()
    }

    pub fn components(&self) -> &[ComponentDistribution] {
        &self.components
    }

    pub fn component(&self, g: usize) -> &ComponentDistribution {
        &self.components[g]
    }

    pub fn proportions(&self) -> Vec<f64> {
        self.components.iter().map(|c| c.mixing_proportion()).collect()
    }

    /// Copy of these parameters with new mixing proportions.
    pub fn with_proportions(&self, proportions: &[f64]) -> Self {
        assert_eq!(proportions.len(), self.groups());
        let mut components = self.components.clone();
        for (c, &p) in components.iter_mut().zip(proportions.iter()) {
            c.set_mixing_proportion(p);
        }
        Self { components }
    }

    /// First group whose covariance cannot be factorized.
    pub fn singular_group(&self) -> Option<usize> {
        self.components.iter().position(|c| c.is_singular())
    }

    /// pi_g * f_g(x) for every group; a failed density counts as 0.
    pub fn weighted_densities(&self, x: &[f64]) -> Vec<f64> {
        self.components
            .iter()
            .map(|c| match c.density(x) {
                Ok(d) => c.mixing_proportion() * d,
                Err(_) => 0.0,
            })
            .collect()
    }

    /// Posterior membership probabilities for one observation.
    ///
    /// Every entry is NaN when the mixture density at `x` is zero or not
    /// finite.
    pub fn posterior_row(&self, x: &[f64]) -> Vec<f64> {
        let weighted = self.weighted_densities(x);
        let total: f64 = weighted.iter().sum();
        if total == 0.0 || !total.is_finite() {
            return vec![f64::NAN; weighted.len()];
        }
        weighted.into_iter().map(|w| w / total).collect()
    }

    /// Modal group of the posterior, `None` for an undefined posterior.
    pub fn classify_row(&self, x: &[f64]) -> Option<usize> {
        let posterior = self.posterior_row(x);
        if posterior.iter().any(|p| p.is_nan()) {
            return None;
        }
        posterior
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(g, _)| g)
    }

    /// r_gi for a single group and observation.
    pub fn posterior_probability(&self, g: usize, x: &[f64]) -> f64 {
        let weighted = self.weighted_densities(x);
        let total: f64 = weighted.iter().sum();
        weighted[g] / total
    }

    /// N x K posterior matrix, one row per observation.
    pub fn posterior_matrix(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.par_iter().map(|x| self.posterior_row(x)).collect()
    }

    /// sum_i ln(sum_g pi_g f_g(x_i)).
    pub fn loglikelihood(&self, rows: &[Vec<f64>]) -> f64 {
        let partials: Vec<f64> = rows
            .par_chunks(CHUNK_SIZE)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|x| self.weighted_densities(x).iter().sum::<f64>().ln())
                    .sum::<f64>()
            })
            .collect();
        partials.iter().sum()
    }

    /// Classification entropy -sum_g sum_i r_gi ln(r_gi); undefined rows
    /// are skipped.
    pub fn entropy(&self, rows: &[Vec<f64>]) -> f64 {
        let partials: Vec<f64> = rows
            .par_chunks(CHUNK_SIZE)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|x| {
                        self.posterior_row(x)
                            .into_iter()
                            .filter(|r| !r.is_nan())
                            .map(x_ln_x)
                            .sum::<f64>()
                    })
                    .sum::<f64>()
            })
            .collect();
        -partials.iter().sum::<f64>()
    }

    /// Total responsibility mass per group, NaN rows contributing 0.
    pub fn responsibility_totals(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        let k = self.groups();
        let partials: Vec<Vec<f64>> = rows
            .par_chunks(CHUNK_SIZE)
            .map(|chunk| {
                let mut t1 = vec![0.0; k];
                for x in chunk {
                    for (acc, r) in t1.iter_mut().zip(self.posterior_row(x)) {
                        *acc += nan_to_zero(r);
                    }
                }
                t1
            })
            .collect();
        let mut totals = vec![0.0; k];
        for part in &partials {
            for (acc, v) in totals.iter_mut().zip(part.iter()) {
                *acc += v;
            }
        }
        totals
    }

    /// E-step accumulation of the sufficient statistics over all rows.
    pub fn accumulate(&self, rows: &[Vec<f64>]) -> SufficientStats {
        let (k, d) = (self.groups(), self.dim());
        let partials: Vec<SufficientStats> = rows
            .par_chunks(CHUNK_SIZE)
            .map(|chunk| {
                let mut stats = SufficientStats::zeros(k, d);
                for x in chunk {
                    stats.add_observation(x, &self.posterior_row(x));
                }
                stats
            })
            .collect();
        let mut total = SufficientStats::zeros(k, d);
        for part in &partials {
            total.merge(part);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_groups() -> MixtureParameters {
        MixtureParameters::new(vec![
            ComponentDistribution::new(vec![0.0], DenseMatrix::identity(1), 0.5),
            ComponentDistribution::new(vec![4.0], DenseMatrix::identity(1), 0.5),
        ])
    }

    #[test]
    fn test_posterior_row_sums_to_one() {
        let p = two_groups();
        for x in [-2.0, 0.0, 1.5, 2.0, 6.0] {
            let r = p.posterior_row(&[x]);
            assert!((r.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
        // symmetric point between the two means
        let mid = p.posterior_row(&[2.0]);
        assert!((mid[0] - 0.5).abs() < 1e-12);
        assert!((p.posterior_probability(1, &[2.0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_posterior_nan_when_all_densities_vanish() {
        let p = two_groups();
        let r = p.posterior_row(&[1e6]);
        assert!(r.iter().all(|v| v.is_nan()));
        assert!(p.posterior_probability(0, &[1e6]).is_nan());
        assert_eq!(p.classify_row(&[1e6]), None);
        assert_eq!(p.classify_row(&[3.5]), Some(1));
    }

    #[test]
    fn test_nan_rows_contribute_zero_to_stats() {
        let p = two_groups();
        let rows = vec![vec![0.0], vec![1e6]];
        let stats = p.accumulate(&rows);
        let mass: f64 = stats.t1.iter().sum();
        assert!((mass - 1.0).abs() < 1e-12, "mass={}", mass);
        assert!(stats.t2.iter().all(|t| t[0].is_finite()));
        let totals = p.responsibility_totals(&rows);
        assert!((totals.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_accumulate_matches_direct_sums() {
        let p = MixtureParameters::new(vec![ComponentDistribution::new(
            vec![0.0, 0.0],
            DenseMatrix::identity(2),
            1.0,
        )]);
        // more rows than one chunk
        let rows: Vec<Vec<f64>> = (0..700)
            .map(|i| vec![(i % 7) as f64 * 0.1, (i % 11) as f64 * -0.2])
            .collect();
        let stats = p.accumulate(&rows);
        assert_eq!(stats.t1[0], 700.0);
        let sx: f64 = rows.iter().map(|r| r[0]).sum();
        let sxy: f64 = rows.iter().map(|r| r[0] * r[1]).sum();
        assert!((stats.t2[0][0] - sx).abs() < 1e-9);
        assert!((stats.t3[0].get(0, 1) - sxy).abs() < 1e-9);
        assert_eq!(stats.t3[0].get(0, 1), stats.t3[0].get(1, 0));
    }

    #[test]
    fn test_loglikelihood_single_standard_normal() {
        let p = MixtureParameters::new(vec![ComponentDistribution::new(
            vec![0.0],
            DenseMatrix::identity(1),
            1.0,
        )]);
        let rows = vec![vec![0.0], vec![1.0]];
        let expected = -(2.0 * std::f64::consts::PI).ln() - 0.5;
        assert!((p.loglikelihood(&rows) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_singular_component_contributes_zero_density() {
        let p = MixtureParameters::new(vec![
            ComponentDistribution::new(vec![0.0], DenseMatrix::zeros(1, 1), 0.5),
            ComponentDistribution::new(vec![0.0], DenseMatrix::identity(1), 0.5),
        ]);
        assert_eq!(p.singular_group(), Some(0));
        let r = p.posterior_row(&[0.3]);
        assert_eq!(r[0], 0.0);
        assert_eq!(r[1], 1.0);
        assert!(p.loglikelihood(&[vec![0.3]]).is_finite());
    }

    #[test]
    fn test_entropy_bounds() {
        let p = two_groups();
        // certain assignments have ~0 entropy, the midpoint has ln 2
        let far = p.entropy(&[vec![-10.0], vec![14.0]]);
        assert!(far.abs() < 1e-6, "entropy={}", far);
        let mid = p.entropy(&[vec![2.0]]);
        assert!((mid - 2.0f64.ln()).abs() < 1e-12);
    }
}
