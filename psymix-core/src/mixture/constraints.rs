//! Covariance-structure constraints.
//!
//! After every raw M-step estimate the covariances pass through an ordered
//! pipeline of named steps. Order matters: a later step overwrites what an
//! earlier step wrote to the same entries.
//!
//! | # | step                    | effect                                              |
//! |---|-------------------------|-----------------------------------------------------|
//! | 1 | `SameVarianceWithin`    | every diagonal entry := S[0][0], per group          |
//! | 2 | `SameCovarianceWithin`  | every off-diagonal entry := S[0][1], per group      |
//! | 3 | `LocalIndependence`     | every off-diagonal entry := 0, per group            |
//! | 4 | `SameCovarianceBetween` | every group := sum_g pi_g S_g over steps 1-3 output |
//!
//! Step 2 is only scheduled when local independence is off. The weights
//! pi_g of step 4 are the proportions in effect before the M-step updates
//! them.

use psymix_linalg::DenseMatrix;
use serde::{Deserialize, Serialize};

/// The four constraint switches, fixed for the life of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelConstraints {
    pub same_variance_within: bool,
    pub same_covariance_within: bool,
    pub local_independence: bool,
    pub same_covariance_between: bool,
}

/// One named transformation of the per-group covariance matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintStep {
    SameVarianceWithin,
    SameCovarianceWithin,
    LocalIndependence,
    SameCovarianceBetween,
}

impl ConstraintStep {
    /// Precedence order, first applied first.
    pub const ORDER: [ConstraintStep; 4] = [
        ConstraintStep::SameVarianceWithin,
        ConstraintStep::SameCovarianceWithin,
        ConstraintStep::LocalIndependence,
        ConstraintStep::SameCovarianceBetween,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ConstraintStep::SameVarianceWithin => "same-variance-within",
            ConstraintStep::SameCovarianceWithin => "same-covariance-within",
            ConstraintStep::LocalIndependence => "local-independence",
            ConstraintStep::SameCovarianceBetween => "same-covariance-between",
        }
    }

    /// Apply this step to all group covariances.
    ///
    /// `proportions` weights the pooled average of `SameCovarianceBetween`
    /// and is ignored by the within-group steps.
    pub fn apply(&self, covariances: &mut [DenseMatrix], proportions: &[f64]) {
        match self {
            ConstraintStep::SameVarianceWithin => {
                for cov in covariances.iter_mut() {
                    let v = cov.get(0, 0);
                    for i in 0..cov.nrows() {
                        cov.set(i, i, v);
                    }
                }
            }
            ConstraintStep::SameCovarianceWithin => {
                for cov in covariances.iter_mut() {
                    if cov.nrows() < 2 {
                        continue;
                    }
                    let c = cov.get(0, 1);
                    set_off_diagonal(cov, c);
                }
            }
            ConstraintStep::LocalIndependence => {
                for cov in covariances.iter_mut() {
                    set_off_diagonal(cov, 0.0);
                }
            }
            ConstraintStep::SameCovarianceBetween => {
                assert_eq!(covariances.len(), proportions.len());
                let Some(first) = covariances.first() else {
                    return;
                };
                let mut pooled = DenseMatrix::zeros(first.nrows(), first.ncols());
                for (cov, &pi) in covariances.iter().zip(proportions.iter()) {
                    pooled.add_scaled(cov, pi);
                }
                for cov in covariances.iter_mut() {
                    *cov = pooled.clone();
                }
            }
        }
    }
}

fn set_off_diagonal(cov: &mut DenseMatrix, value: f64) {
    for i in 0..cov.nrows() {
        for j in 0..cov.ncols() {
            if i != j {
                cov.set(i, j, value);
            }
        }
    }
}

impl ModelConstraints {
    /// No constraints: every group has its own unstructured covariance.
    pub fn unconstrained() -> Self {
        Self::default()
    }

    fn enables(&self, step: ConstraintStep) -> bool {
        match step {
            ConstraintStep::SameVarianceWithin => self.same_variance_within,
            ConstraintStep::SameCovarianceWithin => {
                self.same_covariance_within && !self.local_independence
            }
            ConstraintStep::LocalIndependence => self.local_independence,
            ConstraintStep::SameCovarianceBetween => self.same_covariance_between,
        }
    }

    /// The steps this configuration schedules, in precedence order.
    pub fn pipeline(&self) -> Vec<ConstraintStep> {
        ConstraintStep::ORDER
            .into_iter()
            .filter(|step| self.enables(*step))
            .collect()
    }

    /// Run the scheduled pipeline over the group covariances.
    pub fn apply(&self, covariances: &mut [DenseMatrix], proportions: &[f64]) {
        for step in self.pipeline() {
            step.apply(covariances, proportions);
        }
    }

    /// Number of free parameters for `dim` variables and `groups` components.
    ///
    /// Variance terms per group: 1 when pooled within, else `dim`.
    /// Covariance terms per group: 0 under local independence, 1 when
    /// pooled within (also for a single variable), else dim(dim+1)/2 - dim.
    /// Covariance blocks count once when shared between groups. Means add
    /// dim * groups and mixing proportions add groups - 1.
    pub fn free_parameters(&self, dim: usize, groups: usize) -> usize {
        let variance_terms = if self.same_variance_within { 1 } else { dim };
        let covariance_terms = if self.local_independence {
            0
        } else if self.same_covariance_within {
            1
        } else {
            dim * (dim + 1) / 2 - dim
        };
        let blocks = if self.same_covariance_between { 1 } else { groups };
        (variance_terms + covariance_terms) * blocks + dim * groups + groups.saturating_sub(1)
    }
}

impl std::fmt::Display for ModelConstraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let steps = self.pipeline();
        if steps.is_empty() {
            return write!(f, "unconstrained");
        }
        let names: Vec<&str> = steps.iter().map(|s| s.name()).collect();
        write!(f, "{}", names.join(", "))
    }
}
