//! FittedMixture: a self-contained snapshot of an estimated mixture.
//!
//! Holds everything needed to report a fit and to score new observations
//! without the training data:
//! - Per-group mean, covariance and mixing proportion
//! - Constraints the fit was run under
//! - Convergence flag, status and iteration history
//! - Information criteria at the final parameters

use psymix_linalg::DenseMatrix;
use serde::{Deserialize, Serialize};

use crate::mixture::component::ComponentDistribution;
use crate::mixture::constraints::ModelConstraints;
use crate::mixture::model::MixtureModel;
use crate::mixture::params::MixtureParameters;
use crate::mixture::status::{FitStatus, IterationRecord, MixtureError};
use crate::selection::criteria::InformationFitCriteria;

/// Parameters of one group, covariance stored row by row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentParameters {
    pub mean: Vec<f64>,
    pub covariance: Vec<Vec<f64>>,
    pub mixing_proportion: f64,
}

/// The fitted mixture, serialized to .psymix.model files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedMixture {
    /// Magic bytes for validation.
    pub magic: [u8; 4],
    /// Version number for forward compatibility.
    pub version: u32,
    pub n_observations: usize,
    pub n_variables: usize,
    pub n_groups: usize,
    /// Column names in model order.
    pub variable_names: Vec<String>,
    pub constraints: ModelConstraints,
    pub components: Vec<ComponentParameters>,
    pub converged: bool,
    pub iterations: usize,
    pub status: FitStatus,
    pub history: Vec<IterationRecord>,
    pub criteria: InformationFitCriteria,
}

impl FittedMixture {
    /// Magic bytes: "PSMX" (PSychometric MiXture).
    pub const MAGIC: [u8; 4] = [b'P', b'S', b'M', b'X'];
    /// Current model version.
    pub const VERSION: u32 = 1;

    /// Snapshot a model. `variable_names` falls back to `V1..VD` when it
    /// does not match the model dimension.
    pub fn from_model(model: &MixtureModel, variable_names: Vec<String>) -> Self {
        let variable_names = if variable_names.len() == model.dim() {
            variable_names
        } else {
            (1..=model.dim()).map(|j| format!("V{}", j)).collect()
        };
        let components = model
            .parameters()
            .components()
            .iter()
            .map(|c| ComponentParameters {
                mean: c.mean().to_vec(),
                covariance: c.covariance().rows(),
                mixing_proportion: c.mixing_proportion(),
            })
            .collect();
        let criteria = match model.fit_statistics() {
            Some(c) => *c,
            None => model.information_criteria(),
        };

        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            n_observations: model.sample_size(),
            n_variables: model.dim(),
            n_groups: model.groups(),
            variable_names,
            constraints: *model.constraints(),
            components,
            converged: model.converged(),
            iterations: model.iterations(),
            status: model.status().clone(),
            history: model.history().to_vec(),
            criteria,
        }
    }

    /// Rebuild the parameter snapshot, checking the stored dimensions.
    pub fn parameters(&self) -> Result<MixtureParameters, MixtureError> {
        if self.components.len() != self.n_groups || self.n_groups == 0 {
            return Err(MixtureError::DimensionMismatch {
                expected: self.n_groups,
                got: self.components.len(),
            });
        }
        let d = self.n_variables;
        let mut components = Vec::with_capacity(self.n_groups);
        for c in &self.components {
            if c.mean.len() != d {
                return Err(MixtureError::DimensionMismatch {
                    expected: d,
                    got: c.mean.len(),
                });
            }
            if let Some(bad) = c.covariance.iter().find(|row| row.len() != d) {
                return Err(MixtureError::DimensionMismatch {
                    expected: d,
                    got: bad.len(),
                });
            }
            if c.covariance.len() != d {
                return Err(MixtureError::DimensionMismatch {
                    expected: d,
                    got: c.covariance.len(),
                });
            }
            components.push(ComponentDistribution::new(
                c.mean.clone(),
                DenseMatrix::from_rows(&c.covariance),
                c.mixing_proportion,
            ));
        }
        Ok(MixtureParameters::new(components))
    }

    fn check_row(&self, x: &[f64]) -> Result<(), MixtureError> {
        if x.len() != self.n_variables {
            return Err(MixtureError::DimensionMismatch {
                expected: self.n_variables,
                got: x.len(),
            });
        }
        Ok(())
    }

    /// Posterior group probabilities for a new observation.
    pub fn posterior(&self, x: &[f64]) -> Result<Vec<f64>, MixtureError> {
        self.check_row(x)?;
        Ok(self.parameters()?.posterior_row(x))
    }

    /// Modal group for a new observation; `None` when the posterior is
    /// undefined.
    pub fn classify(&self, x: &[f64]) -> Result<Option<usize>, MixtureError> {
        self.check_row(x)?;
        Ok(self.parameters()?.classify_row(x))
    }

    /// Posterior rows for many observations, rebuilding the parameters once.
    pub fn posterior_matrix(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, MixtureError> {
        for x in rows {
            self.check_row(x)?;
        }
        Ok(self.parameters()?.posterior_matrix(rows))
    }
}
