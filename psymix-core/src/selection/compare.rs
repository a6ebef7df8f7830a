//! Fit a range of group counts and compare them by information criteria.

use std::ops::RangeInclusive;

use psymix_linalg::DenseMatrix;
use tracing::info;

use super::criteria::{Criterion, InformationFitCriteria};
use crate::mixture::constraints::ModelConstraints;
use crate::mixture::model::MixtureModel;
use crate::mixture::options::EmOptions;
use crate::mixture::status::{FitStatus, MixtureError};

/// Outcome of fitting one group count.
#[derive(Debug, Clone)]
pub struct GroupFit {
    pub groups: usize,
    pub converged: bool,
    pub iterations: usize,
    pub status: FitStatus,
    pub criteria: InformationFitCriteria,
    pub model: MixtureModel,
}

/// Fit K = `groups.start()..=groups.end()` with shared constraints and
/// options. Every K runs random starts followed by EM.
pub fn select_groups(
    data: &DenseMatrix,
    groups: RangeInclusive<usize>,
    constraints: ModelConstraints,
    options: &EmOptions,
) -> Result<Vec<GroupFit>, MixtureError> {
    options.validate()?;
    if *groups.start() == 0 || groups.is_empty() {
        return Err(MixtureError::InvalidGroupCount {
            groups: *groups.start(),
        });
    }

    let mut fits = Vec::with_capacity(groups.end() - groups.start() + 1);
    for k in groups {
        let mut model = MixtureModel::new(data, k)?;
        model.set_model_constraints(constraints);
        model.set_em_options(options.clone())?;
        let status = model.fit();
        let criteria = match model.fit_statistics() {
            Some(c) => *c,
            None => model.information_criteria(),
        };
        info!(
            "k={}: loglik={:.4}, BIC={:.4}, status={}",
            k,
            criteria.log_likelihood,
            criteria.bic(),
            status
        );
        fits.push(GroupFit {
            groups: k,
            converged: model.converged(),
            iterations: model.iterations(),
            status,
            criteria,
            model,
        });
    }
    Ok(fits)
}

/// The fit minimizing `criterion`, ignoring non-finite values.
/// Ties go to the smaller K.
pub fn best_by(fits: &[GroupFit], criterion: Criterion) -> Option<&GroupFit> {
    fits.iter()
        .filter(|f| f.criteria.value(criterion).is_finite())
        .fold(None, |best: Option<&GroupFit>, f| match best {
            Some(b) if b.criteria.value(criterion) <= f.criteria.value(criterion) => Some(b),
            _ => Some(f),
        })
}
