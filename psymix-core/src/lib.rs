//! psymix-core: Gaussian mixture modelling for PsyMix
//!
//! Implements EM estimation of multivariate normal mixtures with
//! covariance constraints, multi-start initialization, information-criterion
//! model selection, and fitted-model serialization.

pub mod mixture;
pub mod model;
pub mod selection;
pub mod util;

pub use mixture::{
    CancellationToken, EmOptions, FitStatus, MixtureError, MixtureModel, ModelConstraints,
};
pub use model::FittedMixture;
pub use selection::{Criterion, InformationFitCriteria};
