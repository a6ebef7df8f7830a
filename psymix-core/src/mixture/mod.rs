//! Gaussian mixture estimation.
//!
//! - Component distributions with cached precision matrices
//! - Covariance constraint pipeline
//! - EM iteration with multi-start initialization
//! - Fit status and iteration history

pub mod component;
pub mod constraints;
pub mod model;
pub mod options;
pub mod params;
pub(crate) mod start;
pub mod status;

pub use component::ComponentDistribution;
pub use constraints::{ConstraintStep, ModelConstraints};
pub use model::MixtureModel;
pub use options::{CancellationToken, EmOptions};
pub use params::MixtureParameters;
pub use status::{FitStatus, InterruptReason, IterationRecord, MixtureError};
