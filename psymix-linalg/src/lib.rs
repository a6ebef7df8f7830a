//! psymix-linalg: Linear algebra wrappers for psymix
//!
//! Provides the dense matrix type and the LU / Cholesky decompositions
//! used for multivariate normal densities and random start generation.

pub mod decomposition;
pub mod dense;

pub use decomposition::{CholeskyDecomp, LinalgError, LuDecomp};
pub use dense::DenseMatrix;
