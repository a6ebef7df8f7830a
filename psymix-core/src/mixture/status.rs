//! Error and status types for mixture estimation.
//!
//! Configuration problems are hard errors returned from constructors and
//! setters. Numerical trouble during estimation never aborts a run; it is
//! recorded in [`FitStatus`] so callers can inspect it alongside the
//! (possibly degraded) estimates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixtureError {
    #[error("Number of groups must be at least 1, got {groups}")]
    InvalidGroupCount { groups: usize },

    #[error("Observation matrix has no rows")]
    NoObservations,

    #[error("Observation matrix has no columns")]
    NoVariables,

    #[error("Non-finite value {value} at row {row}, column {col}")]
    NonFiniteData { row: usize, col: usize, value: f64 },

    #[error("Invalid option {name}: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    #[error("Dimension mismatch: expected {expected} values, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Why an EM run stopped before reaching a convergence decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterruptReason {
    Cancelled,
    TimedOut,
}

/// Outcome of the most recent estimation activity on a model.
///
/// A singular covariance is sticky: once recorded it is not replaced by a
/// later non-convergence or interruption, since those usually follow from it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum FitStatus {
    #[default]
    Ok,
    SingularCovariance {
        group: usize,
        iteration: usize,
    },
    NonConverged {
        iterations: usize,
    },
    Interrupted {
        iterations: usize,
        reason: InterruptReason,
    },
}

impl FitStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, FitStatus::Ok)
    }

    pub fn is_singular(&self) -> bool {
        matches!(self, FitStatus::SingularCovariance { .. })
    }

    /// Replace the current status with `next` unless a singular covariance
    /// has already been recorded.
    pub fn escalate(&mut self, next: FitStatus) {
        if !self.is_singular() {
            *self = next;
        }
    }
}

impl std::fmt::Display for FitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitStatus::Ok => write!(f, "OK"),
            FitStatus::SingularCovariance { .. } => write!(f, "Singular Matrix"),
            FitStatus::NonConverged { .. } => write!(f, "Not Converged"),
            FitStatus::Interrupted { .. } => write!(f, "Interrupted"),
        }
    }
}

/// One entry of the EM iteration history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub loglikelihood: f64,
    pub delta: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(FitStatus::Ok.to_string(), "OK");
        assert_eq!(
            FitStatus::SingularCovariance { group: 1, iteration: 3 }.to_string(),
            "Singular Matrix"
        );
        assert_eq!(FitStatus::NonConverged { iterations: 9 }.to_string(), "Not Converged");
    }

    #[test]
    fn test_singular_is_sticky() {
        let mut status = FitStatus::Ok;
        status.escalate(FitStatus::SingularCovariance { group: 0, iteration: 2 });
        status.escalate(FitStatus::NonConverged { iterations: 10 });
        assert_eq!(status, FitStatus::SingularCovariance { group: 0, iteration: 2 });

        let mut status = FitStatus::Ok;
        status.escalate(FitStatus::NonConverged { iterations: 10 });
        status.escalate(FitStatus::SingularCovariance { group: 1, iteration: 11 });
        assert!(status.is_singular());
    }

    #[test]
    fn test_error_messages() {
        let err = MixtureError::InvalidOption {
            name: "tolerance",
            reason: "must be positive".into(),
        };
        assert_eq!(err.to_string(), "Invalid option tolerance: must be positive");
        assert_eq!(
            MixtureError::InvalidGroupCount { groups: 0 }.to_string(),
            "Number of groups must be at least 1, got 0"
        );
    }
}
