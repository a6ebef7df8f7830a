//! EM run options and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::status::MixtureError;

/// Configuration for the EM iterations and the random-start search.
#[derive(Debug, Clone, PartialEq)]
pub struct EmOptions {
    /// Maximum number of M-steps in one `run_em` call.
    pub max_iterations: usize,
    /// Stop when the absolute log-likelihood change falls to this value.
    pub tolerance: f64,
    /// Number of candidates scored by `multiple_random_starts`.
    pub number_of_starts: usize,
    /// Scale applied to correlated draws around the global mean.
    pub jitter: f64,
    /// Seed for the random-start streams.
    pub seed: u64,
    /// Wall-clock budget for `run_em`.
    pub timeout: Option<Duration>,
}

impl Default for EmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-6,
            number_of_starts: 10,
            jitter: 0.5,
            seed: 12345,
            timeout: None,
        }
    }
}

impl EmOptions {
    pub fn validate(&self) -> Result<(), MixtureError> {
        if self.max_iterations == 0 {
            return Err(MixtureError::InvalidOption {
                name: "max_iterations",
                reason: "must be greater than 0".into(),
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(MixtureError::InvalidOption {
                name: "tolerance",
                reason: format!("must be positive and finite, got {}", self.tolerance),
            });
        }
        if self.number_of_starts == 0 {
            return Err(MixtureError::InvalidOption {
                name: "number_of_starts",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.jitter.is_finite() && self.jitter > 0.0) {
            return Err(MixtureError::InvalidOption {
                name: "jitter",
                reason: format!("must be positive and finite, got {}", self.jitter),
            });
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(MixtureError::InvalidOption {
                name: "timeout",
                reason: "must be non-zero when set".into(),
            });
        }
        Ok(())
    }
}

/// Shared flag checked once per EM iteration.
///
/// Clones observe the same flag, so a token handed to another thread can
/// stop a running fit.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
