//! Random-start search for EM starting values.
//!
//! Every candidate is an independent, disposable parameter set built from
//! the model's current parameters: means are redrawn around the global
//! mean, mixing proportions are re-derived from the raw responsibilities at
//! that point, and the candidate is scored by its log-likelihood. No M-step
//! runs here. Only the winner is handed back to the model.

use psymix_linalg::{DenseMatrix, LinalgError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::options::EmOptions;
use super::params::MixtureParameters;
use crate::util::math::derive_last_proportion;

/// A scored starting point.
#[derive(Debug, Clone)]
pub(crate) struct StartCandidate {
    pub index: usize,
    pub params: MixtureParameters,
    pub score: f64,
}

/// Failure to build a candidate, with the group being drawn at the time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StartFailure {
    pub group: usize,
    pub error: LinalgError,
}

/// Build and score candidate `index`.
///
/// The RNG stream depends only on `options.seed` and `index`, so the
/// search gives the same answer for any thread count.
pub(crate) fn build_candidate(
    index: usize,
    base: &MixtureParameters,
    rows: &[Vec<f64>],
    global_mean: &[f64],
    global_cov: &DenseMatrix,
    options: &EmOptions,
) -> Result<StartCandidate, StartFailure> {
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed.wrapping_add(index as u64));
    let mut components = base.components().to_vec();
    for (group, component) in components.iter_mut().enumerate() {
        component
            .generate_start_values(global_mean, global_cov, options.jitter, &mut rng)
            .map_err(|error| StartFailure { group, error })?;
    }
    let drawn = MixtureParameters::new(components);

    let n = rows.len() as f64;
    let mut proportions: Vec<f64> = drawn
        .responsibility_totals(rows)
        .into_iter()
        .map(|t| t / n)
        .collect();
    derive_last_proportion(&mut proportions);
    let params = drawn.with_proportions(&proportions);

    let score = params.loglikelihood(rows);
    Ok(StartCandidate {
        index,
        params,
        score,
    })
}

/// Score `options.number_of_starts` candidates in parallel and return the
/// best one. Ties go to the lower index; NaN scores rank last.
///
/// When every candidate fails, the first failure is returned.
pub(crate) fn search(
    base: &MixtureParameters,
    rows: &[Vec<f64>],
    global_mean: &[f64],
    global_cov: &DenseMatrix,
    options: &EmOptions,
) -> Result<StartCandidate, StartFailure> {
    let results: Vec<Result<StartCandidate, StartFailure>> = (0..options.number_of_starts)
        .into_par_iter()
        .map(|i| build_candidate(i, base, rows, global_mean, global_cov, options))
        .collect();

    let mut best: Option<StartCandidate> = None;
    let mut first_failure = None;
    for result in results {
        match result {
            Ok(candidate) => {
                let better = match &best {
                    None => true,
                    Some(b) => rank(candidate.score) > rank(b.score),
                };
                if better {
                    best = Some(candidate);
                }
            }
            Err(failure) => {
                if first_failure.is_none() {
                    first_failure = Some(failure);
                }
            }
        }
    }

    match (best, first_failure) {
        (Some(candidate), _) => Ok(candidate),
        (None, Some(failure)) => Err(failure),
        (None, None) => unreachable!("number_of_starts is validated to be at least 1"),
    }
}

fn rank(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}
