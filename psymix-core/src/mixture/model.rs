//! Gaussian mixture model estimated by Expectation-Maximization.
//!
//! Model: x_i ~ sum_g pi_g N(mu_g, S_g), g = 1..K.
//!
//! The model owns the observation matrix, the current parameter snapshot
//! and the fit state. Each M-step reads the current snapshot through the
//! E-step, builds a new snapshot, passes its covariances through the
//! constraint pipeline, and swaps it in.

use std::time::Instant;

use psymix_linalg::DenseMatrix;
use tracing::{debug, info, warn};

use super::component::ComponentDistribution;
use super::constraints::ModelConstraints;
use super::options::{CancellationToken, EmOptions};
use super::params::MixtureParameters;
use super::start;
use super::status::{FitStatus, InterruptReason, IterationRecord, MixtureError};
use crate::selection::criteria::InformationFitCriteria;
use crate::util::math::{derive_last_proportion, uniform_proportions};

#[derive(Debug, Clone)]
pub struct MixtureModel {
    observations: Vec<Vec<f64>>,
    dim: usize,
    groups: usize,
    global_mean: Vec<f64>,
    global_cov: DenseMatrix,
    params: MixtureParameters,
    constraints: ModelConstraints,
    options: EmOptions,
    cancel: CancellationToken,
    iteration: usize,
    converged: bool,
    status: FitStatus,
    history: Vec<IterationRecord>,
    fit_statistics: Option<InformationFitCriteria>,
}

impl MixtureModel {
    /// Build a model for `groups` components over the rows of `data`.
    ///
    /// All components start at the sample mean and population covariance
    /// of `data`; proportions are 1/K with the last one derived.
    pub fn new(data: &DenseMatrix, groups: usize) -> Result<Self, MixtureError> {
        if groups == 0 {
            return Err(MixtureError::InvalidGroupCount { groups });
        }
        if data.nrows() == 0 {
            return Err(MixtureError::NoObservations);
        }
        if data.ncols() == 0 {
            return Err(MixtureError::NoVariables);
        }
        let observations = data.rows();
        for (row, values) in observations.iter().enumerate() {
            if let Some((col, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
                return Err(MixtureError::NonFiniteData { row, col, value });
            }
        }

        let (global_mean, global_cov) = sample_moments(&observations);
        let components = uniform_proportions(groups)
            .into_iter()
            .map(|pi| ComponentDistribution::new(global_mean.clone(), global_cov.clone(), pi))
            .collect();

        Ok(Self {
            dim: data.ncols(),
            groups,
            observations,
            global_mean,
            global_cov,
            params: MixtureParameters::new(components),
            constraints: ModelConstraints::default(),
            options: EmOptions::default(),
            cancel: CancellationToken::new(),
            iteration: 0,
            converged: false,
            status: FitStatus::Ok,
            history: Vec::new(),
            fit_statistics: None,
        })
    }

    pub fn set_model_constraints(&mut self, constraints: ModelConstraints) {
        self.constraints = constraints;
    }

    pub fn set_em_options(&mut self, options: EmOptions) -> Result<(), MixtureError> {
        options.validate()?;
        self.options = options;
        Ok(())
    }

    /// Install a token that can stop `run_em` from another thread.
    pub fn set_cancellation_token(&mut self, token: CancellationToken) {
        self.cancel = token;
    }

    pub fn constraints(&self) -> &ModelConstraints {
        &self.constraints
    }

    pub fn options(&self) -> &EmOptions {
        &self.options
    }

    pub fn sample_size(&self) -> usize {
        self.observations.len()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn groups(&self) -> usize {
        self.groups
    }

    pub fn parameters(&self) -> &MixtureParameters {
        &self.params
    }

    pub fn mean(&self, g: usize) -> &[f64] {
        self.params.component(g).mean()
    }

    pub fn covariance(&self, g: usize) -> &DenseMatrix {
        self.params.component(g).covariance()
    }

    pub fn mixing_proportion(&self, g: usize) -> f64 {
        self.params.component(g).mixing_proportion()
    }

    pub fn mixing_proportions(&self) -> Vec<f64> {
        self.params.proportions()
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Number of M-steps performed so far.
    pub fn iterations(&self) -> usize {
        self.iteration
    }

    pub fn status(&self) -> &FitStatus {
        &self.status
    }

    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    /// Statistics captured at the end of the last `run_em`.
    pub fn fit_statistics(&self) -> Option<&InformationFitCriteria> {
        self.fit_statistics.as_ref()
    }

    /// Fresh statistics for the current parameters.
    pub fn information_criteria(&self) -> InformationFitCriteria {
        InformationFitCriteria::from_model(self)
    }

    pub fn free_parameters(&self) -> usize {
        self.constraints.free_parameters(self.dim, self.groups)
    }

    /// r_gi; NaN when every component density vanishes at row `i`.
    pub fn posterior_probability(&self, g: usize, i: usize) -> f64 {
        self.params.posterior_probability(g, &self.observations[i])
    }

    /// N x K matrix of posterior probabilities.
    pub fn posterior_probabilities(&self) -> Vec<Vec<f64>> {
        self.params.posterior_matrix(&self.observations)
    }

    /// Modal group per observation.
    pub fn classify(&self) -> Vec<Option<usize>> {
        self.observations
            .iter()
            .map(|x| self.params.classify_row(x))
            .collect()
    }

    /// Log-likelihood at the current parameters, without touching the
    /// status.
    pub fn evaluate_loglikelihood(&self) -> f64 {
        self.params.loglikelihood(&self.observations)
    }

    /// Log-likelihood at the current parameters. A component whose
    /// covariance cannot be inverted is recorded in the status and
    /// contributes zero density.
    pub fn loglikelihood(&mut self) -> f64 {
        self.record_singular_components();
        self.evaluate_loglikelihood()
    }

    /// Classification entropy of the current posterior.
    pub fn entropy(&self) -> f64 {
        self.params.entropy(&self.observations)
    }

    /// Sample mean of the observations.
    pub fn global_mean(&self) -> &[f64] {
        &self.global_mean
    }

    /// Population covariance of the observations.
    pub fn global_covariance(&self) -> &DenseMatrix {
        &self.global_cov
    }

    /// One EM iteration; returns the log-likelihood at the new parameters.
    pub fn m_step(&mut self) -> f64 {
        let stats = self.params.accumulate(&self.observations);
        let n = self.observations.len() as f64;

        let mut means = Vec::with_capacity(self.groups);
        let mut covariances = Vec::with_capacity(self.groups);
        for g in 0..self.groups {
            let t1 = stats.t1[g];
            if t1 > 0.0 {
                let mean: Vec<f64> = stats.t2[g].iter().map(|t| t / t1).collect();
                let cov = stats.t3[g].scale(1.0 / t1).sub(&DenseMatrix::outer(&mean, &mean));
                means.push(mean);
                covariances.push(cov);
            } else {
                // Empty group: nothing to estimate from, keep its parameters.
                let previous = self.params.component(g);
                means.push(previous.mean().to_vec());
                covariances.push(previous.covariance().clone());
            }
        }

        // Pooling weighs groups by the proportions this step started from.
        self.constraints.apply(&mut covariances, &self.params.proportions());

        let mut proportions: Vec<f64> = stats.t1.iter().map(|t| t / n).collect();
        derive_last_proportion(&mut proportions);

        let components = means
            .into_iter()
            .zip(covariances)
            .zip(proportions)
            .map(|((mean, cov), pi)| ComponentDistribution::new(mean, cov, pi))
            .collect();
        self.params = MixtureParameters::new(components);
        self.iteration += 1;

        self.loglikelihood()
    }

    /// Score `number_of_starts` random starting points and install the best.
    ///
    /// Returns the winning raw log-likelihood, or `None` when no candidate
    /// could be drawn (recorded as a singular covariance).
    pub fn multiple_random_starts(&mut self) -> Option<f64> {
        info!(
            "Scoring {} random starts (k={}, d={})",
            self.options.number_of_starts, self.groups, self.dim
        );
        match start::search(
            &self.params,
            &self.observations,
            &self.global_mean,
            &self.global_cov,
            &self.options,
        ) {
            Ok(best) => {
                debug!("Best start #{} with loglik {:.6}", best.index, best.score);
                self.params = best.params;
                Some(best.score)
            }
            Err(failure) => {
                warn!(
                    "Random start generation failed for group {}: {}",
                    failure.group, failure.error
                );
                self.status.escalate(FitStatus::SingularCovariance {
                    group: failure.group,
                    iteration: self.iteration,
                });
                None
            }
        }
    }

    /// Iterate M-steps until the absolute log-likelihood change is within
    /// tolerance, the iteration budget is spent, or the run is interrupted.
    pub fn run_em(&mut self) -> FitStatus {
        let started = Instant::now();
        info!(
            "Starting EM with n={}, d={}, k={}, constraints: {}",
            self.sample_size(),
            self.dim,
            self.groups,
            self.constraints
        );

        // A singular covariance outlives the run that found it; other
        // outcomes describe only the previous run.
        if !self.status.is_singular() {
            self.status = FitStatus::Ok;
        }

        let budget_end = self.iteration + self.options.max_iterations;
        let mut ll_prev = self.loglikelihood();
        let mut delta = f64::INFINITY;
        let mut interrupted = None;

        while delta > self.options.tolerance && self.iteration < budget_end {
            if let Some(reason) = self.interruption(started) {
                interrupted = Some(reason);
                break;
            }
            let ll_new = self.m_step();
            delta = (ll_prev - ll_new).abs();
            self.history.push(IterationRecord {
                iteration: self.iteration,
                loglikelihood: ll_new,
                delta,
            });
            debug!(
                "EM iter {}: loglik={:.8}, delta={:.2e}",
                self.iteration, ll_new, delta
            );
            ll_prev = ll_new;
        }

        self.converged = delta <= self.options.tolerance;
        if let Some(reason) = interrupted {
            warn!("EM interrupted ({:?}) after {} iterations", reason, self.iteration);
            self.status.escalate(FitStatus::Interrupted {
                iterations: self.iteration,
                reason,
            });
        } else if self.converged {
            info!("EM converged after {} iterations (loglik {:.6})", self.iteration, ll_prev);
        } else {
            warn!(
                "EM did not converge after {} iterations (last delta {:.2e})",
                self.iteration, delta
            );
            self.status.escalate(FitStatus::NonConverged {
                iterations: self.iteration,
            });
        }

        self.fit_statistics = Some(InformationFitCriteria::from_model(self));
        self.status.clone()
    }

    /// Random starts followed by EM.
    pub fn fit(&mut self) -> FitStatus {
        self.multiple_random_starts();
        self.run_em()
    }

    fn interruption(&self, started: Instant) -> Option<InterruptReason> {
        if self.cancel.is_cancelled() {
            return Some(InterruptReason::Cancelled);
        }
        match self.options.timeout {
            Some(limit) if started.elapsed() >= limit => Some(InterruptReason::TimedOut),
            _ => None,
        }
    }

    fn record_singular_components(&mut self) {
        if let Some(group) = self.params.singular_group() {
            if !self.status.is_singular() {
                if let Some(err) = self.params.component(group).factorization_error() {
                    warn!(
                        "Covariance of group {} is not invertible at iteration {}: {}",
                        group, self.iteration, err
                    );
                }
            }
            self.status.escalate(FitStatus::SingularCovariance {
                group,
                iteration: self.iteration,
            });
        }
    }
}

/// Sample mean and population (divide-by-N) covariance.
fn sample_moments(rows: &[Vec<f64>]) -> (Vec<f64>, DenseMatrix) {
    let n = rows.len() as f64;
    let d = rows[0].len();
    let mut mean = vec![0.0; d];
    for row in rows {
        for (m, x) in mean.iter_mut().zip(row.iter()) {
            *m += x;
        }
    }
    for m in mean.iter_mut() {
        *m /= n;
    }

    let mut cov = DenseMatrix::zeros(d, d);
    let mut centered = vec![0.0; d];
    for row in rows {
        for j in 0..d {
            centered[j] = row[j] - mean[j];
        }
        cov.add_weighted_outer(&centered, 1.0 / n);
    }
    (mean, cov)
}
