//! Information criteria for comparing fitted mixtures.
//!
//! All criteria are "smaller is better" and share the -2 ll deviance term;
//! they differ in the penalty per free parameter p.
//!
//! | criterion | penalty                 |
//! |-----------|-------------------------|
//! | AIC       | 2p                      |
//! | BIC       | p ln N                  |
//! | CAIC      | p (ln N + 1)            |
//! | SABIC     | p ln((N + 2) / 24)      |
//! | SACAIC    | p (ln((N + 2) / 24) + 1)|
//! | ICL-BIC   | BIC + 2 * entropy       |

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::mixture::model::MixtureModel;

/// Frozen snapshot of the quantities the criteria depend on.
///
/// Taken once from a model, so later changes to the model do not leak
/// into the reported statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InformationFitCriteria {
    pub log_likelihood: f64,
    pub sample_size: usize,
    pub free_parameters: usize,
    pub entropy: f64,
}

impl InformationFitCriteria {
    pub fn new(log_likelihood: f64, sample_size: usize, free_parameters: usize, entropy: f64) -> Self {
        Self {
            log_likelihood,
            sample_size,
            free_parameters,
            entropy,
        }
    }

    /// Snapshot the model's current log-likelihood, size, parameter count
    /// and classification entropy.
    pub fn from_model(model: &MixtureModel) -> Self {
        Self {
            log_likelihood: model.evaluate_loglikelihood(),
            sample_size: model.sample_size(),
            free_parameters: model.free_parameters(),
            entropy: model.entropy(),
        }
    }

    fn deviance(&self) -> f64 {
        -2.0 * self.log_likelihood
    }

    fn p(&self) -> f64 {
        self.free_parameters as f64
    }

    fn ln_n(&self) -> f64 {
        (self.sample_size as f64).ln()
    }

    fn ln_adjusted_n(&self) -> f64 {
        ((self.sample_size as f64 + 2.0) / 24.0).ln()
    }

    pub fn aic(&self) -> f64 {
        self.deviance() + 2.0 * self.p()
    }

    pub fn bic(&self) -> f64 {
        self.deviance() + self.p() * self.ln_n()
    }

    pub fn caic(&self) -> f64 {
        self.deviance() + self.p() * (self.ln_n() + 1.0)
    }

    pub fn sabic(&self) -> f64 {
        self.deviance() + self.p() * self.ln_adjusted_n()
    }

    pub fn sacaic(&self) -> f64 {
        self.deviance() + self.p() * (self.ln_adjusted_n() + 1.0)
    }

    pub fn entropy(&self) -> f64 {
        self.entropy
    }

    pub fn icl_bic(&self) -> f64 {
        self.bic() + 2.0 * self.entropy
    }

    pub fn value(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Aic => self.aic(),
            Criterion::Bic => self.bic(),
            Criterion::Caic => self.caic(),
            Criterion::Sabic => self.sabic(),
            Criterion::Sacaic => self.sacaic(),
            Criterion::IclBic => self.icl_bic(),
        }
    }
}

/// Which criterion drives model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    Aic,
    Bic,
    Caic,
    Sabic,
    Sacaic,
    IclBic,
}

impl Criterion {
    pub const ALL: [Criterion; 6] = [
        Criterion::Aic,
        Criterion::Bic,
        Criterion::Caic,
        Criterion::Sabic,
        Criterion::Sacaic,
        Criterion::IclBic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Criterion::Aic => "AIC",
            Criterion::Bic => "BIC",
            Criterion::Caic => "CAIC",
            Criterion::Sabic => "SABIC",
            Criterion::Sacaic => "SACAIC",
            Criterion::IclBic => "ICL-BIC",
        }
    }
}

impl FromStr for Criterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "aic" => Ok(Criterion::Aic),
            "bic" => Ok(Criterion::Bic),
            "caic" => Ok(Criterion::Caic),
            "sabic" => Ok(Criterion::Sabic),
            "sacaic" => Ok(Criterion::Sacaic),
            "iclbic" | "icl" => Ok(Criterion::IclBic),
            _ => Err(format!("Unknown criterion: {}", s)),
        }
    }
}
