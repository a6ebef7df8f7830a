//! Subcommands and the argument groups they share.

pub mod classify;
pub mod fit;
pub mod select;

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use tracing::info;

use psymix_core::mixture::constraints::ModelConstraints;
use psymix_core::mixture::options::EmOptions;
use psymix_data::observation::{complete_case_indices, parse_observation_file};
use psymix_linalg::DenseMatrix;

/// Input file selection.
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Observation file (tab, comma or whitespace delimited, with header)
    #[arg(long)]
    pub data_file: String,

    /// Variable column names (comma-separated; default: all but the ID column)
    #[arg(long, default_value = "")]
    pub columns: String,

    /// Row ID column name
    #[arg(long)]
    pub id_col: Option<String>,
}

/// Covariance constraints.
#[derive(Args, Debug, Clone)]
pub struct ConstraintArgs {
    /// Equal variances across variables within each group
    #[arg(long, default_value = "false")]
    pub same_variance_within: bool,

    /// Equal covariances across variable pairs within each group
    #[arg(long, default_value = "false")]
    pub same_covariance_within: bool,

    /// Zero covariances within each group
    #[arg(long, default_value = "false")]
    pub local_independence: bool,

    /// One covariance matrix shared by all groups
    #[arg(long, default_value = "false")]
    pub same_covariance_between: bool,
}

impl ConstraintArgs {
    pub fn constraints(&self) -> ModelConstraints {
        ModelConstraints {
            same_variance_within: self.same_variance_within,
            same_covariance_within: self.same_covariance_within,
            local_independence: self.local_independence,
            same_covariance_between: self.same_covariance_between,
        }
    }
}

/// EM iteration settings.
#[derive(Args, Debug, Clone)]
pub struct EmArgs {
    /// Maximum EM iterations
    #[arg(long, default_value = "1000")]
    pub max_iter: usize,

    /// Convergence tolerance on the absolute log-likelihood change
    #[arg(long, default_value = "1e-6")]
    pub tol: f64,

    /// Number of random starts
    #[arg(long, default_value = "10")]
    pub starts: usize,

    /// Scale of the random start perturbation
    #[arg(long, default_value = "0.5")]
    pub jitter: f64,

    /// Random seed
    #[arg(long, default_value = "12345")]
    pub seed: u64,

    /// Wall-clock limit per EM run, in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl EmArgs {
    pub fn options(&self) -> EmOptions {
        EmOptions {
            max_iterations: self.max_iter,
            tolerance: self.tol,
            number_of_starts: self.starts,
            jitter: self.jitter,
            seed: self.seed,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Complete-case observation matrix with its column names and row IDs.
pub struct LoadedData {
    pub matrix: DenseMatrix,
    pub column_names: Vec<String>,
    pub row_ids: Vec<String>,
}

pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

/// Read the observation file and drop rows with missing values.
pub fn load_data(args: &DataArgs) -> Result<LoadedData> {
    let columns = split_list(&args.columns);
    let data = parse_observation_file(Path::new(&args.data_file), &columns, args.id_col.as_deref())?;
    info!(
        "Loaded {} rows x {} variables from {}",
        data.n_rows(),
        data.n_columns(),
        args.data_file
    );

    let keep = complete_case_indices(&data);
    if keep.len() < data.n_rows() {
        info!("Dropped {} rows with missing values", data.n_rows() - keep.len());
    }
    if keep.is_empty() {
        bail!("No complete observations in {}", args.data_file);
    }

    Ok(LoadedData {
        matrix: data.to_matrix(&keep),
        row_ids: keep.iter().map(|&i| data.row_ids[i].clone()).collect(),
        column_names: data.column_names,
    })
}
