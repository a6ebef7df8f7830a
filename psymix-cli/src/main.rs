//! psymix: Gaussian mixture modelling for multivariate indicator data.
//!
//! CLI entry point using clap for argument parsing.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "psymix",
    version,
    about = "PsyMix: Gaussian mixture models with constrained covariances",
    long_about = "Fits multivariate normal mixtures by EM with multiple random starts.\n\
                   Supports covariance constraints, information-criterion model \
                   selection, and posterior classification of new data."
)]
struct Cli {
    /// Number of threads to use
    #[arg(long, default_value = "1", global = true)]
    threads: usize,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a mixture with a fixed number of groups
    Fit(commands::fit::FitArgs),

    /// Fit a range of group counts and compare information criteria
    Select(commands::select::SelectArgs),

    /// Compute posterior probabilities for new data from a saved model
    Classify(commands::classify::ClassifyArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Set up thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()
        .ok();

    tracing::info!("psymix v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Using {} threads", cli.threads);

    match cli.command {
        Commands::Fit(args) => commands::fit::run(args),
        Commands::Select(args) => commands::select::run(args),
        Commands::Classify(args) => commands::classify::run(args),
    }
}
