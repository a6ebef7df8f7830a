//! Compare group counts by information criteria.
//!
//! psymix select --data-file ... --min-groups 1 --max-groups 6 --output-prefix ...

use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Result};
use clap::Args;
use tracing::info;

use psymix_core::model::fitted::FittedMixture;
use psymix_core::model::serialization;
use psymix_core::selection::compare::{best_by, select_groups, GroupFit};
use psymix_core::selection::criteria::Criterion;

use super::{load_data, ConstraintArgs, DataArgs, EmArgs};

#[derive(Args, Debug)]
pub struct SelectArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Smallest number of groups to fit
    #[arg(long, default_value = "1")]
    pub min_groups: usize,

    /// Largest number of groups to fit
    #[arg(long, default_value = "5")]
    pub max_groups: usize,

    /// Criterion used to pick the best K: aic, bic, caic, sabic, sacaic, icl-bic
    #[arg(long, default_value = "bic")]
    pub criterion: String,

    #[command(flatten)]
    pub constraints: ConstraintArgs,

    #[command(flatten)]
    pub em: EmArgs,

    /// Output file prefix
    #[arg(long)]
    pub output_prefix: String,

    /// Also save the best model (.psymix.model)
    #[arg(long, default_value = "false")]
    pub save_best: bool,
}

pub fn run(args: SelectArgs) -> Result<()> {
    let criterion: Criterion = args.criterion.parse().map_err(anyhow::Error::msg)?;
    if args.min_groups == 0 || args.min_groups > args.max_groups {
        bail!(
            "Invalid group range {}..={}",
            args.min_groups,
            args.max_groups
        );
    }

    info!("=== PsyMix: Model Selection ===");
    info!("Groups: {}..={}", args.min_groups, args.max_groups);
    info!("Criterion: {}", criterion.name());

    let data = load_data(&args.data)?;
    let fits = select_groups(
        &data.matrix,
        args.min_groups..=args.max_groups,
        args.constraints.constraints(),
        &args.em.options(),
    )?;

    let table_path = format!("{}.select.tsv", args.output_prefix);
    write_table(&fits, Path::new(&table_path))?;
    info!("Criteria table written to {}", table_path);

    match best_by(&fits, criterion) {
        Some(best) => {
            println!(
                "Best number of groups by {}: {} ({:.4})",
                criterion.name(),
                best.groups,
                best.criteria.value(criterion)
            );
            if args.save_best {
                let fitted = FittedMixture::from_model(&best.model, data.column_names);
                let model_path = format!("{}.psymix.model", args.output_prefix);
                serialization::save_model(&fitted, Path::new(&model_path))?;
                info!("Best model saved to {}", model_path);
            }
        }
        None => println!("No fit produced a finite {}", criterion.name()),
    }

    Ok(())
}

fn write_table(fits: &[GroupFit], path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    write!(writer, "K\tLOGLIK\tNPAR\tCONVERGED\tITER\tSTATUS")?;
    for c in Criterion::ALL {
        write!(writer, "\t{}", c.name())?;
    }
    writeln!(writer, "\tENTROPY")?;

    for fit in fits {
        write!(
            writer,
            "{}\t{:.6}\t{}\t{}\t{}\t{}",
            fit.groups,
            fit.criteria.log_likelihood,
            fit.criteria.free_parameters,
            fit.converged,
            fit.iterations,
            fit.status
        )?;
        for c in Criterion::ALL {
            write!(writer, "\t{:.6}", fit.criteria.value(c))?;
        }
        writeln!(writer, "\t{:.6}", fit.criteria.entropy())?;
    }
    writer.flush()?;
    Ok(())
}
