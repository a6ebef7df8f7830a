//! Fit a mixture with a fixed number of groups.
//!
//! psymix fit --data-file ... --groups 3 --output-prefix ...

use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use psymix_core::mixture::model::MixtureModel;
use psymix_core::model::fitted::FittedMixture;
use psymix_core::model::serialization;

use super::{load_data, ConstraintArgs, DataArgs, EmArgs};

#[derive(Args, Debug)]
pub struct FitArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Number of mixture groups
    #[arg(long, default_value = "2")]
    pub groups: usize,

    #[command(flatten)]
    pub constraints: ConstraintArgs,

    #[command(flatten)]
    pub em: EmArgs,

    /// Output file prefix
    #[arg(long)]
    pub output_prefix: String,

    /// Also save JSON sidecar for inspection
    #[arg(long, default_value = "false")]
    pub save_json: bool,

    /// Write posterior probabilities and modal group per row (.classes.tsv)
    #[arg(long, default_value = "false")]
    pub write_classes: bool,
}

pub fn run(args: FitArgs) -> Result<()> {
    info!("=== PsyMix: Fit Mixture ===");
    info!("Data file: {}", args.data.data_file);
    info!("Groups: {}", args.groups);

    let data = load_data(&args.data)?;

    let mut model = MixtureModel::new(&data.matrix, args.groups)?;
    model.set_model_constraints(args.constraints.constraints());
    model.set_em_options(args.em.options())?;
    let status = model.fit();
    info!("Fit finished with status: {}", status);

    let fitted = FittedMixture::from_model(&model, data.column_names);

    let model_path = format!("{}.psymix.model", args.output_prefix);
    serialization::save_model(&fitted, Path::new(&model_path))
        .with_context(|| format!("Failed to save model to {}", model_path))?;
    info!("Model saved to {}", model_path);

    if args.save_json {
        let json_path = format!("{}.psymix.model.json", args.output_prefix);
        serialization::save_model_json(&fitted, Path::new(&json_path))?;
        info!("JSON sidecar saved to {}", json_path);
    }

    if args.write_classes {
        let classes_path = format!("{}.classes.tsv", args.output_prefix);
        write_classes(&model, &data.row_ids, Path::new(&classes_path))?;
        info!("Posterior classes written to {}", classes_path);
    }

    println!("{}", serialization::model_summary(&fitted));

    Ok(())
}

/// One line per complete-case row: ID, P1..PK, CLASS (1-based).
fn write_classes(model: &MixtureModel, row_ids: &[String], path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    write!(writer, "ID")?;
    for g in 1..=model.groups() {
        write!(writer, "\tP{}", g)?;
    }
    writeln!(writer, "\tCLASS")?;

    let posterior = model.posterior_probabilities();
    for ((id, row), class) in row_ids.iter().zip(posterior.iter()).zip(model.classify()) {
        write!(writer, "{}", id)?;
        for p in row {
            if p.is_nan() {
                write!(writer, "\tNA")?;
            } else {
                write!(writer, "\t{:.6}", p)?;
            }
        }
        match class {
            Some(g) => writeln!(writer, "\t{}", g + 1)?,
            None => writeln!(writer, "\tNA")?,
        }
    }
    writer.flush()?;
    Ok(())
}
