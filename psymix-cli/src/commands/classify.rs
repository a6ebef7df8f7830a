//! Score observations against a saved model.
//!
//! psymix classify --model-file out.psymix.model --data-file ... --output-file ...

use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Result;
use clap::Args;
use tracing::info;

use psymix_core::model::serialization::load_model;
use psymix_data::observation::parse_observation_file;

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Model file from `psymix fit` (.psymix.model)
    #[arg(long)]
    pub model_file: String,

    /// Observation file; must contain the model's variable columns
    #[arg(long)]
    pub data_file: String,

    /// Row ID column name
    #[arg(long)]
    pub id_col: Option<String>,

    /// Output TSV path
    #[arg(long)]
    pub output_file: String,
}

pub fn run(args: ClassifyArgs) -> Result<()> {
    let model = load_model(Path::new(&args.model_file))?;
    info!(
        "Loaded model with {} groups over {} variables",
        model.n_groups, model.n_variables
    );
    let params = model.parameters()?;

    let data = parse_observation_file(
        Path::new(&args.data_file),
        &model.variable_names,
        args.id_col.as_deref(),
    )?;

    let mut writer = BufWriter::new(std::fs::File::create(&args.output_file)?);
    write!(writer, "ID")?;
    for g in 1..=model.n_groups {
        write!(writer, "\tP{}", g)?;
    }
    writeln!(writer, "\tCLASS")?;

    let mut n_missing = 0;
    for (id, row) in data.row_ids.iter().zip(data.values.iter()) {
        write!(writer, "{}", id)?;
        if row.iter().any(|v| !v.is_finite()) {
            n_missing += 1;
            for _ in 0..model.n_groups {
                write!(writer, "\tNA")?;
            }
            writeln!(writer, "\tNA")?;
            continue;
        }
        let posterior = params.posterior_row(row);
        for p in &posterior {
            if p.is_nan() {
                write!(writer, "\tNA")?;
            } else {
                write!(writer, "\t{:.6}", p)?;
            }
        }
        match params.classify_row(row) {
            Some(g) => writeln!(writer, "\t{}", g + 1)?,
            None => writeln!(writer, "\tNA")?,
        }
    }
    writer.flush()?;

    info!(
        "Classified {} rows ({} with missing values) into {}",
        data.n_rows(),
        n_missing,
        args.output_file
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use psymix_core::mixture::model::MixtureModel;
    use psymix_core::model::fitted::FittedMixture;
    use psymix_core::model::serialization::save_model;
    use psymix_linalg::DenseMatrix;

    #[test]
    fn test_classify_writes_posteriors() {
        let dir = tempfile::tempdir().unwrap();
        let data = DenseMatrix::from_row_major(4, 1, &[0.0, 1.0, 2.0, 3.5]);
        let mut model = MixtureModel::new(&data, 1).unwrap();
        model.run_em();
        let model_path = dir.path().join("m.psymix.model");
        save_model(&FittedMixture::from_model(&model, vec!["score".into()]), &model_path).unwrap();

        let data_path = dir.path().join("new.tsv");
        std::fs::write(&data_path, "id\tscore\nA\t1.2\nB\tNA\n").unwrap();
        let out_path = dir.path().join("post.tsv");

        run(ClassifyArgs {
            model_file: model_path.display().to_string(),
            data_file: data_path.display().to_string(),
            id_col: Some("id".into()),
            output_file: out_path.display().to_string(),
        })
        .unwrap();

        let out = std::fs::read_to_string(&out_path).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "ID\tP1\tCLASS");
        assert_eq!(lines[1], "A\t1.000000\t1");
        assert_eq!(lines[2], "B\tNA\tNA");
    }
}
