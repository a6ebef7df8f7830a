//! Model serialization and deserialization.
//!
//! Uses bincode for fast, compact binary serialization.
//! Format: magic bytes (PSMX) + version (u32) + bincode payload.
//! Optional JSON sidecar for human inspection.

use anyhow::{bail, Context, Result};
use std::path::Path;

use super::fitted::FittedMixture;

/// Save a fitted mixture to a binary file (.psymix.model).
pub fn save_model(model: &FittedMixture, path: &Path) -> Result<()> {
    let encoded = bincode::serialize(model)?;
    std::fs::write(path, &encoded)
        .with_context(|| format!("Failed to write model file {}", path.display()))?;
    Ok(())
}

/// Load a fitted mixture from a binary file (.psymix.model).
pub fn load_model(path: &Path) -> Result<FittedMixture> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read model file {}", path.display()))?;
    let model: FittedMixture = bincode::deserialize(&data)
        .with_context(|| format!("Malformed model file {}", path.display()))?;

    if model.magic != FittedMixture::MAGIC {
        bail!(
            "Invalid model file: expected magic bytes {:?}, got {:?}",
            FittedMixture::MAGIC,
            model.magic
        );
    }
    if model.version > FittedMixture::VERSION {
        bail!(
            "Model file version {} is newer than supported version {}",
            model.version,
            FittedMixture::VERSION
        );
    }

    Ok(model)
}

/// Save a JSON sidecar for inspection (.psymix.model.json).
pub fn save_model_json(model: &FittedMixture, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(model)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Summary of a fitted mixture (for display).
pub fn model_summary(model: &FittedMixture) -> String {
    let mut out = format!(
        "PsyMix Gaussian Mixture v{}\n\
         Observations: {}\n\
         Variables: {} ({})\n\
         Groups: {}\n\
         Constraints: {}\n\
         Status: {}\n\
         Converged: {} after {} iterations\n\
         Log-likelihood: {:.6}\n\
         Free parameters: {}\n\
         AIC: {:.4}  BIC: {:.4}  CAIC: {:.4}\n\
         SABIC: {:.4}  SACAIC: {:.4}  ICL-BIC: {:.4}\n\
         Entropy: {:.4}",
        model.version,
        model.n_observations,
        model.n_variables,
        model.variable_names.join(", "),
        model.n_groups,
        model.constraints,
        model.status,
        if model.converged { "yes" } else { "no" },
        model.iterations,
        model.criteria.log_likelihood,
        model.criteria.free_parameters,
        model.criteria.aic(),
        model.criteria.bic(),
        model.criteria.caic(),
        model.criteria.sabic(),
        model.criteria.sacaic(),
        model.criteria.icl_bic(),
        model.criteria.entropy(),
    );
    for (g, c) in model.components.iter().enumerate() {
        let mean: Vec<String> = c.mean.iter().map(|m| format!("{:.4}", m)).collect();
        out.push_str(&format!(
            "\nGroup {}: proportion {:.4}, mean [{}]",
            g + 1,
            c.mixing_proportion,
            mean.join(", ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixture::model::MixtureModel;
    use psymix_linalg::DenseMatrix;

    fn fitted() -> FittedMixture {
        let data = DenseMatrix::from_row_major(
            5,
            2,
            &[1.0, 2.0, 2.0, 1.0, 3.0, 3.5, 0.5, 1.5, 2.5, 2.0],
        );
        let mut model = MixtureModel::new(&data, 1).unwrap();
        model.run_em();
        FittedMixture::from_model(&model, vec!["x".into(), "y".into()])
    }

    #[test]
    fn test_save_load_roundtrip() {
        let model = fitted();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.psymix.model");

        save_model(&model, &path).unwrap();
        let loaded = load_model(&path).unwrap();

        assert_eq!(loaded.n_observations, 5);
        assert_eq!(loaded.variable_names, vec!["x", "y"]);
        assert_eq!(loaded.components, model.components);
        assert_eq!(loaded.status, model.status);
        assert_eq!(loaded.criteria, model.criteria);
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let mut model = fitted();
        model.magic = *b"SGMD";
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.psymix.model");
        save_model(&model, &path).unwrap();
        let err = load_model(&path).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_json_sidecar_and_summary() {
        let model = fitted();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.psymix.model.json");
        save_model_json(&model, &path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["n_groups"], 1);

        let summary = model_summary(&model);
        assert!(summary.contains("Groups: 1"));
        assert!(summary.contains("Status: OK"));
        assert!(summary.contains("Group 1: proportion 1.0000"));
    }
}
