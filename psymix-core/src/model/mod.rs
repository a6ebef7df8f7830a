//! Fitted-model snapshots and their on-disk format.

pub mod fitted;
pub mod serialization;

pub use fitted::{ComponentParameters, FittedMixture};
pub use serialization::{load_model, model_summary, save_model, save_model_json};
