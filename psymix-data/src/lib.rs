//! psymix-data: Observation file I/O for PsyMix
//!
//! Reads delimited indicator files into dense observation matrices, with
//! missing-value handling and listwise deletion.

pub mod observation;

pub use observation::{complete_case_indices, parse_observation_file, Delimiter, ObservationData};
