//! Small numeric helpers shared across the crate.

pub mod math;
