//! Information-criterion model selection across group counts.

pub mod compare;
pub mod criteria;

pub use compare::{best_by, select_groups, GroupFit};
pub use criteria::{Criterion, InformationFitCriteria};
