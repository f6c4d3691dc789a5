pub mod target_set;

pub use target_set::{LoadStatistics, TargetSet};
