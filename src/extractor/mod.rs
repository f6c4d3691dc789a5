pub mod checkpoint;
pub mod engine;
pub mod output_log;
pub mod report;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use engine::{EngineEvent, EngineOutcome, ExtractionEngine, FileFailure, ScanPlan};
pub use output_log::{hydrate_found_ids, Hydration, OutputLog};
pub use report::{ExtractionReport, RunSummary, StopReason};
