use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Why the scan loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every target ID was found before the listing ran out
    AllFound,
    /// Every scheduled partition was processed
    Exhausted,
    /// Shutdown was requested between partitions
    Interrupted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub target_ids: usize,
    pub found_ids: usize,
    pub missing_ids: usize,
    pub hydrated_ids: usize,
    pub records_written: u64,
    pub partitions_total: usize,
    pub partitions_already_done: usize,
    pub partitions_scanned: usize,
    pub partitions_failed: usize,
    pub duration_secs: f64,
}

/// End-of-run reconciliation.
///
/// Missing IDs are expected after an interrupted run or when the source has
/// gaps; they are reported, never treated as a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub source: String,
    pub output_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub resumed: bool,
    pub stop_reason: StopReason,
    pub summary: RunSummary,
    pub missing_sample: Vec<i64>,
    pub failed_partitions: Vec<String>,
    pub skipped_in_checkpoint: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl ExtractionReport {
    pub fn is_complete(&self) -> bool {
        self.summary.missing_ids == 0
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_report(missing: usize) -> ExtractionReport {
        ExtractionReport {
            source: "/data".to_string(),
            output_path: PathBuf::from("out.jsonl"),
            checkpoint_path: PathBuf::from("state.json"),
            resumed: false,
            stop_reason: StopReason::Exhausted,
            summary: RunSummary {
                target_ids: 3,
                found_ids: 3 - missing,
                missing_ids: missing,
                hydrated_ids: 0,
                records_written: 3,
                partitions_total: 2,
                partitions_already_done: 0,
                partitions_scanned: 2,
                partitions_failed: 0,
                duration_secs: 0.5,
            },
            missing_sample: Vec::new(),
            failed_partitions: Vec::new(),
            skipped_in_checkpoint: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_completeness() {
        assert!(sample_report(0).is_complete());
        assert!(!sample_report(1).is_complete());
    }

    #[test]
    fn test_save_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.json");
        sample_report(0).save_json(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"stop_reason\": \"exhausted\""));
        assert!(content.contains("\"records_written\": 3"));
    }
}
