use crate::error::{IdSiftError, Result};
use crate::source::PartitionFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Resume state persisted after every processed partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default, alias = "last_file")]
    pub last_completed_file: Option<String>,
    /// Partitions whose read failed; the cursor moved past them anyway.
    #[serde(default)]
    pub skipped_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    pub fn record_completed(&mut self, partition: &PartitionFile) {
        self.last_completed_file = Some(partition.as_str().to_string());
        self.updated_at = Some(Utc::now());
    }

    pub fn record_skipped(&mut self, partition: &PartitionFile) {
        if !self.is_skipped(partition) {
            self.skipped_files.push(partition.as_str().to_string());
        }
    }

    pub fn clear_skipped(&mut self, partition: &PartitionFile) {
        self.skipped_files.retain(|name| name != partition.as_str());
    }

    pub fn is_skipped(&self, partition: &PartitionFile) -> bool {
        self.skipped_files.iter().any(|name| name == partition.as_str())
    }

    /// Index of the first partition still to scan.
    ///
    /// Everything sorting at or before `last_completed_file` counts as done,
    /// which also holds when that exact file has since disappeared.
    pub fn resume_index(&self, partitions: &[PartitionFile]) -> usize {
        match self.last_completed_file {
            Some(ref last) => partitions.partition_point(|p| p.as_str() <= last.as_str()),
            None => 0,
        }
    }

    /// Skipped partitions that are still listed and precede `resume_index`.
    pub fn retry_candidates(&self, partitions: &[PartitionFile]) -> Vec<PartitionFile> {
        let done = &partitions[..self.resume_index(partitions)];
        done.iter()
            .filter(|partition| self.is_skipped(partition))
            .cloned()
            .collect()
    }
}

/// Owns the checkpoint file on disk.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable state means no prior progress.
    pub fn load(&self) -> Checkpoint {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Checkpoint::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "checkpoint unreadable, starting from the first partition");
                return Checkpoint::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "checkpoint malformed, starting from the first partition");
                Checkpoint::default()
            }
        }
    }

    /// Replace the checkpoint atomically: temp file, fsync, rename.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let to_error = |reason: String| IdSiftError::CheckpointWrite {
            path: self.path.clone(),
            reason,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let json = serde_json::to_vec(checkpoint).map_err(|e| to_error(e.to_string()))?;

        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| to_error(e.to_string()))?;
        temp.write_all(&json).map_err(|e| to_error(e.to_string()))?;
        temp.as_file().sync_all().map_err(|e| to_error(e.to_string()))?;
        temp.persist(&self.path)
            .map_err(|e| to_error(e.error.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn partitions(names: &[&str]) -> Vec<PartitionFile> {
        names.iter().map(|n| PartitionFile::new(*n)).collect()
    }

    #[test]
    fn test_missing_checkpoint_means_no_progress() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path().join("state.json"));
        assert_eq!(store.load(), Checkpoint::default());
    }

    #[test]
    fn test_malformed_checkpoint_means_no_progress() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        fs::write(&path, "{ truncated").unwrap();

        let store = CheckpointStore::new(&path);
        assert_eq!(store.load().last_completed_file, None);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp_dir.path().join("state.json"));

        let mut checkpoint = Checkpoint::default();
        checkpoint.record_completed(&PartitionFile::new("part-0003.parquet"));
        checkpoint.record_skipped(&PartitionFile::new("part-0002.parquet"));
        store.save(&checkpoint).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.last_completed_file.as_deref(), Some("part-0003.parquet"));
        assert_eq!(loaded.skipped_files, vec!["part-0002.parquet".to_string()]);
        assert!(loaded.updated_at.is_some());

        // Overwritten, never appended
        checkpoint.record_completed(&PartitionFile::new("part-0004.parquet"));
        store.save(&checkpoint).unwrap();
        let content = fs::read_to_string(store.path()).unwrap();
        assert!(!content.contains("part-0003"));
    }

    #[test]
    fn test_legacy_last_file_key() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        fs::write(&path, r#"{"last_file": "bucket/a.parquet"}"#).unwrap();

        let loaded = CheckpointStore::new(&path).load();
        assert_eq!(loaded.last_completed_file.as_deref(), Some("bucket/a.parquet"));
        assert!(loaded.skipped_files.is_empty());
    }

    #[test]
    fn test_resume_index() {
        let files = partitions(&["a", "b", "c", "d"]);

        assert_eq!(Checkpoint::default().resume_index(&files), 0);

        let mut checkpoint = Checkpoint::default();
        checkpoint.record_completed(&PartitionFile::new("b"));
        assert_eq!(checkpoint.resume_index(&files), 2);

        checkpoint.record_completed(&PartitionFile::new("d"));
        assert_eq!(checkpoint.resume_index(&files), 4);

        // A vanished file still pins the position in the ordering
        checkpoint.record_completed(&PartitionFile::new("bb"));
        assert_eq!(checkpoint.resume_index(&files), 2);
    }

    #[test]
    fn test_skipped_ledger() {
        let files = partitions(&["a", "b", "c", "d"]);
        let mut checkpoint = Checkpoint::default();

        checkpoint.record_skipped(&PartitionFile::new("b"));
        checkpoint.record_skipped(&PartitionFile::new("b"));
        checkpoint.record_skipped(&PartitionFile::new("d"));
        checkpoint.record_completed(&PartitionFile::new("c"));
        assert_eq!(checkpoint.skipped_files.len(), 2);

        // d comes after the cursor and will be scanned normally
        assert_eq!(checkpoint.retry_candidates(&files), partitions(&["b"]));

        checkpoint.clear_skipped(&PartitionFile::new("b"));
        assert!(checkpoint.retry_candidates(&files).is_empty());
    }
}
