use crate::error::{IdSiftError, Result};
use crate::extractor::checkpoint::{Checkpoint, CheckpointStore};
use crate::extractor::output_log::OutputLog;
use crate::extractor::report::StopReason;
use crate::source::{DataSource, IdPredicate, PartitionFile};
use crate::ui::progress::SharedProgress;
use crate::ui::GracefulShutdown;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Work the engine is handed for one run.
#[derive(Debug, Clone, Default)]
pub struct ScanPlan {
    /// Partitions after the resume point, in listing order
    pub partitions: Vec<PartitionFile>,
    /// Previously failed partitions to re-read before `partitions`
    pub retries: Vec<PartitionFile>,
    /// 1-based position of `partitions[0]` in the full listing
    pub first_position: usize,
    pub total_partitions: usize,
    pub found: HashSet<i64>,
    pub remaining: HashSet<i64>,
    pub checkpoint: Checkpoint,
}

impl ScanPlan {
    pub fn scheduled(&self) -> usize {
        self.retries.len() + self.partitions.len()
    }
}

/// Notifications for whoever is driving the terminal.
#[derive(Debug)]
pub enum EngineEvent<'a> {
    Started {
        partition: &'a PartitionFile,
        position: usize,
        total: usize,
        remaining_ids: usize,
        retry: bool,
    },
    Finished {
        partition: &'a PartitionFile,
        rows: u64,
        found_ids: usize,
        remaining_ids: usize,
        written: u64,
        elapsed: Duration,
    },
    Failed {
        partition: &'a PartitionFile,
        error: &'a IdSiftError,
    },
}

#[derive(Debug, Clone)]
pub struct FileFailure {
    pub partition: PartitionFile,
    pub reason: String,
}

#[derive(Debug)]
pub struct EngineOutcome {
    pub found: HashSet<i64>,
    pub remaining: HashSet<i64>,
    pub written: u64,
    pub partitions_scanned: usize,
    pub failures: Vec<FileFailure>,
    pub stop_reason: StopReason,
    pub checkpoint: Checkpoint,
}

type Observer = Box<dyn Fn(&EngineEvent<'_>) + Send>;

/// Sequential scan loop: one partition at a time, checkpoint after each.
pub struct ExtractionEngine {
    source: Arc<dyn DataSource>,
    id_field: String,
    output: OutputLog,
    checkpoints: CheckpointStore,
    progress: SharedProgress,
    shutdown: Option<GracefulShutdown>,
    observer: Option<Observer>,
}

impl ExtractionEngine {
    pub fn new(
        source: Arc<dyn DataSource>,
        id_field: impl Into<String>,
        output: OutputLog,
        checkpoints: CheckpointStore,
        progress: SharedProgress,
    ) -> Self {
        Self {
            source,
            id_field: id_field.into(),
            output,
            checkpoints,
            progress,
            shutdown: None,
            observer: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: GracefulShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&EngineEvent<'_>) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn run(mut self, plan: ScanPlan) -> Result<EngineOutcome> {
        let ScanPlan {
            partitions,
            retries,
            first_position,
            total_partitions,
            mut found,
            mut remaining,
            mut checkpoint,
        } = plan;

        let mut failures = Vec::new();
        let mut scanned = 0usize;
        let mut stop_reason = StopReason::Exhausted;

        let retry_iter = retries.iter().map(|p| (p, true, 0));
        let regular_iter = partitions
            .iter()
            .enumerate()
            .map(|(i, p)| (p, false, first_position + i));

        for (partition, retry, position) in retry_iter.chain(regular_iter) {
            if remaining.is_empty() {
                stop_reason = StopReason::AllFound;
                break;
            }

            if self.shutdown.as_ref().is_some_and(|s| !s.is_running()) {
                stop_reason = StopReason::Interrupted;
                break;
            }

            self.emit(EngineEvent::Started {
                partition,
                position,
                total: total_partitions,
                remaining_ids: remaining.len(),
                retry,
            });

            let started = Instant::now();
            let read = {
                let predicate = IdPredicate::new(&self.id_field, &remaining);
                self.source.read_filtered(partition, &predicate)
            };

            let mut rows_written = 0u64;
            let failed = match read {
                Ok(rows) => {
                    for row in rows {
                        let row = row.normalize();
                        if let Some(id) = row.id(&self.id_field) {
                            found.insert(id);
                            remaining.remove(&id);
                        }
                        self.output.append(&row)?;
                        rows_written += 1;
                    }
                    // Rows must be durable before the checkpoint moves past them
                    self.output.sync()?;
                    checkpoint.clear_skipped(partition);
                    false
                }
                Err(error) => {
                    tracing::warn!(partition = %partition, error = %error, "partition read failed, treating as empty");
                    self.emit(EngineEvent::Failed {
                        partition,
                        error: &error,
                    });
                    checkpoint.record_skipped(partition);
                    failures.push(FileFailure {
                        partition: partition.clone(),
                        reason: error.to_string(),
                    });
                    true
                }
            };

            if !retry {
                checkpoint.record_completed(partition);
            }
            self.checkpoints.save(&checkpoint)?;
            scanned += 1;

            {
                let mut state = self.progress.lock().unwrap_or_else(|e| e.into_inner());
                state.file_finished(partition.as_str(), rows_written, failed, remaining.len());
            }

            tracing::info!(
                partition = %partition,
                rows = rows_written,
                found = found.len(),
                remaining = remaining.len(),
                written = self.output.written(),
                "partition finished"
            );

            self.emit(EngineEvent::Finished {
                partition,
                rows: rows_written,
                found_ids: found.len(),
                remaining_ids: remaining.len(),
                written: self.output.written(),
                elapsed: started.elapsed(),
            });
        }

        // The loop may also end because the last file emptied the set
        if remaining.is_empty() && stop_reason == StopReason::Exhausted {
            stop_reason = StopReason::AllFound;
        }

        Ok(EngineOutcome {
            found,
            remaining,
            written: self.output.written(),
            partitions_scanned: scanned,
            failures,
            stop_reason,
            checkpoint,
        })
    }

    fn emit(&self, event: EngineEvent<'_>) {
        if let Some(ref observer) = self.observer {
            observer(&event);
        }
    }
}
