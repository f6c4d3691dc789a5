use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Counters shared between the extraction loop and the heartbeat.
///
/// Only the extraction loop mutates this; the reporter takes the lock just
/// long enough to copy a [`ProgressSnapshot`] out.
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub files_done: usize,
    pub files_total: usize,
    pub files_failed: usize,
    pub rows_written: u64,
    pub remaining_ids: usize,
    pub last_file: Option<String>,
    pub start_time: Instant,
}

pub type SharedProgress = Arc<Mutex<ProgressState>>;

impl ProgressState {
    pub fn new(files_total: usize, remaining_ids: usize) -> Self {
        Self {
            files_done: 0,
            files_total,
            files_failed: 0,
            rows_written: 0,
            remaining_ids,
            last_file: None,
            start_time: Instant::now(),
        }
    }

    pub fn shared(files_total: usize, remaining_ids: usize) -> SharedProgress {
        Arc::new(Mutex::new(Self::new(files_total, remaining_ids)))
    }

    pub fn file_finished(&mut self, name: &str, rows: u64, failed: bool, remaining_ids: usize) {
        self.files_done += 1;
        if failed {
            self.files_failed += 1;
        }
        self.rows_written += rows;
        self.remaining_ids = remaining_ids;
        self.last_file = Some(name.to_string());
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> ProgressSnapshot {
        let elapsed = now.saturating_duration_since(self.start_time).as_secs_f64();
        let avg_per_file = if self.files_done > 0 {
            elapsed / self.files_done as f64
        } else {
            0.0
        };
        let remaining_files = self.files_total.saturating_sub(self.files_done);

        ProgressSnapshot {
            elapsed_secs: elapsed,
            files_done: self.files_done,
            files_total: self.files_total,
            files_failed: self.files_failed,
            rows_written: self.rows_written,
            remaining_ids: self.remaining_ids,
            avg_per_file_secs: avg_per_file,
            eta_secs: remaining_files as f64 * avg_per_file,
            last_file: self.last_file.clone(),
        }
    }
}

/// Point-in-time view of a run, as emitted by the heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub elapsed_secs: f64,
    pub files_done: usize,
    pub files_total: usize,
    pub files_failed: usize,
    pub rows_written: u64,
    pub remaining_ids: usize,
    pub avg_per_file_secs: f64,
    pub eta_secs: f64,
    pub last_file: Option<String>,
}

impl ProgressSnapshot {
    pub fn display_line(&self) -> String {
        format!(
            "[heartbeat] elapsed={:.1}s files={}/{} avg_per_file={:.1}s eta~{} remaining_ids={} last={}",
            self.elapsed_secs,
            self.files_done,
            self.files_total,
            self.avg_per_file_secs,
            format_duration(Duration::from_secs_f64(self.eta_secs.max(0.0))),
            self.remaining_ids,
            self.last_file.as_deref().unwrap_or("-"),
        )
    }
}

/// Background task that periodically reports a [`ProgressSnapshot`].
///
/// It never decides when the run is over; the orchestrator calls
/// [`ProgressReporter::stop`] once extraction returns.
pub struct ProgressReporter {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<u64>,
}

/// Shortest period the reporter will sleep for.
pub const MIN_REPORT_INTERVAL: Duration = Duration::from_millis(10);

impl ProgressReporter {
    pub fn spawn<F>(state: SharedProgress, interval: Duration, sink: F) -> Self
    where
        F: Fn(&ProgressSnapshot) + Send + Sync + 'static,
    {
        let interval = interval.max(MIN_REPORT_INTERVAL);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut reports = 0u64;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop_rx.changed() => break,
                }

                // A fault in one cycle costs one report, never the run
                let cycle = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    let snapshot = {
                        let guard = state.lock().unwrap_or_else(|e| e.into_inner());
                        guard.snapshot()
                    };
                    sink(&snapshot);
                }));

                match cycle {
                    Ok(()) => reports += 1,
                    Err(_) => tracing::warn!("progress report failed, skipping this cycle"),
                }
            }
            reports
        });

        Self { stop_tx, handle }
    }

    /// Signal the task and wait for it; returns the number of reports made.
    pub async fn stop(self) -> u64 {
        let _ = self.stop_tx.send(true);
        match self.handle.await {
            Ok(reports) => reports,
            Err(e) => {
                tracing::warn!(error = %e, "progress reporter ended abnormally");
                0
            }
        }
    }
}

pub struct ProgressManager {
    multi_progress: MultiProgress,
    enabled: bool,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            enabled,
        }
    }

    pub fn create_file_progress(&self, total_files: u64) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = self.multi_progress.add(ProgressBar::new(total_files));
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} partitions {msg}"
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
        );
        pb.set_message("Scanning partitions...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn clear(&self) {
        if self.enabled {
            self.multi_progress.clear().ok();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new(true)
    }
}

pub fn finish_progress_with_summary(pb: &ProgressBar, message: &str, duration: Duration) {
    let final_message = format!("{} (completed in {})", message, format_duration(duration));
    pb.finish_with_message(final_message);
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
