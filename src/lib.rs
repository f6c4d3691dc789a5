pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod source;
pub mod targets;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config, LoggingConfig, OutputConfig, RunConfig, SourceConfig};
pub use error::{IdSiftError, Result, UserFriendlyError};

// Core functionality re-exports
pub use extractor::{
    Checkpoint, CheckpointStore, EngineEvent, ExtractionEngine, ExtractionReport, OutputLog,
    ScanPlan, StopReason,
};
pub use source::{DataSource, IdPredicate, LocalPartitionSource, PartitionFile, Row, Value};
pub use targets::{LoadStatistics, TargetSet};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

use crate::extractor::{hydrate_found_ids, Hydration, RunSummary};
use crate::source::ScanStatistics;
use crate::ui::{ProgressAwareOutput, ProgressReporter, ProgressState};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task;

/// Main library interface: wires targets, checkpoint, source, engine and
/// heartbeat together for one run.
pub struct IdSift {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
}

/// What a run would do, computed without touching the output or checkpoint.
#[derive(Debug, Clone)]
pub struct RunPreview {
    pub target_ids: usize,
    pub load_statistics: LoadStatistics,
    pub already_found: usize,
    pub partitions: ScanStatistics,
    pub resume_after: Option<String>,
    pub pending_partitions: usize,
    pub retry_partitions: usize,
}

impl IdSift {
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);
        let shutdown = GracefulShutdown::new()?;

        Ok(Self {
            config,
            output_formatter,
            progress_manager,
            shutdown,
        })
    }

    /// Create an instance without registering a Ctrl+C handler.
    pub fn new_for_test(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        Self {
            config,
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            progress_manager: ProgressManager::new(false),
            shutdown: GracefulShutdown::new_for_test(),
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = match cli_args.output_format {
            crate::cli::OutputFormat::Human => OutputMode::Human,
            crate::cli::OutputFormat::Json => OutputMode::Json,
            crate::cli::OutputFormat::Plain => OutputMode::Plain,
        };

        Self::new(config, output_mode, cli_args.verbose, cli_args.quiet)
    }

    /// Run against the configured local partition directory.
    pub async fn run(&self) -> Result<ExtractionReport> {
        let source = LocalPartitionSource::new(&self.config.source)?;
        self.run_with_source(Arc::new(source)).await
    }

    /// Run against any [`DataSource`].
    pub async fn run_with_source(&self, source: Arc<dyn DataSource>) -> Result<ExtractionReport> {
        let start_time = Instant::now();
        self.shutdown.check_shutdown()?;

        // Step 1: target IDs
        let targets = self.load_targets()?;
        self.shutdown.check_shutdown()?;

        // Step 2: recovery signals
        let store = CheckpointStore::new(&self.config.output.checkpoint_path);
        let (hydration, checkpoint) = self.recover(&store)?;
        let remaining = targets.remaining(&hydration.found);

        // Step 3: partition listing
        self.output_formatter.start_operation("Listing partition files");
        let partitions = source.list_partitions()?;
        if partitions.is_empty() {
            return Err(IdSiftError::NoPartitions {
                location: source.describe(),
                searched_extensions: self.config.source.extensions.clone(),
            });
        }
        if let (Some(first), Some(last)) = (partitions.first(), partitions.last()) {
            self.output_formatter
                .debug(&format!("Partition range: {} .. {}", first, last));
        }
        self.shutdown.check_shutdown()?;

        let resume_index = checkpoint.resume_index(&partitions);
        let retries = if self.config.run.resume && self.config.run.retry_skipped {
            checkpoint.retry_candidates(&partitions)
        } else {
            Vec::new()
        };

        self.output_formatter.info(&format!(
            "{} partitions listed, {} already done, {} to retry",
            partitions.len(),
            resume_index,
            retries.len()
        ));
        tracing::info!(
            source = %source.describe(),
            partitions = partitions.len(),
            resume_index,
            retries = retries.len(),
            remaining_ids = remaining.len(),
            "scan planned"
        );

        // Step 4: scan. Earlier state is only discarded once there is something to scan
        if !self.config.run.resume {
            store.save(&Checkpoint::default())?;
        }
        let output = OutputLog::open(&self.config.output.output_path, self.config.run.resume)?;
        let plan = ScanPlan {
            partitions: partitions[resume_index..].to_vec(),
            retries,
            first_position: resume_index + 1,
            total_partitions: partitions.len(),
            found: hydration.found.clone(),
            remaining,
            checkpoint,
        };

        let outcome = self.scan(source.clone(), output, store, plan).await?;

        // Step 5: reconciliation
        let missing = targets.missing_sorted(&outcome.found);
        let report = ExtractionReport {
            source: source.describe(),
            output_path: self.config.output.output_path.clone(),
            checkpoint_path: self.config.output.checkpoint_path.clone(),
            resumed: self.config.run.resume,
            stop_reason: outcome.stop_reason,
            summary: RunSummary {
                target_ids: targets.len(),
                found_ids: targets.len() - missing.len(),
                missing_ids: missing.len(),
                hydrated_ids: hydration.found.len(),
                records_written: outcome.written,
                partitions_total: partitions.len(),
                partitions_already_done: resume_index,
                partitions_scanned: outcome.partitions_scanned,
                partitions_failed: outcome.failures.len(),
                duration_secs: start_time.elapsed().as_secs_f64(),
            },
            missing_sample: missing
                .into_iter()
                .take(self.config.output.missing_sample)
                .collect(),
            failed_partitions: outcome
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.partition, f.reason))
                .collect(),
            skipped_in_checkpoint: outcome.checkpoint.skipped_files.clone(),
            completed_at: chrono::Utc::now(),
        };

        tracing::info!(
            found = report.summary.found_ids,
            missing = report.summary.missing_ids,
            written = report.summary.records_written,
            stop_reason = ?report.stop_reason,
            "run finished"
        );

        if self.config.output.write_report {
            let report_path = self.config.report_path();
            report.save_json(&report_path)?;
            self.output_formatter
                .info(&format!("Report saved to {}", report_path.display()));
        }

        Ok(report)
    }

    fn load_targets(&self) -> Result<TargetSet> {
        self.output_formatter.start_operation("Loading target IDs");

        let (targets, stats) = TargetSet::load(&self.config.run.workload_path)?;
        if stats.values_dropped > 0 {
            self.output_formatter.warning(&format!(
                "{} workload values were not integer IDs and were dropped",
                stats.values_dropped
            ));
        }
        self.output_formatter.info(&format!(
            "{} unique target IDs from {} queries",
            targets.len(),
            stats.queries
        ));
        tracing::debug!(?stats, "workload loaded");

        Ok(targets)
    }

    /// Found IDs and checkpoint to start from. A fresh run ignores both.
    fn recover(&self, store: &CheckpointStore) -> Result<(Hydration, Checkpoint)> {
        if !self.config.run.resume {
            return Ok((Hydration::default(), Checkpoint::default()));
        }

        let hydration =
            hydrate_found_ids(&self.config.output.output_path, &self.config.source.id_field)?;
        if hydration.malformed_lines > 0 {
            self.output_formatter.warning(&format!(
                "Skipped {} unreadable lines in {}",
                hydration.malformed_lines,
                self.config.output.output_path.display()
            ));
        }

        let checkpoint = store.load();
        self.output_formatter.info(&format!(
            "Resuming: {} IDs already extracted, last completed partition: {}",
            hydration.found.len(),
            checkpoint.last_completed_file.as_deref().unwrap_or("none")
        ));

        Ok((hydration, checkpoint))
    }

    async fn scan(
        &self,
        source: Arc<dyn DataSource>,
        output: OutputLog,
        store: CheckpointStore,
        plan: ScanPlan,
    ) -> Result<extractor::EngineOutcome> {
        self.output_formatter.start_operation("Scanning partitions");

        let progress = ProgressState::shared(plan.scheduled(), plan.remaining.len());
        let bar = self.progress_manager.create_file_progress(plan.scheduled() as u64);

        let heartbeat_output = ProgressAwareOutput::new(self.output_formatter.clone(), Some(bar.clone()));
        let reporter = ProgressReporter::spawn(
            progress.clone(),
            self.config.heartbeat_interval(),
            move |snapshot| {
                tracing::info!(
                    files_done = snapshot.files_done,
                    files_total = snapshot.files_total,
                    remaining_ids = snapshot.remaining_ids,
                    eta_secs = snapshot.eta_secs,
                    "heartbeat"
                );
                heartbeat_output.heartbeat(snapshot);
            },
        );

        let event_output = ProgressAwareOutput::new(self.output_formatter.clone(), Some(bar.clone()));
        let event_bar = bar.clone();
        let engine = ExtractionEngine::new(
            source,
            self.config.source.id_field.clone(),
            output,
            store,
            progress,
        )
        .with_shutdown(self.shutdown.clone())
        .with_observer(move |event| match event {
            EngineEvent::Started {
                partition,
                position,
                total,
                remaining_ids,
                retry,
            } => {
                let label = if *retry { "retry" } else { "partition" };
                event_bar.set_message(format!("{} {} ({} ids left)", label, partition, remaining_ids));
                event_output.info(&format!(
                    "[{}] {}/{} {}",
                    label, position, total, partition
                ));
            }
            EngineEvent::Finished { .. } => event_bar.inc(1),
            EngineEvent::Failed { partition, error } => {
                event_output.warning(&format!("Skipping {}: {}", partition, error));
            }
        });

        let result = task::spawn_blocking(move || engine.run(plan))
            .await
            .map_err(|e| IdSiftError::Config {
                message: format!("Extraction task failed: {}", e),
            });

        // The heartbeat must be gone before the summary, success or not
        let reports = reporter.stop().await;
        tracing::debug!(reports, "progress reporter stopped");

        let outcome = result??;
        ui::progress::finish_progress_with_summary(
            &bar,
            &format!("Scanned {} partitions", outcome.partitions_scanned),
            bar.elapsed(),
        );
        self.progress_manager.clear();

        Ok(outcome)
    }

    /// Inspect workload, checkpoint and listing without writing anything.
    pub fn preview(&self) -> Result<RunPreview> {
        let (targets, load_statistics) = TargetSet::load(&self.config.run.workload_path)?;
        let source = LocalPartitionSource::new(&self.config.source)?;
        let partitions = source.list_partitions()?;

        let (already_found, checkpoint) = if self.config.run.resume {
            let hydration =
                hydrate_found_ids(&self.config.output.output_path, &self.config.source.id_field)?;
            let store = CheckpointStore::new(&self.config.output.checkpoint_path);
            let found = targets.len() - targets.remaining(&hydration.found).len();
            (found, store.load())
        } else {
            (0, Checkpoint::default())
        };

        let resume_index = checkpoint.resume_index(&partitions);
        let retry_partitions = if self.config.run.resume && self.config.run.retry_skipped {
            checkpoint.retry_candidates(&partitions).len()
        } else {
            0
        };

        Ok(RunPreview {
            target_ids: targets.len(),
            load_statistics,
            already_found,
            partitions: source.scanner().get_statistics(&partitions),
            resume_after: checkpoint.last_completed_file,
            pending_partitions: partitions.len() - resume_index,
            retry_partitions,
        })
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn progress_manager(&self) -> &ProgressManager {
        &self.progress_manager
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    /// Handle error with user-friendly output
    pub fn handle_error(&self, error: &IdSiftError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

/// Get version information
pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Get build information
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        target: std::env::consts::ARCH.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_date: &'static str,
    pub target: String,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "idsift {} ({}) built on {} for {}",
            self.version, self.git_hash, self.build_date, self.target
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new(workload: &str) -> Self {
            let dir = TempDir::new().unwrap();
            fs::create_dir(dir.path().join("data")).unwrap();
            fs::write(dir.path().join("queries.json"), workload).unwrap();
            Self { dir }
        }

        fn partition(&self, name: &str, ids: &[i64]) {
            let lines: Vec<String> = ids
                .iter()
                .map(|id| format!("{{\"id\": {}, \"title\": \"article {}\"}}", id, id))
                .collect();
            fs::write(self.dir.path().join("data").join(name), lines.join("\n")).unwrap();
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn config(&self, resume: bool) -> Config {
            let mut config = Config::default();
            config.source.location = self.path("data").display().to_string();
            config.run.workload_path = self.path("queries.json");
            config.run.resume = resume;
            config.output.output_path = self.path("out.jsonl");
            config.output.checkpoint_path = self.path("state.json");
            config
        }

        fn idsift(&self, config: Config) -> IdSift {
            IdSift::new_for_test(config, OutputMode::Plain, 0, true)
        }
    }

    #[tokio::test]
    async fn test_end_to_end_run() {
        let fixture = Fixture::new(r#"{"q1": [10, "30"], "q2": [20, "x"]}"#);
        fixture.partition("part-a.jsonl", &[10, 11, 30]);
        fixture.partition("part-b.jsonl", &[20, 21]);

        let report = fixture.idsift(fixture.config(false)).run().await.unwrap();

        assert_eq!(report.summary.target_ids, 3);
        assert_eq!(report.summary.found_ids, 3);
        assert_eq!(report.summary.records_written, 3);
        assert!(report.is_complete());
        assert_eq!(report.stop_reason, StopReason::AllFound);

        let content = fs::read_to_string(fixture.path("out.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(!content.contains("article 11"));
    }

    #[tokio::test]
    async fn test_resume_continues_after_checkpoint() {
        let fixture = Fixture::new(r#"{"q": [10, 20, 30]}"#);
        fixture.partition("part-a.jsonl", &[10, 30]);

        let first = fixture.idsift(fixture.config(false)).run().await.unwrap();
        assert_eq!(first.summary.missing_ids, 1);
        assert_eq!(first.missing_sample, vec![20]);
        assert_eq!(first.stop_reason, StopReason::Exhausted);

        fixture.partition("part-b.jsonl", &[20]);
        let second = fixture.idsift(fixture.config(true)).run().await.unwrap();

        assert_eq!(second.summary.hydrated_ids, 2);
        assert_eq!(second.summary.partitions_already_done, 1);
        assert_eq!(second.summary.partitions_scanned, 1);
        assert_eq!(second.summary.records_written, 1);
        assert!(second.is_complete());

        let content = fs::read_to_string(fixture.path("out.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_fresh_run_discards_previous_state() {
        let fixture = Fixture::new(r#"{"q": [1]}"#);
        fixture.partition("part-a.jsonl", &[1]);
        fs::write(fixture.path("out.jsonl"), "{\"id\": 99}\n").unwrap();
        fs::write(fixture.path("state.json"), r#"{"last_completed_file": "part-z.jsonl"}"#).unwrap();

        let report = fixture.idsift(fixture.config(false)).run().await.unwrap();
        assert_eq!(report.summary.partitions_scanned, 1);

        let content = fs::read_to_string(fixture.path("out.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(!content.contains("99"));
    }

    #[tokio::test]
    async fn test_resume_after_torn_output_line() {
        let fixture = Fixture::new(r#"{"q": [1, 2]}"#);
        fixture.partition("part-a.jsonl", &[1, 2]);
        fs::write(fixture.path("out.jsonl"), "{\"id\":1,\"ti").unwrap();

        let report = fixture.idsift(fixture.config(true)).run().await.unwrap();
        assert_eq!(report.summary.records_written, 2);
        assert!(report.is_complete());

        let rehydrated = hydrate_found_ids(fixture.path("out.jsonl"), "id").unwrap();
        assert_eq!(rehydrated.found, [1, 2].into_iter().collect());
        assert_eq!(rehydrated.malformed_lines, 0);
    }

    #[tokio::test]
    async fn test_fresh_run_without_partitions_keeps_checkpoint() {
        let fixture = Fixture::new(r#"{"q": [1]}"#);
        let previous = r#"{"last_completed_file": "part-z.jsonl", "skipped_files": []}"#;
        fs::write(fixture.path("state.json"), previous).unwrap();
        fs::write(fixture.path("out.jsonl"), "{\"id\": 1}\n").unwrap();

        let result = fixture.idsift(fixture.config(false)).run().await;
        assert!(matches!(result, Err(IdSiftError::NoPartitions { .. })));
        assert_eq!(fs::read_to_string(fixture.path("state.json")).unwrap(), previous);
        assert_eq!(fs::read_to_string(fixture.path("out.jsonl")).unwrap(), "{\"id\": 1}\n");
    }

    #[tokio::test]
    async fn test_empty_workload_is_rejected() {
        let fixture = Fixture::new(r#"{"q": ["abc", null]}"#);
        fixture.partition("part-a.jsonl", &[1]);

        let result = fixture.idsift(fixture.config(false)).run().await;
        assert!(matches!(result, Err(IdSiftError::EmptyTargetSet { .. })));
        assert!(!fixture.path("out.jsonl").exists());
    }

    #[tokio::test]
    async fn test_report_written_when_enabled() {
        let fixture = Fixture::new(r#"{"q": [1, 2]}"#);
        fixture.partition("part-a.jsonl", &[1]);

        let mut config = fixture.config(false);
        config.output.write_report = true;
        let report_path = config.report_path();

        fixture.idsift(config).run().await.unwrap();
        let saved = fs::read_to_string(report_path).unwrap();
        assert!(saved.contains("\"missing_ids\": 1"));
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let fixture = Fixture::new(r#"{"q": [1]}"#);
        fixture.partition("part-a.jsonl", &[1]);

        let idsift = fixture.idsift(fixture.config(false));
        idsift.request_shutdown();
        assert!(!idsift.is_running());
        assert!(matches!(idsift.run().await, Err(IdSiftError::Cancelled)));
    }

    #[test]
    fn test_preview() {
        let fixture = Fixture::new(r#"{"q": [1, 2, 3]}"#);
        fixture.partition("part-a.jsonl", &[1]);
        fixture.partition("part-b.jsonl", &[2]);

        let preview = fixture.idsift(fixture.config(false)).preview().unwrap();
        assert_eq!(preview.target_ids, 3);
        assert_eq!(preview.partitions.total_files, 2);
        assert_eq!(preview.pending_partitions, 2);
        assert!(preview.resume_after.is_none());
        assert!(!fixture.path("out.jsonl").exists());
    }

    #[test]
    fn test_sample_config_generation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sample.toml");

        IdSift::generate_sample_config(&config_path).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[source]"));
        assert!(content.contains("[output]"));
        assert!(content.contains("[run]"));
    }

    #[test]
    fn test_build_info_display() {
        let build_info = build_info();
        let display_string = build_info.to_string();
        assert!(display_string.contains("idsift"));
        assert!(display_string.contains(version_info()));
    }
}
