use crate::config::{CliOverrides, Config, LogLevel};
use crate::error::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "idsift")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract a known subset of records, by ID, from partitioned data files")]
#[command(
    long_about = "idsift collects the target IDs named in a query workload, scans every \
                  partition file of a dataset in a fixed order and appends the matching \
                  records to a JSON-lines log. Progress is checkpointed after each \
                  partition so an interrupted run can be resumed with --resume."
)]
#[command(before_help = "🔎 idsift - Resumable ID-filtered extraction")]
#[command(after_help = "EXAMPLES:\n  \
    idsift /data/articles --queries queries_train.json\n  \
    idsift file:///data/articles --out subset.jsonl --state subset.state.json\n  \
    idsift /data/articles --resume --heartbeat 30\n  \
    idsift /data/articles --resume --retry-skipped --write-report\n  \
    idsift --generate-config --config idsift.toml")]
pub struct Cli {
    /// Partition directory or file:// URL (overrides [source].location)
    pub source: Option<String>,

    /// Query workload JSON (object of key -> list of IDs)
    #[arg(short = 'w', long = "queries")]
    pub queries: Option<PathBuf>,

    /// Output JSON-lines log
    #[arg(short, long = "out")]
    pub output: Option<PathBuf>,

    /// Checkpoint file
    #[arg(short, long = "state")]
    pub state: Option<PathBuf>,

    /// Resume from the checkpoint and append to the existing output
    #[arg(short, long)]
    pub resume: bool,

    /// Re-read partitions recorded as skipped before the resume point
    #[arg(long, requires = "resume")]
    pub retry_skipped: bool,

    /// Seconds between progress heartbeats (minimum 1)
    #[arg(long = "heartbeat", value_name = "SECS")]
    pub heartbeat: Option<u64>,

    /// Name of the ID field in partition rows
    #[arg(long)]
    pub id_field: Option<String>,

    /// Partition extensions to scan (comma-separated)
    #[arg(
        short,
        long,
        help = "Partition file extensions to scan (e.g., parquet,jsonl)"
    )]
    pub extensions: Option<String>,

    /// Extra exclude patterns (regex, matched against relative paths)
    #[arg(short = 'x', long, value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// How many missing IDs to list in the final summary
    #[arg(long)]
    pub missing_sample: Option<usize>,

    /// Save the final report next to the output as <out>.report.json
    #[arg(long)]
    pub write_report: bool,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Diagnostic log level (RUST_LOG takes precedence)
    #[arg(long, value_parser = parse_log_level)]
    pub log_level: Option<LogLevel>,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Dry run (show what would be done without executing)
    #[arg(long, help = "List targets and partitions without extracting anything")]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_location(self.source.clone())
            .with_extensions(self.extensions.clone())
            .with_exclude(self.exclude.clone())
            .with_id_field(self.id_field.clone())
            .with_workload_path(self.queries.clone())
            .with_output_path(self.output.clone())
            .with_checkpoint_path(self.state.clone())
            .with_missing_sample(self.missing_sample)
            .with_write_report(self.write_report)
            .with_resume(self.resume)
            .with_retry_skipped(self.retry_skipped)
            .with_heartbeat_secs(self.heartbeat)
            .with_log_level(self.log_level)
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose > 0 && !self.quiet
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

pub fn parse_log_level(s: &str) -> std::result::Result<LogLevel, String> {
    match s.trim().to_lowercase().as_str() {
        "trace" => Ok(LogLevel::Trace),
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" | "warning" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        other => Err(format!(
            "Unknown log level '{}'. Expected one of: trace, debug, info, warn, error",
            other
        )),
    }
}
