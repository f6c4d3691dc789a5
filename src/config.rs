use crate::error::{IdSiftError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory path or file:// URL holding the partitions
    pub location: String,
    pub extensions: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub max_depth: usize,
    pub id_field: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub missing_sample: usize,
    pub write_report: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    pub workload_path: PathBuf,
    pub resume: bool,
    pub heartbeat_secs: u64,
    pub retry_skipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            location: ".".to_string(),
            extensions: vec![
                "parquet".to_string(),
                "jsonl".to_string(),
                "ndjson".to_string(),
            ],
            exclude_patterns: vec![r"(^|/)_".to_string(), r"\.crc$".to_string()],
            max_depth: 4,
            id_field: "id".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("subset_articles.jsonl"),
            checkpoint_path: PathBuf::from("subset_articles.state.json"),
            missing_sample: 20,
            write_report: false,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workload_path: PathBuf::from("queries_train.json"),
            resume: false,
            heartbeat_secs: 10,
            retry_skipped: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: LogLevel::Warn,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(IdSiftError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| IdSiftError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| IdSiftError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["idsift.toml", ".idsift.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref location) = cli_args.location {
            self.source.location = location.clone();
        }

        if let Some(ref extensions) = cli_args.extensions {
            self.source.extensions = extensions
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(ref exclude) = cli_args.exclude {
            self.source.exclude_patterns.extend(exclude.clone());
        }

        if let Some(ref id_field) = cli_args.id_field {
            self.source.id_field = id_field.clone();
        }

        if let Some(ref workload) = cli_args.workload_path {
            self.run.workload_path = workload.clone();
        }

        if let Some(ref output) = cli_args.output_path {
            self.output.output_path = output.clone();
        }

        if let Some(ref checkpoint) = cli_args.checkpoint_path {
            self.output.checkpoint_path = checkpoint.clone();
        }

        if let Some(sample) = cli_args.missing_sample {
            self.output.missing_sample = sample;
        }

        if cli_args.write_report {
            self.output.write_report = true;
        }

        if cli_args.resume {
            self.run.resume = true;
        }

        if cli_args.retry_skipped {
            self.run.retry_skipped = true;
        }

        if let Some(secs) = cli_args.heartbeat_secs {
            self.run.heartbeat_secs = secs;
        }

        if let Some(level) = cli_args.log_level {
            self.logging.level = level;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| IdSiftError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| IdSiftError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.location.trim().is_empty() {
            return Err(IdSiftError::Config {
                message: "Source location must not be empty".to_string(),
            });
        }

        if self.source.extensions.is_empty() {
            return Err(IdSiftError::Config {
                message: "At least one partition extension must be specified".to_string(),
            });
        }

        if self.source.max_depth == 0 {
            return Err(IdSiftError::Config {
                message: "Maximum scan depth must be greater than 0".to_string(),
            });
        }

        if self.source.id_field.trim().is_empty() {
            return Err(IdSiftError::Config {
                message: "ID field name must not be empty".to_string(),
            });
        }

        for pattern in &self.source.exclude_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(IdSiftError::Config {
                    message: format!("Invalid exclude pattern {:?}: {}", pattern, e),
                });
            }
        }

        if self.output.output_path == self.output.checkpoint_path {
            return Err(IdSiftError::Config {
                message: "Output log and checkpoint must be different files".to_string(),
            });
        }

        for path in [&self.output.output_path, &self.output.checkpoint_path] {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(IdSiftError::Config {
                        message: format!("Parent directory does not exist: {}", parent.display()),
                    });
                }
            }
        }

        Ok(())
    }

    /// Heartbeat period, never shorter than one second.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.run.heartbeat_secs.max(1))
    }

    pub fn report_path(&self) -> PathBuf {
        let mut name = self.output.output_path.as_os_str().to_os_string();
        name.push(".report.json");
        PathBuf::from(name)
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub location: Option<String>,
    pub extensions: Option<String>,
    pub exclude: Option<Vec<String>>,
    pub id_field: Option<String>,
    pub workload_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub checkpoint_path: Option<PathBuf>,
    pub missing_sample: Option<usize>,
    pub write_report: bool,
    pub resume: bool,
    pub retry_skipped: bool,
    pub heartbeat_secs: Option<u64>,
    pub log_level: Option<LogLevel>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    pub fn with_extensions(mut self, extensions: Option<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_exclude(mut self, exclude: Option<Vec<String>>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_id_field(mut self, id_field: Option<String>) -> Self {
        self.id_field = id_field;
        self
    }

    pub fn with_workload_path(mut self, path: Option<PathBuf>) -> Self {
        self.workload_path = path;
        self
    }

    pub fn with_output_path(mut self, path: Option<PathBuf>) -> Self {
        self.output_path = path;
        self
    }

    pub fn with_checkpoint_path(mut self, path: Option<PathBuf>) -> Self {
        self.checkpoint_path = path;
        self
    }

    pub fn with_missing_sample(mut self, sample: Option<usize>) -> Self {
        self.missing_sample = sample;
        self
    }

    pub fn with_write_report(mut self, write_report: bool) -> Self {
        self.write_report = write_report;
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_retry_skipped(mut self, retry: bool) -> Self {
        self.retry_skipped = retry;
        self
    }

    pub fn with_heartbeat_secs(mut self, secs: Option<u64>) -> Self {
        self.heartbeat_secs = secs;
        self
    }

    pub fn with_log_level(mut self, level: Option<LogLevel>) -> Self {
        self.log_level = level;
        self
    }
}
