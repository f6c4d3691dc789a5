use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdSiftError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Workload document could not be read: {path}")]
    WorkloadUnreadable { path: PathBuf, reason: String },

    #[error("Workload document yielded no usable target IDs: {path}")]
    EmptyTargetSet { path: PathBuf },

    #[error("No partition files found at {location}")]
    NoPartitions {
        location: String,
        searched_extensions: Vec<String>,
    },

    #[error("Unsupported source location: {location}")]
    UnsupportedSource { location: String },

    #[error("Failed to read partition {partition}: {reason}")]
    PartitionRead { partition: String, reason: String },

    #[error("Checkpoint could not be written to {path}: {reason}")]
    CheckpointWrite { path: PathBuf, reason: String },

    #[error("Operation was cancelled by user")]
    Cancelled,
}

impl IdSiftError {
    /// Errors that stop a run before any extraction happens.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            IdSiftError::Config { .. }
                | IdSiftError::WorkloadUnreadable { .. }
                | IdSiftError::EmptyTargetSet { .. }
                | IdSiftError::NoPartitions { .. }
                | IdSiftError::UnsupportedSource { .. }
        )
    }

    pub fn partition_read<P: Into<String>, E: std::fmt::Display>(partition: P, err: E) -> Self {
        IdSiftError::PartitionRead {
            partition: partition.into(),
            reason: err.to_string(),
        }
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for IdSiftError {
    fn user_message(&self) -> String {
        match self {
            IdSiftError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            IdSiftError::WorkloadUnreadable { path, reason } => {
                format!("Could not read workload {}: {}", path.display(), reason)
            }
            IdSiftError::EmptyTargetSet { path } => {
                format!("No integer IDs found in workload {}", path.display())
            }
            IdSiftError::NoPartitions {
                location,
                searched_extensions,
            } => {
                format!(
                    "No partition files with extensions [{}] found at {}",
                    searched_extensions.join(", "),
                    location
                )
            }
            IdSiftError::UnsupportedSource { location } => {
                format!("Unsupported source location: {}", location)
            }
            IdSiftError::PartitionRead { partition, reason } => {
                format!("Partition {} could not be read: {}", partition, reason)
            }
            IdSiftError::CheckpointWrite { path, reason } => {
                format!("Checkpoint {} could not be written: {}", path.display(), reason)
            }
            IdSiftError::Cancelled => "Operation was cancelled by user".to_string(),
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            IdSiftError::Config { .. } => Some(
                "Check your configuration file syntax and the values passed on the command line.".to_string()
            ),
            IdSiftError::WorkloadUnreadable { .. } => Some(
                "The workload must be a JSON object mapping query keys to arrays of IDs.".to_string()
            ),
            IdSiftError::EmptyTargetSet { .. } => Some(
                "Make sure the workload arrays contain numeric IDs (numbers or numeric strings).".to_string()
            ),
            IdSiftError::NoPartitions { .. } => Some(
                "Check the source location or widen the accepted extensions with --extensions.".to_string()
            ),
            IdSiftError::UnsupportedSource { .. } => Some(
                "Pass a local directory or a file:// URL. Remote stores need their own DataSource implementation.".to_string()
            ),
            IdSiftError::CheckpointWrite { .. } | IdSiftError::Io(_) => Some(
                "Ensure the output and checkpoint locations are writable, then rerun with --resume.".to_string()
            ),
            IdSiftError::Cancelled => Some(
                "Rerun with --resume to continue after the last completed partition.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for IdSiftError {
    fn from(error: toml::de::Error) -> Self {
        IdSiftError::Config {
            message: error.to_string(),
        }
    }
}

impl From<url::ParseError> for IdSiftError {
    fn from(error: url::ParseError) -> Self {
        IdSiftError::Config {
            message: format!("invalid source URL: {}", error),
        }
    }
}

impl From<walkdir::Error> for IdSiftError {
    fn from(error: walkdir::Error) -> Self {
        // Display carries the offending path, the bare io error does not
        let kind = error
            .io_error()
            .map(|e| e.kind())
            .unwrap_or(std::io::ErrorKind::Other);
        IdSiftError::Io(std::io::Error::new(kind, error.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, IdSiftError>;
