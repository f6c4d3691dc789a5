pub mod local;
pub mod partition_filter;
pub mod partition_scanner;
pub mod readers;
pub mod value;

pub use local::LocalPartitionSource;
pub use partition_filter::PartitionFilter;
pub use partition_scanner::{PartitionScanner, ScanStatistics};
pub use value::{Row, Value};

use crate::error::Result;
use std::collections::HashSet;
use std::fmt;

/// Identifier of one independently readable unit of source data.
///
/// Ordering is plain lexicographic ordering of the identifier, which is what
/// makes a persisted `last_completed_file` meaningful across runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionFile(String);

impl PartitionFile {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartitionFile {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// ID-membership predicate handed to a [`DataSource`] so it can drop
/// non-matching rows before they are transferred.
#[derive(Debug, Clone, Copy)]
pub struct IdPredicate<'a> {
    id_field: &'a str,
    ids: &'a HashSet<i64>,
}

impl<'a> IdPredicate<'a> {
    pub fn new(id_field: &'a str, ids: &'a HashSet<i64>) -> Self {
        Self { id_field, ids }
    }

    pub fn id_field(&self) -> &str {
        self.id_field
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn matches_value(&self, value: &Value) -> bool {
        value.as_id().is_some_and(|id| self.contains(id))
    }

    pub fn matches(&self, row: &Row) -> bool {
        row.id(self.id_field).is_some_and(|id| self.contains(id))
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Capability interface over wherever the partitions live.
///
/// `list_partitions` must return the same sorted sequence on every call for an
/// unchanged source. `read_filtered` returns only rows accepted by the
/// predicate; any error is reported for the whole partition.
pub trait DataSource: Send + Sync {
    fn list_partitions(&self) -> Result<Vec<PartitionFile>>;

    fn read_filtered(&self, partition: &PartitionFile, predicate: &IdPredicate<'_>)
        -> Result<Vec<Row>>;

    /// Human readable location used in logs and reports.
    fn describe(&self) -> String {
        "custom data source".to_string()
    }
}
