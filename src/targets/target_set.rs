use crate::error::{IdSiftError, Result};
use crate::source::Value;
use std::collections::HashSet;
use std::path::Path;

/// The immutable set of IDs a run has to locate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSet {
    ids: HashSet<i64>,
}

/// Counts gathered while reading a workload document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStatistics {
    pub queries: usize,
    pub values_seen: usize,
    pub values_dropped: usize,
    pub unique_ids: usize,
}

impl TargetSet {
    /// Read a query-workload JSON document from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<(Self, LoadStatistics)> {
        let path = path.as_ref();

        let content =
            std::fs::read_to_string(path).map_err(|e| IdSiftError::WorkloadUnreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let document: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| IdSiftError::WorkloadUnreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Self::from_workload(&document, path)
    }

    /// Collect every integer-coercible value under every query key.
    ///
    /// Values that do not coerce are dropped silently. A document that is not
    /// an object, or that yields no IDs at all, is a configuration error.
    pub fn from_workload(document: &serde_json::Value, origin: &Path) -> Result<(Self, LoadStatistics)> {
        let queries = document
            .as_object()
            .ok_or_else(|| IdSiftError::WorkloadUnreadable {
                path: origin.to_path_buf(),
                reason: "expected a JSON object of query key to ID list".to_string(),
            })?;

        let mut ids = HashSet::new();
        let mut stats = LoadStatistics {
            queries: queries.len(),
            ..LoadStatistics::default()
        };

        for doc_ids in queries.values() {
            let values: &[serde_json::Value] = match doc_ids {
                serde_json::Value::Array(items) => items,
                scalar => std::slice::from_ref(scalar),
            };

            for raw in values {
                stats.values_seen += 1;
                match Value::from(raw.clone()).as_id() {
                    Some(id) => {
                        ids.insert(id);
                    }
                    None => stats.values_dropped += 1,
                }
            }
        }

        if ids.is_empty() {
            return Err(IdSiftError::EmptyTargetSet {
                path: origin.to_path_buf(),
            });
        }

        stats.unique_ids = ids.len();
        Ok((Self { ids }, stats))
    }

    pub fn from_ids<I: IntoIterator<Item = i64>>(ids: I) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &HashSet<i64> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Targets not yet in `found`.
    pub fn remaining(&self, found: &HashSet<i64>) -> HashSet<i64> {
        self.ids.difference(found).copied().collect()
    }

    /// Missing IDs in ascending order.
    pub fn missing_sorted(&self, found: &HashSet<i64>) -> Vec<i64> {
        let mut missing: Vec<i64> = self.remaining(found).into_iter().collect();
        missing.sort_unstable();
        missing
    }
}
