use crate::config::SourceConfig;
use regex::Regex;
use std::path::Path;

/// Decides which files under a source location are partitions.
pub struct PartitionFilter {
    extensions: Vec<String>,
    exclude_patterns: Vec<Regex>,
}

/// On-disk encoding of one partition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionFormat {
    Parquet,
    JsonLines,
}

impl PartitionFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension().and_then(|s| s.to_str())?.to_lowercase();
        match extension.as_str() {
            "parquet" | "parq" | "pq" => Some(PartitionFormat::Parquet),
            "jsonl" | "ndjson" | "json" => Some(PartitionFormat::JsonLines),
            _ => None,
        }
    }
}

impl PartitionFilter {
    pub fn new(config: &SourceConfig) -> Self {
        // Patterns are checked by Config::validate, bad ones are ignored here
        let exclude_patterns = config
            .exclude_patterns
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect();

        Self {
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
        }
    }

    /// `relative_path` uses forward slashes regardless of platform.
    pub fn is_partition(&self, relative_path: &str) -> bool {
        let path = Path::new(relative_path);

        let extension_ok = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false);

        if !extension_ok {
            return false;
        }

        // Only formats we can decode are partitions
        if PartitionFormat::from_path(path).is_none() {
            return false;
        }

        !self.matches_any_pattern(relative_path)
    }

    pub fn should_traverse_directory(&self, path: &Path) -> bool {
        match path.file_name().and_then(|s| s.to_str()) {
            // Hidden directories hold engine metadata, not data
            Some(dir_name) => !dir_name.starts_with('.'),
            None => true,
        }
    }

    pub fn matches_any_pattern(&self, text: &str) -> bool {
        self.exclude_patterns
            .iter()
            .any(|pattern| pattern.is_match(text))
    }

    pub fn get_extensions(&self) -> &Vec<String> {
        &self.extensions
    }
}

impl Default for PartitionFilter {
    fn default() -> Self {
        Self::new(&SourceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> SourceConfig {
        SourceConfig {
            extensions: vec!["parquet".to_string(), ".JSONL".to_string()],
            exclude_patterns: vec![r"(^|/)_".to_string(), r"\.tmp\.".to_string()],
            ..SourceConfig::default()
        }
    }

    #[test]
    fn test_partition_detection() {
        let filter = PartitionFilter::new(&create_test_config());

        assert!(filter.is_partition("part-00000.parquet"));
        assert!(filter.is_partition("year=2024/part-00001.PARQUET"));
        assert!(filter.is_partition("dump-0001.jsonl"));

        assert!(!filter.is_partition("part-00000.csv"));
        assert!(!filter.is_partition("README"));
        // ndjson is decodable but not in this configuration
        assert!(!filter.is_partition("dump.ndjson"));
    }

    #[test]
    fn test_exclude_patterns() {
        let filter = PartitionFilter::new(&create_test_config());

        assert!(!filter.is_partition("_SUCCESS.parquet"));
        assert!(!filter.is_partition("year=2024/_metadata.parquet"));
        assert!(!filter.is_partition("part-0.tmp.parquet"));
        assert!(filter.is_partition("year=2024/part_0.parquet"));
    }

    #[test]
    fn test_directory_traversal_rules() {
        let filter = PartitionFilter::default();

        assert!(filter.should_traverse_directory(Path::new("year=2024")));
        assert!(!filter.should_traverse_directory(Path::new(".spark-staging")));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            PartitionFormat::from_path(Path::new("a/b.parquet")),
            Some(PartitionFormat::Parquet)
        );
        assert_eq!(
            PartitionFormat::from_path(Path::new("b.NDJSON")),
            Some(PartitionFormat::JsonLines)
        );
        assert_eq!(PartitionFormat::from_path(Path::new("b.csv")), None);
    }
}
