use crate::config::SourceConfig;
use crate::error::{IdSiftError, Result};
use crate::source::partition_filter::PartitionFilter;
use crate::source::PartitionFile;
use std::path::{Component, Path};
use walkdir::{DirEntry, WalkDir};

/// Walks a local directory and produces the sorted partition listing.
pub struct PartitionScanner {
    filter: PartitionFilter,
    max_depth: usize,
}

impl PartitionScanner {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            filter: PartitionFilter::new(config),
            max_depth: config.max_depth,
        }
    }

    pub fn scan_directory<P: AsRef<Path>>(&self, root: P) -> Result<Vec<PartitionFile>> {
        let root_path = root.as_ref();

        if !root_path.is_dir() {
            return Err(IdSiftError::NoPartitions {
                location: format!("{} (not a directory)", root_path.display()),
                searched_extensions: self.filter.get_extensions().clone(),
            });
        }

        let mut partitions = Vec::new();

        let walker = WalkDir::new(root_path)
            .max_depth(self.max_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| self.should_traverse(e));

        for entry in walker {
            // An unreadable subtree would silently shift every later resume position
            let entry = entry?;

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = match relative_name(entry.path(), root_path) {
                Some(relative) => relative,
                None => continue,
            };

            if self.filter.is_partition(&relative) {
                partitions.push(PartitionFile::new(relative));
            }
        }

        if partitions.is_empty() {
            return Err(IdSiftError::NoPartitions {
                location: root_path.display().to_string(),
                searched_extensions: self.filter.get_extensions().clone(),
            });
        }

        // Resume depends on this order being identical across runs
        partitions.sort();
        partitions.dedup();

        Ok(partitions)
    }

    fn should_traverse(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || entry.file_type().is_file() {
            return true;
        }

        if entry.file_type().is_dir() {
            return self.filter.should_traverse_directory(entry.path());
        }

        false
    }

    pub fn get_statistics(&self, partitions: &[PartitionFile]) -> ScanStatistics {
        let mut files_by_extension = std::collections::BTreeMap::new();
        for partition in partitions {
            let ext = Path::new(partition.as_str())
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| s.to_lowercase())
                .unwrap_or_else(|| "no_extension".to_string());
            *files_by_extension.entry(ext).or_insert(0) += 1;
        }

        ScanStatistics {
            total_files: partitions.len(),
            files_by_extension,
            first: partitions.first().cloned(),
            last: partitions.last().cloned(),
        }
    }
}

/// Forward-slash relative name, or `None` for anything escaping the root.
fn relative_name(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            _ => return None,
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanStatistics {
    pub total_files: usize,
    pub files_by_extension: std::collections::BTreeMap<String, usize>,
    pub first: Option<PartitionFile>,
    pub last: Option<PartitionFile>,
}

impl ScanStatistics {
    pub fn display_summary(&self) -> String {
        let mut summary = format!("Partition scan:\n  Total files: {}\n", self.total_files);

        if !self.files_by_extension.is_empty() {
            summary.push_str("  Files by type:\n");
            for (ext, count) in &self.files_by_extension {
                summary.push_str(&format!("    {}: {} files\n", ext, count));
            }
        }

        if let (Some(first), Some(last)) = (&self.first, &self.last) {
            summary.push_str(&format!("  Range: {} .. {}\n", first, last));
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_scan_sorts_lexicographically() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "part-0002.parquet");
        touch(temp_dir.path(), "part-0010.parquet");
        touch(temp_dir.path(), "part-0001.jsonl");
        touch(temp_dir.path(), "notes.txt");
        touch(temp_dir.path(), "_SUCCESS");

        let scanner = PartitionScanner::new(&SourceConfig::default());
        let partitions = scanner.scan_directory(temp_dir.path()).unwrap();
        let names: Vec<&str> = partitions.iter().map(PartitionFile::as_str).collect();

        assert_eq!(
            names,
            vec!["part-0001.jsonl", "part-0002.parquet", "part-0010.parquet"]
        );
    }

    #[test]
    fn test_scan_descends_into_partition_directories() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "lang=en/part-1.parquet");
        touch(temp_dir.path(), "lang=de/part-1.parquet");
        touch(temp_dir.path(), ".staging/part-9.parquet");

        let scanner = PartitionScanner::new(&SourceConfig::default());
        let partitions = scanner.scan_directory(temp_dir.path()).unwrap();
        let names: Vec<&str> = partitions.iter().map(PartitionFile::as_str).collect();

        assert_eq!(names, vec!["lang=de/part-1.parquet", "lang=en/part-1.parquet"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_fails_listing() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "part-0001.jsonl");
        touch(temp_dir.path(), "lang=de/part-0002.jsonl");
        let locked = temp_dir.path().join("lang=de");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can read the directory anyway
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let scanner = PartitionScanner::new(&SourceConfig::default());
        let result = scanner.scan_directory(temp_dir.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        match result {
            Err(IdSiftError::Io(err)) => assert!(err.to_string().contains("lang=de")),
            other => panic!("expected an io error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "readme.md");

        let scanner = PartitionScanner::new(&SourceConfig::default());
        let result = scanner.scan_directory(temp_dir.path());
        assert!(matches!(result, Err(IdSiftError::NoPartitions { .. })));
    }

    #[test]
    fn test_statistics() {
        let scanner = PartitionScanner::new(&SourceConfig::default());
        let partitions = vec![
            PartitionFile::new("a.jsonl"),
            PartitionFile::new("b.parquet"),
            PartitionFile::new("c.parquet"),
        ];

        let stats = scanner.get_statistics(&partitions);
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.files_by_extension.get("parquet"), Some(&2));
        assert!(stats.display_summary().contains("a.jsonl .. c.parquet"));
    }
}
