use crate::config::SourceConfig;
use crate::error::{IdSiftError, Result};
use crate::source::partition_filter::PartitionFormat;
use crate::source::partition_scanner::PartitionScanner;
use crate::source::readers;
use crate::source::{DataSource, IdPredicate, PartitionFile, Row};
use std::path::{Path, PathBuf};
use url::Url;

/// [`DataSource`] over partitions stored in a local directory tree.
pub struct LocalPartitionSource {
    root: PathBuf,
    scanner: PartitionScanner,
}

impl LocalPartitionSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let root = resolve_location(&config.location)?;

        Ok(Self {
            root,
            scanner: PartitionScanner::new(config),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scanner(&self) -> &PartitionScanner {
        &self.scanner
    }

    fn partition_path(&self, partition: &PartitionFile) -> Result<PathBuf> {
        let relative = Path::new(partition.as_str());
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(IdSiftError::partition_read(
                partition.as_str(),
                "partition name escapes the source root",
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl DataSource for LocalPartitionSource {
    fn list_partitions(&self) -> Result<Vec<PartitionFile>> {
        self.scanner.scan_directory(&self.root)
    }

    fn read_filtered(
        &self,
        partition: &PartitionFile,
        predicate: &IdPredicate<'_>,
    ) -> Result<Vec<Row>> {
        if predicate.is_empty() {
            return Ok(Vec::new());
        }

        let path = self.partition_path(partition)?;
        match PartitionFormat::from_path(&path) {
            Some(PartitionFormat::Parquet) => readers::read_parquet(&path, predicate),
            Some(PartitionFormat::JsonLines) => readers::read_json_lines(&path, predicate),
            None => Err(IdSiftError::partition_read(
                partition.as_str(),
                "unrecognized partition format",
            )),
        }
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Turn a configured location into a local directory.
///
/// Accepts plain paths and `file://` URLs. Anything with another scheme is
/// rejected: remote stores plug in through their own `DataSource`.
pub fn resolve_location(location: &str) -> Result<PathBuf> {
    let location = location.trim();

    match Url::parse(location) {
        Ok(url) if url.scheme() == "file" => {
            url.to_file_path()
                .map_err(|_| IdSiftError::UnsupportedSource {
                    location: location.to_string(),
                })
        }
        // Windows drive letters parse as a one-letter scheme
        Ok(url) if url.scheme().len() == 1 => Ok(PathBuf::from(location)),
        Ok(_) => Err(IdSiftError::UnsupportedSource {
            location: location.to_string(),
        }),
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(PathBuf::from(location)),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_plain_and_file_locations() {
        assert_eq!(resolve_location("data/parts").unwrap(), PathBuf::from("data/parts"));
        assert_eq!(resolve_location("/data/parts").unwrap(), PathBuf::from("/data/parts"));

        #[cfg(unix)]
        assert_eq!(
            resolve_location("file:///data/parts").unwrap(),
            PathBuf::from("/data/parts")
        );
    }

    #[test]
    fn test_remote_locations_are_rejected() {
        let result = resolve_location("gs://bucket/articles");
        assert!(matches!(result, Err(IdSiftError::UnsupportedSource { .. })));

        let result = resolve_location("s3://bucket/articles");
        assert!(matches!(result, Err(IdSiftError::UnsupportedSource { .. })));
    }

    #[test]
    fn test_list_and_read() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.jsonl"), "{\"id\": 20}\n").unwrap();
        fs::write(temp_dir.path().join("a.jsonl"), "{\"id\": 10}\n{\"id\": 11}\n").unwrap();

        let config = SourceConfig {
            location: temp_dir.path().display().to_string(),
            ..SourceConfig::default()
        };
        let source = LocalPartitionSource::new(&config).unwrap();

        let partitions = source.list_partitions().unwrap();
        assert_eq!(partitions, vec![PartitionFile::new("a.jsonl"), PartitionFile::new("b.jsonl")]);

        let ids: HashSet<i64> = [11, 20].into_iter().collect();
        let rows = source
            .read_filtered(&partitions[0], &IdPredicate::new("id", &ids))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id("id"), Some(11));
    }

    #[test]
    fn test_escaping_partition_name_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = SourceConfig {
            location: temp_dir.path().display().to_string(),
            ..SourceConfig::default()
        };
        let source = LocalPartitionSource::new(&config).unwrap();

        let ids: HashSet<i64> = [1].into_iter().collect();
        let result = source.read_filtered(
            &PartitionFile::new("../outside.jsonl"),
            &IdPredicate::new("id", &ids),
        );
        assert!(matches!(result, Err(IdSiftError::PartitionRead { .. })));
    }
}
