use crate::error::Result;
use crate::source::{Row, Value};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Append-only JSON-lines log of extracted rows.
pub struct OutputLog {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl OutputLog {
    /// Open for appending (resume) or truncate and start over.
    ///
    /// In append mode a torn last line from an interrupted write is cut off
    /// first, so new records always start on a fresh line.
    pub fn open<P: Into<PathBuf>>(path: P, append: bool) -> Result<Self> {
        let path = path.into();
        if append {
            let dropped = trim_partial_line(&path)?;
            if dropped > 0 {
                tracing::warn!(
                    path = %path.display(),
                    bytes = dropped,
                    "dropped incomplete trailing line from output log"
                );
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)?;

        Ok(Self {
            path,
            writer: BufWriter::with_capacity(64 * 1024, file),
            written: 0,
        })
    }

    pub fn append(&mut self, row: &Row) -> Result<()> {
        serde_json::to_writer(&mut self.writer, row)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Flush buffered lines and push them to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Records appended by this handle.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Truncate the file after its last newline. Returns the bytes removed.
fn trim_partial_line(path: &Path) -> Result<u64> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let len = file.metadata()?.len();
    let mut buffer = [0u8; 8 * 1024];
    let mut end = len;
    let mut keep = 0;

    while end > 0 {
        let start = end.saturating_sub(buffer.len() as u64);
        let chunk = &mut buffer[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|b| *b == b'\n') {
            keep = start + pos as u64 + 1;
            break;
        }
        end = start;
    }

    if keep < len {
        file.set_len(keep)?;
        file.sync_data()?;
    }
    Ok(len - keep)
}

/// Outcome of replaying an existing output log.
#[derive(Debug, Clone, Default)]
pub struct Hydration {
    pub found: HashSet<i64>,
    pub lines_read: u64,
    pub malformed_lines: u64,
}

/// Rebuild the found-ID set from a previous run's output.
///
/// Lines that are not JSON objects or carry no coercible ID are skipped. A
/// missing log is an empty history.
pub fn hydrate_found_ids<P: AsRef<Path>>(path: P, id_field: &str) -> Result<Hydration> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Hydration::default()),
        Err(e) => return Err(e.into()),
    };

    let mut hydration = Hydration::default();
    let mut reader = BufReader::new(file);
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        // Raw bytes so one bad UTF-8 line cannot end the replay
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            break;
        }
        hydration.lines_read += 1;

        let id = serde_json::from_slice::<serde_json::Value>(&buffer)
            .ok()
            .and_then(|parsed| parsed.get(id_field).cloned())
            .and_then(|raw| Value::from(raw).as_id());

        match id {
            Some(id) => {
                hydration.found.insert(id);
            }
            None => hydration.malformed_lines += 1,
        }
    }

    Ok(hydration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_append_writes_one_line_per_row() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.jsonl");

        let mut log = OutputLog::open(&path, false).unwrap();
        log.append(&Row::new().with_field("id", Value::Int(1))).unwrap();
        log.append(&Row::new().with_field("id", Value::Int(2))).unwrap();
        log.sync().unwrap();
        assert_eq!(log.written(), 2);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"id\":1}\n{\"id\":2}\n");
    }

    #[test]
    fn test_append_mode_preserves_and_fresh_mode_truncates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.jsonl");
        fs::write(&path, "{\"id\":1}\n").unwrap();

        let mut log = OutputLog::open(&path, true).unwrap();
        log.append(&Row::new().with_field("id", Value::Int(2))).unwrap();
        log.sync().unwrap();
        drop(log);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);

        let log = OutputLog::open(&path, false).unwrap();
        drop(log);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_append_mode_cuts_torn_last_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.jsonl");
        fs::write(&path, "{\"id\":5}\n{\"id\":1,\"ti").unwrap();

        let mut log = OutputLog::open(&path, true).unwrap();
        log.append(&Row::new().with_field("id", Value::Int(1))).unwrap();
        log.sync().unwrap();
        drop(log);

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"id\":5}\n{\"id\":1}\n");
        let hydration = hydrate_found_ids(&path, "id").unwrap();
        assert_eq!(hydration.found, [1, 5].into_iter().collect());
        assert_eq!(hydration.malformed_lines, 0);
    }

    #[test]
    fn test_append_mode_empties_log_without_any_newline() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.jsonl");
        fs::write(&path, "{\"id\":1,\"ti").unwrap();

        let mut log = OutputLog::open(&path, true).unwrap();
        log.append(&Row::new().with_field("id", Value::Int(2))).unwrap();
        log.sync().unwrap();
        drop(log);

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"id\":2}\n");
    }

    #[test]
    fn test_hydration_skips_malformed_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.jsonl");
        let mut content = b"{\"id\": 10, \"title\": \"a\"}\n".to_vec();
        content.extend_from_slice(b"{\"id\": \"30\"}\n");
        content.extend_from_slice(b"{\"id\": 10}\n");
        content.extend_from_slice(b"garbage\n");
        content.extend_from_slice(&[0xff, 0xfe, b'\n']);
        content.extend_from_slice(b"{\"title\": \"no id\"}\n");
        content.extend_from_slice(b"{\"id\": 20");
        fs::write(&path, content).unwrap();

        let hydration = hydrate_found_ids(&path, "id").unwrap();
        assert_eq!(hydration.found, [10, 30].into_iter().collect());
        assert_eq!(hydration.lines_read, 7);
        assert_eq!(hydration.malformed_lines, 4);
    }

    #[test]
    fn test_hydration_of_missing_log() {
        let temp_dir = TempDir::new().unwrap();
        let hydration = hydrate_found_ids(temp_dir.path().join("absent.jsonl"), "id").unwrap();
        assert!(hydration.found.is_empty());
        assert_eq!(hydration.lines_read, 0);
    }
}
