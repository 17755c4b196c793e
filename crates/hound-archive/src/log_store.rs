use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use hound_core::sanitize_path_segment;

pub const ATTACHMENTS_DIR: &str = "images";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogChannel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// One recorded message. Serialized as a single JSON line:
/// `{"timestamp","message","channel":{"id","name"},"files"?}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub channel: LogChannel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

impl LogEntry {
    pub fn new(
        timestamp: impl Into<String>,
        message: impl Into<String>,
        channel_id: impl Into<String>,
        channel_name: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            message: message.into(),
            channel: LogChannel {
                id: channel_id.into(),
                name: channel_name.into(),
            },
            files: None,
        }
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn attachments(&self) -> &[String] {
        self.files.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogScan {
    pub entries: Vec<LogEntry>,
    pub invalid_lines: usize,
}

/// Append-only JSON-lines logs, one file per channel under `base_dir`.
#[derive(Debug, Clone)]
pub struct LogStore {
    base_dir: PathBuf,
}

impl LogStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn log_file_name(&self, channel_name: &str) -> String {
        format!("{}.jsonl", sanitize_path_segment(channel_name))
    }

    pub fn log_path(&self, channel_name: &str) -> PathBuf {
        self.base_dir.join(self.log_file_name(channel_name))
    }

    /// Appends one entry and flushes before returning the log path.
    pub fn append(&self, channel_name: &str, entry: &LogEntry) -> Result<PathBuf> {
        let path = self.log_path(channel_name);
        std::fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("failed to create {}", self.base_dir.display()))?;
        let line = serde_json::to_string(entry).context("failed to encode log entry")?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        writeln!(file, "{line}").with_context(|| format!("failed to append to {}", path.display()))?;
        file.flush()
            .with_context(|| format!("failed to flush {}", path.display()))?;
        Ok(path)
    }

    /// Reads every entry in file order. Lines that fail to decode become
    /// `LogEntry::default()` and are counted in `invalid_lines`.
    pub fn read_all(&self, channel_name: &str) -> Result<LogScan> {
        read_log_file(&self.log_path(channel_name))
    }

    /// Relative path recorded in the entry's `files` list.
    pub fn attachment_relative_path(
        &self,
        channel_name: &str,
        timestamp: &str,
        index: usize,
        extension: &str,
    ) -> String {
        format!(
            "{ATTACHMENTS_DIR}/{}/{}",
            sanitize_path_segment(channel_name),
            attachment_file_name(timestamp, index, extension)
        )
    }

    pub fn attachment_path(
        &self,
        channel_name: &str,
        timestamp: &str,
        index: usize,
        extension: &str,
    ) -> PathBuf {
        self.base_dir
            .join(ATTACHMENTS_DIR)
            .join(sanitize_path_segment(channel_name))
            .join(attachment_file_name(timestamp, index, extension))
    }

    /// Writes attachment bytes to their derived local path, creating the
    /// channel folder on demand.
    pub fn write_attachment(
        &self,
        channel_name: &str,
        timestamp: &str,
        index: usize,
        extension: &str,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let path = self.attachment_path(channel_name, timestamp, index, extension);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

pub fn attachment_file_name(timestamp: &str, index: usize, extension: &str) -> String {
    format!(
        "{}_{index}.{}",
        sanitize_path_segment(timestamp),
        sanitize_path_segment(extension)
    )
}

pub fn read_log_file(path: &Path) -> Result<LogScan> {
    let file =
        std::fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = std::io::BufReader::new(file);

    let mut scan = LogScan::default();
    for (index, line_result) in reader.split(b'\n').enumerate() {
        let raw = line_result
            .with_context(|| format!("failed reading line {} from {}", index + 1, path.display()))?;
        // Non UTF-8 bytes count as an undecodable line, not a read failure.
        let decoded = std::str::from_utf8(&raw).ok().map(str::trim);
        if decoded.is_some_and(str::is_empty) {
            continue;
        }
        match decoded.and_then(|line| serde_json::from_str::<LogEntry>(line).ok()) {
            Some(entry) => scan.entries.push(entry),
            None => {
                scan.invalid_lines = scan.invalid_lines.saturating_add(1);
                scan.entries.push(LogEntry::default());
            }
        }
    }
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{LogEntry, LogStore};

    #[test]
    fn unit_log_entry_omits_files_key_for_plain_messages() {
        let entry = LogEntry::new("1700000000.000100", "hello", "C1", "daily");
        let encoded = serde_json::to_string(&entry).expect("encode");
        assert_eq!(
            encoded,
            r#"{"timestamp":"1700000000.000100","message":"hello","channel":{"id":"C1","name":"daily"}}"#
        );
        let shared = entry.with_files(vec!["images/daily/1700000000.000100_0.png".to_string()]);
        let encoded = serde_json::to_string(&shared).expect("encode");
        assert!(encoded.ends_with(r#""files":["images/daily/1700000000.000100_0.png"]}"#));
    }

    #[test]
    fn functional_append_then_read_all_reproduces_entries_in_order() {
        let temp = tempdir().expect("tempdir");
        let store = LogStore::new(temp.path());
        let first = LogEntry::new("1700000000.000100", "first <https://a.example>", "C1", "daily");
        let second = LogEntry::new("1700000001.000200", "", "C1", "daily")
            .with_files(vec!["images/daily/1700000001.000200_0.jpg".to_string()]);
        store.append("daily", &first).expect("append first");
        let path = store.append("daily", &second).expect("append second");
        assert_eq!(path, temp.path().join("daily.jsonl"));

        let scan = store.read_all("daily").expect("read");
        assert_eq!(scan.entries, vec![first, second]);
        assert_eq!(scan.invalid_lines, 0);
    }

    #[test]
    fn regression_corrupt_lines_decode_to_default_entries() {
        let temp = tempdir().expect("tempdir");
        let store = LogStore::new(temp.path());
        let kept = LogEntry::new("1700000000.1", "kept", "C1", "daily");
        store.append("daily", &kept).expect("append");
        let mut raw = std::fs::read_to_string(store.log_path("daily")).expect("read raw");
        raw.push_str("{not json\n\n");
        std::fs::write(store.log_path("daily"), raw).expect("corrupt");
        store.append("daily", &kept).expect("append after corruption");

        let scan = store.read_all("daily").expect("read");
        assert_eq!(scan.entries.len(), 3);
        assert_eq!(scan.entries[1], LogEntry::default());
        assert_eq!(scan.entries[2], kept);
        assert_eq!(scan.invalid_lines, 1);
    }

    #[test]
    fn regression_non_utf8_line_is_counted_invalid_without_aborting_scan() {
        let temp = tempdir().expect("tempdir");
        let store = LogStore::new(temp.path());
        let first = LogEntry::new("1700000000.1", "before", "C1", "daily");
        let last = LogEntry::new("1700000002.1", "after", "C1", "daily");
        store.append("daily", &first).expect("append first");
        let mut raw = std::fs::read(store.log_path("daily")).expect("read raw");
        raw.extend_from_slice(b"{\"message\":\"\xff\xfe\"}\n");
        std::fs::write(store.log_path("daily"), raw).expect("write invalid bytes");
        store.append("daily", &last).expect("append last");

        let scan = store.read_all("daily").expect("scan survives invalid utf-8");
        assert_eq!(scan.entries, vec![first, LogEntry::default(), last]);
        assert_eq!(scan.invalid_lines, 1);
    }

    #[test]
    fn regression_read_all_missing_log_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let store = LogStore::new(temp.path());
        let error = store.read_all("absent").expect_err("missing log");
        assert!(error.to_string().contains("absent.jsonl"));
    }

    #[test]
    fn unit_attachment_paths_derive_from_channel_timestamp_and_index() {
        let temp = tempdir().expect("tempdir");
        let store = LogStore::new(temp.path());
        assert_eq!(
            store.attachment_relative_path("daily", "1700000000.000100", 2, "png"),
            "images/daily/1700000000.000100_2.png"
        );
        let written = store
            .write_attachment("daily", "1700000000.000100", 0, "png", b"\x89PNG")
            .expect("write attachment");
        assert_eq!(
            written,
            temp.path()
                .join("images")
                .join("daily")
                .join("1700000000.000100_0.png")
        );
        assert_eq!(std::fs::read(written).expect("read back"), b"\x89PNG");
    }
}
