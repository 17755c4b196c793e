use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use thiserror::Error;

use hound_core::write_bytes_atomic;

pub const CHANNEL_DIRECTORY_FILE: &str = "channel_data.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub channel_id: String,
    pub display_name: String,
    pub log_path: String,
    pub description: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("channel '{0}' is not registered in the channel directory")]
    NotFound(String),
}

/// In-memory channel registry backed by a headerless CSV file
/// (`channel_id, path, name, description`).
///
/// `add` and `remove` only touch memory; `save` rewrites the whole file.
#[derive(Debug, Clone)]
pub struct ChannelDirectory {
    path: PathBuf,
    records: Vec<ChannelRecord>,
}

impl ChannelDirectory {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CHANNEL_DIRECTORY_FILE);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self {
                    path,
                    records: Vec::new(),
                });
            }
            Err(error) => {
                return Err(error).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(raw.as_slice());
        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row.with_context(|| {
                format!("failed to parse row {} of {}", index + 1, path.display())
            })?;
            // Fields are kept verbatim; only rows with no content at all are dropped.
            if row.iter().all(str::is_empty) {
                continue;
            }
            let field = |position: usize| row.get(position).unwrap_or_default().to_string();
            records.push(ChannelRecord {
                channel_id: field(0),
                log_path: field(1),
                display_name: field(2),
                description: field(3),
            });
        }
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[ChannelRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn add(&mut self, record: ChannelRecord) {
        self.records.push(record);
    }

    /// Drops every record with `channel_id`. Returns whether anything was removed.
    pub fn remove(&mut self, channel_id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.channel_id != channel_id);
        self.records.len() != before
    }

    pub fn lookup(&self, channel_id: &str) -> Result<&ChannelRecord, DirectoryError> {
        self.records
            .iter()
            .find(|record| record.channel_id == channel_id)
            .ok_or_else(|| DirectoryError::NotFound(channel_id.to_string()))
    }

    pub fn find_by_name(&self, display_name: &str) -> Option<&ChannelRecord> {
        self.records
            .iter()
            .find(|record| record.display_name == display_name)
    }

    pub fn save(&self) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for record in &self.records {
            writer
                .write_record([
                    record.channel_id.as_str(),
                    record.log_path.as_str(),
                    record.display_name.as_str(),
                    record.description.as_str(),
                ])
                .with_context(|| format!("failed to encode channel '{}'", record.channel_id))?;
        }
        let payload = writer
            .into_inner()
            .map_err(|error| anyhow!("failed to flush channel directory: {}", error.error()))?;
        write_bytes_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}
