use std::path::Path;

use anyhow::{Context, Result};

use crate::log_store::read_log_file;
use crate::render_pipeline::HTML_DIR;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLogStatus {
    pub channel_name: String,
    pub log_file_name: String,
    pub entry_count: usize,
    pub rendered: bool,
}

/// Lists every `*.jsonl` log directly under `base_dir`, sorted by file name,
/// marking which ones have a same-named page in `html/`.
pub fn collect_channel_status(base_dir: &Path) -> Result<Vec<ChannelLogStatus>> {
    let mut statuses = Vec::new();
    if !base_dir.is_dir() {
        return Ok(statuses);
    }
    let entries = std::fs::read_dir(base_dir)
        .with_context(|| format!("failed to list {}", base_dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", base_dir.display()))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
            continue;
        }
        let Some(channel_name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let entry_count = read_log_file(&path)?.entries.len();
        let rendered = base_dir
            .join(HTML_DIR)
            .join(format!("{channel_name}.html"))
            .is_file();
        statuses.push(ChannelLogStatus {
            channel_name: channel_name.to_string(),
            log_file_name: format!("{channel_name}.jsonl"),
            entry_count,
            rendered,
        });
    }
    statuses.sort_by(|left, right| left.log_file_name.cmp(&right.log_file_name));
    Ok(statuses)
}

pub fn render_channel_status(statuses: &[ChannelLogStatus]) -> String {
    if statuses.is_empty() {
        return "no channel logs recorded yet".to_string();
    }
    let mut lines = vec![format!("channel logs: {}", statuses.len())];
    for status in statuses {
        lines.push(format!(
            "- {} entries={} html={}",
            status.log_file_name,
            status.entry_count,
            if status.rendered { "rendered" } else { "not rendered" }
        ));
    }
    lines.join("\n")
}
