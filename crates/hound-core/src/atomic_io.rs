use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context, Result};

static STAGING_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Replaces `path` with `content` so that concurrent readers of the channel
/// directory or a rendered page see either the old bytes or the new ones.
///
/// The bytes are staged in a sibling file, flushed to disk and then renamed
/// over the destination. The staged file is removed when the rename fails.
pub fn write_bytes_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent_dir = destination_dir(path)?;
    std::fs::create_dir_all(&parent_dir)
        .with_context(|| format!("failed to create {}", parent_dir.display()))?;

    let staged = parent_dir.join(staging_name(path));
    let result = stage(&staged, content).and_then(|()| {
        std::fs::rename(&staged, path).with_context(|| {
            format!("failed to move {} into {}", staged.display(), path.display())
        })
    });
    if result.is_err() {
        let _ = std::fs::remove_file(&staged);
    }
    result
}

pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    write_bytes_atomic(path, content.as_bytes())
}

fn destination_dir(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        bail!("destination path cannot be empty");
    }
    if path.is_dir() {
        bail!("destination path '{}' is a directory", path.display());
    }
    Ok(path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Sibling name unique per process and call; the leading dot keeps staged
/// files out of `*.jsonl` / `*.html` listings.
fn staging_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("hound");
    let sequence = STAGING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(".{file_name}.staged-{}-{sequence}", std::process::id())
}

fn stage(staged: &Path, content: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(staged)
        .with_context(|| format!("failed to create {}", staged.display()))?;
    file.write_all(content)
        .with_context(|| format!("failed to write {}", staged.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to flush {}", staged.display()))
}

#[cfg(test)]
mod tests {
    use super::staging_name;
    use std::path::Path;

    #[test]
    fn unit_staging_names_are_hidden_and_unique() {
        let first = staging_name(Path::new("/data/channel_data.csv"));
        let second = staging_name(Path::new("/data/channel_data.csv"));
        assert!(first.starts_with(".channel_data.csv.staged-"));
        assert_ne!(first, second);
    }
}
