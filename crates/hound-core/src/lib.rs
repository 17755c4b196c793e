//! Low-level utilities shared across the hound crates.
//!
//! Provides the atomic file-write helper used for directory and rendered
//! document persistence, token refresh timing, path-segment sanitization,
//! and the HTTP retry policy shared by the Slack and Drive API clients.

pub mod atomic_io;
pub mod path_utils;
pub mod retry_policy;
pub mod time_utils;

pub use atomic_io::{write_bytes_atomic, write_text_atomic};
pub use path_utils::sanitize_path_segment;
pub use retry_policy::{
    is_retryable_http_status, parse_retry_after_seconds, retry_delay, truncate_chars,
};
pub use time_utils::{refresh_deadline, unix_now};

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use super::*;

    #[test]
    fn functional_write_text_atomic_writes_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("channel_data.csv");
        write_text_atomic(&path, "C1,/tmp/a.jsonl,a,\n").expect("write");
        let contents = read_to_string(&path).expect("read");
        assert_eq!(contents, "C1,/tmp/a.jsonl,a,\n");
    }

    #[test]
    fn functional_write_text_atomic_replaces_existing_file() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("nested/out.html");
        write_text_atomic(&path, "first version that is longer").expect("first write");
        write_text_atomic(&path, "second").expect("second write");
        assert_eq!(read_to_string(&path).expect("read"), "second");
        let leftovers = std::fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".staged-"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn regression_write_text_atomic_rejects_directory_target() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let error = write_text_atomic(tempdir.path(), "x").expect_err("directory target");
        assert!(error.to_string().contains("is a directory"));
    }
}
