//! Log-to-HTML rendering with a fixed stage order:
//! open log, scan entries, build model, render template, write local copy,
//! mirror remote copy.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::Context;
use minijinja::Environment;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use hound_core::{sanitize_path_segment, write_text_atomic};
use hound_drive::{MirrorGateway, MirrorTarget, SyncOutcome};

use crate::html_view::{format_slack_timestamp, message_to_html};
use crate::log_store::{LogScan, LogStore};

pub const HTML_DIR: &str = "html";
pub const TEMPLATE_DIR: &str = "template";
pub const TEMPLATE_FILE: &str = "viewer.html";
pub const DEFAULT_OUTPUT_CSS: &str = include_str!("../templates/output.css");
const BUNDLED_TEMPLATE: &str = include_str!("../templates/viewer.html");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    OpenLog,
    ScanEntries,
    BuildModel,
    RenderTemplate,
    WriteLocal,
    MirrorRemote,
    Done,
}

impl RenderStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenLog => "open_log",
            Self::ScanEntries => "scan_entries",
            Self::BuildModel => "build_model",
            Self::RenderTemplate => "render_template",
            Self::WriteLocal => "write_local",
            Self::MirrorRemote => "mirror_remote",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("render failed at {stage}: {source}")]
pub struct RenderError {
    pub stage: RenderStage,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl RenderError {
    fn at(stage: RenderStage, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderReport {
    pub channel_name: String,
    pub html_path: PathBuf,
    pub html_file_name: String,
    pub entry_count: usize,
    pub invalid_lines: usize,
    pub mirror: Option<SyncOutcome>,
    pub mirror_error: Option<String>,
    pub stage: RenderStage,
}

#[derive(Debug, Serialize)]
struct ViewEntry {
    timestamp: String,
    display_time: String,
    message_html: String,
    files: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ViewModel<'a> {
    title: &'a str,
    entries: Vec<ViewEntry>,
}

/// Renders channel logs from a [`LogStore`] into `<base>/html/<name>.html`.
/// The log is only ever read.
#[derive(Debug, Clone)]
pub struct RenderPipeline {
    store: LogStore,
}

impl RenderPipeline {
    pub fn new(store: LogStore) -> Self {
        Self { store }
    }

    pub fn html_dir(&self) -> PathBuf {
        self.store.base_dir().join(HTML_DIR)
    }

    pub fn html_file_name(channel_name: &str) -> String {
        format!("{}.html", sanitize_path_segment(channel_name))
    }

    pub fn html_path(&self, channel_name: &str) -> PathBuf {
        self.html_dir().join(Self::html_file_name(channel_name))
    }

    fn template_override_path(&self) -> PathBuf {
        self.store
            .base_dir()
            .join(TEMPLATE_DIR)
            .join(TEMPLATE_FILE)
    }

    pub async fn render(
        &self,
        channel_name: &str,
        mirror: Option<&MirrorGateway>,
    ) -> Result<RenderReport, RenderError> {
        let log_path = self.store.log_path(channel_name);
        if !log_path.is_file() {
            return Err(RenderError::at(
                RenderStage::OpenLog,
                format!("no log recorded for channel '{channel_name}' at {}", log_path.display()),
            ));
        }

        let scan: LogScan = self
            .store
            .read_all(channel_name)
            .map_err(|error| RenderError::at(RenderStage::ScanEntries, error))?;
        if scan.invalid_lines > 0 {
            warn!(
                channel_name,
                invalid_lines = scan.invalid_lines,
                "log contains undecodable lines"
            );
        }

        let model = build_view_model(channel_name, &scan);
        let template_source = self
            .load_template_source()
            .map_err(|error| RenderError::at(RenderStage::RenderTemplate, error))?;

        let html = render_template(&template_source, &model)
            .map_err(|error| RenderError::at(RenderStage::RenderTemplate, error))?;

        let html_file_name = Self::html_file_name(channel_name);
        let html_path = self.html_dir().join(&html_file_name);
        write_text_atomic(&html_path, &html)
            .map_err(|error| RenderError::at(RenderStage::WriteLocal, error))?;
        info!(
            channel_name,
            entries = model.entries.len(),
            path = %html_path.display(),
            "rendered channel log"
        );

        let mut report = RenderReport {
            channel_name: channel_name.to_string(),
            html_path,
            html_file_name,
            entry_count: model.entries.len(),
            invalid_lines: scan.invalid_lines,
            mirror: None,
            mirror_error: None,
            stage: RenderStage::MirrorRemote,
        };
        if let Some(gateway) = mirror {
            match gateway
                .sync(&report.html_file_name, &report.html_path, MirrorTarget::Html)
                .await
            {
                Ok(outcome) => report.mirror = Some(outcome),
                Err(error) => {
                    warn!(
                        channel_name,
                        stage = %RenderStage::MirrorRemote,
                        error = %format!("{error:#}"),
                        "rendered page mirror failed"
                    );
                    report.mirror_error = Some(format!("{error:#}"));
                }
            }
        }
        report.stage = RenderStage::Done;
        Ok(report)
    }

    fn load_template_source(&self) -> anyhow::Result<String> {
        let override_path = self.template_override_path();
        if override_path.is_file() {
            return read_template(&override_path);
        }
        Ok(BUNDLED_TEMPLATE.to_string())
    }
}

fn read_template(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn build_view_model<'a>(title: &'a str, scan: &LogScan) -> ViewModel<'a> {
    let entries = scan
        .entries
        .iter()
        .map(|entry| ViewEntry {
            timestamp: entry.timestamp.clone(),
            display_time: format_slack_timestamp(&entry.timestamp),
            message_html: message_to_html(&entry.message),
            files: entry.attachments().to_vec(),
        })
        .collect();
    ViewModel { title, entries }
}

fn render_template(source: &str, model: &ViewModel<'_>) -> Result<String, minijinja::Error> {
    let env = Environment::new();
    let template = env.template_from_named_str(TEMPLATE_FILE, source)?;
    template.render(model)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::tempdir;

    use hound_drive::{ContentMirror, InMemoryMirror, MirrorGateway, SyncOutcome};

    use super::{RenderPipeline, RenderStage, TEMPLATE_DIR, TEMPLATE_FILE};
    use crate::log_store::{LogEntry, LogStore};

    fn seeded_store(root: &std::path::Path) -> LogStore {
        let store = LogStore::new(root);
        store
            .append(
                "daily",
                &LogEntry::new("1633024800.123456789", "see <https://x.example/a>", "C1", "daily"),
            )
            .expect("append link entry");
        store
            .append(
                "daily",
                &LogEntry::new("1633024860.000001", "<b>bold?</b>", "C1", "daily")
                    .with_files(vec!["images/daily/1633024860.000001_0.png".to_string()]),
            )
            .expect("append file entry");
        store
    }

    async fn memory_gateway() -> (Arc<InMemoryMirror>, MirrorGateway) {
        let mirror = Arc::new(InMemoryMirror::new());
        let dyn_mirror: Arc<dyn ContentMirror> = mirror.clone();
        let gateway = MirrorGateway::bootstrap(dyn_mirror, "happeninghound")
            .await
            .expect("bootstrap");
        (mirror, gateway)
    }

    #[tokio::test]
    async fn functional_render_writes_linkified_and_escaped_html() {
        let temp = tempdir().expect("tempdir");
        let pipeline = RenderPipeline::new(seeded_store(temp.path()));
        let report = pipeline.render("daily", None).await.expect("render");

        assert_eq!(report.stage, RenderStage::Done);
        assert_eq!(report.entry_count, 2);
        assert_eq!(report.html_path, temp.path().join("html").join("daily.html"));
        let html = std::fs::read_to_string(&report.html_path).expect("read html");
        assert!(html.contains(
            "see <a href=\"https://x.example/a\" target=\"_blank\">https://x.example/a</a>"
        ));
        assert!(html.contains("&lt;b&gt;bold?&lt;/b&gt;"));
        assert!(html.contains("2021-09-30 18:00:00"));
        assert!(html.contains("1633024860.000001_0.png"));
    }

    #[tokio::test]
    async fn functional_rendering_twice_is_byte_identical() {
        let temp = tempdir().expect("tempdir");
        let pipeline = RenderPipeline::new(seeded_store(temp.path()));
        let first = pipeline.render("daily", None).await.expect("first render");
        let first_html = std::fs::read(&first.html_path).expect("first html");
        let second = pipeline.render("daily", None).await.expect("second render");
        let second_html = std::fs::read(&second.html_path).expect("second html");
        assert_eq!(first_html, second_html);
    }

    #[tokio::test]
    async fn regression_missing_log_fails_at_open_stage() {
        let temp = tempdir().expect("tempdir");
        let pipeline = RenderPipeline::new(LogStore::new(temp.path()));
        let error = pipeline.render("absent", None).await.expect_err("no log");
        assert_eq!(error.stage, RenderStage::OpenLog);
        assert!(error.to_string().contains("open_log"));
        assert!(!pipeline.html_path("absent").exists());
    }

    #[tokio::test]
    async fn regression_render_does_not_modify_the_log() {
        let temp = tempdir().expect("tempdir");
        let store = seeded_store(temp.path());
        let before = std::fs::read(store.log_path("daily")).expect("log before");
        RenderPipeline::new(store.clone())
            .render("daily", None)
            .await
            .expect("render");
        let after = std::fs::read(store.log_path("daily")).expect("log after");
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn integration_render_mirrors_page_into_html_folder() {
        let temp = tempdir().expect("tempdir");
        let (mirror, gateway) = memory_gateway().await;
        let pipeline = RenderPipeline::new(seeded_store(temp.path()));

        let first = pipeline.render("daily", Some(&gateway)).await.expect("render");
        assert!(matches!(first.mirror, Some(SyncOutcome::Created { .. })));
        let second = pipeline.render("daily", Some(&gateway)).await.expect("rerender");
        assert!(matches!(second.mirror, Some(SyncOutcome::Updated { .. })));

        let pages = mirror.blobs_named("daily.html", Some(gateway.layout().html_id.as_str()));
        assert_eq!(pages.len(), 1);
    }

    #[tokio::test]
    async fn regression_mirror_failure_keeps_local_page() {
        let temp = tempdir().expect("tempdir");
        let (mirror, gateway) = memory_gateway().await;
        mirror.set_fail_writes(true);
        let pipeline = RenderPipeline::new(seeded_store(temp.path()));

        let report = pipeline
            .render("daily", Some(&gateway))
            .await
            .expect("local render succeeds");
        assert!(report.mirror.is_none());
        assert!(report.mirror_error.is_some());
        assert!(report.html_path.exists());
    }

    #[tokio::test]
    async fn functional_template_override_is_used_when_present() {
        let temp = tempdir().expect("tempdir");
        let store = seeded_store(temp.path());
        let template_dir = temp.path().join(TEMPLATE_DIR);
        std::fs::create_dir_all(&template_dir).expect("template dir");
        std::fs::write(
            template_dir.join(TEMPLATE_FILE),
            "{{ title }}:{% for entry in entries %}[{{ entry.display_time }}]{% endfor %}",
        )
        .expect("write override");

        let report = RenderPipeline::new(store)
            .render("daily", None)
            .await
            .expect("render");
        let html = std::fs::read_to_string(report.html_path).expect("html");
        assert_eq!(html, "daily:[2021-09-30 18:00:00][2021-09-30 18:01:00]");
    }

    #[tokio::test]
    async fn regression_unreadable_template_override_fails_at_render_template_stage() {
        let temp = tempdir().expect("tempdir");
        let store = seeded_store(temp.path());
        let template_dir = temp.path().join(TEMPLATE_DIR);
        std::fs::create_dir_all(&template_dir).expect("template dir");
        std::fs::write(template_dir.join(TEMPLATE_FILE), b"\xff\xfe{{ title }}")
            .expect("write override");

        let pipeline = RenderPipeline::new(store);
        let error = pipeline.render("daily", None).await.expect_err("bad template");
        assert_eq!(error.stage, RenderStage::RenderTemplate);
        assert!(!pipeline.html_path("daily").exists());
    }
}
