use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hound_archive::{
    ChannelDirectory, ChatAttachment, ChatMessageEvent, InboundEvent, LogStore, RecordingPolicy,
    SlashCommandRequest,
};
use hound_drive::{ContentMirror, InMemoryMirror, MirrorGateway};
use hound_slack_runtime::{ChatTransport, ConversationInfo, DispatchOutcome, RecordingBridge};
use serde_json::Value;
use tempfile::tempdir;

const AUTHOR: &str = "UAUTHOR";
const BOT: &str = "UBOT";

#[derive(Default)]
struct ScriptedWorkspace {
    posts: Mutex<Vec<(String, String)>>,
    created: Mutex<Vec<String>>,
    files: HashMap<String, Vec<u8>>,
}

impl ScriptedWorkspace {
    fn with_file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }

    fn replies_to(&self, channel_id: &str) -> Vec<String> {
        self.posts
            .lock()
            .expect("posts lock")
            .iter()
            .filter(|(channel, _)| channel == channel_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl ChatTransport for ScriptedWorkspace {
    async fn post_message(&self, channel_id: &str, text: &str) -> Result<()> {
        self.posts
            .lock()
            .expect("posts lock")
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn conversation_info(&self, channel_id: &str) -> Result<ConversationInfo> {
        Err(anyhow!("channel_not_found: {channel_id}"))
    }

    async fn create_conversation(&self, name: &str) -> Result<String> {
        let mut created = self.created.lock().expect("created lock");
        created.push(name.to_string());
        Ok(format!("CDIARY{}", created.len()))
    }

    async fn download_file(&self, url: &str) -> Result<Vec<u8>> {
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("download of {url} failed with status 404"))
    }
}

async fn bridge_for(
    base_dir: &Path,
    workspace: Arc<ScriptedWorkspace>,
    mirror: Arc<InMemoryMirror>,
) -> (RecordingBridge, MirrorGateway) {
    let dyn_mirror: Arc<dyn ContentMirror> = mirror;
    let gateway = MirrorGateway::bootstrap(dyn_mirror, "happeninghound")
        .await
        .expect("bootstrap mirror");
    let bridge = RecordingBridge::new(
        workspace,
        gateway.clone(),
        ChannelDirectory::load(base_dir).expect("load directory"),
        LogStore::new(base_dir),
        RecordingPolicy::new(BOT, AUTHOR),
    );
    (bridge, gateway)
}

fn command(channel_id: &str, name: &str, text: &str) -> InboundEvent {
    InboundEvent::SlashCommand(SlashCommandRequest {
        command: name.to_string(),
        text: text.to_string(),
        channel_id: channel_id.to_string(),
        user_id: AUTHOR.to_string(),
    })
}

fn message(channel_id: &str, author: &str, ts: &str, text: &str) -> ChatMessageEvent {
    ChatMessageEvent {
        channel_id: channel_id.to_string(),
        author_id: author.to_string(),
        text: text.to_string(),
        sub_type: None,
        event_timestamp: ts.to_string(),
        attachments: Vec::new(),
    }
}

#[tokio::test]
async fn integration_channel_lifecycle_records_renders_and_archives() {
    let temp = tempdir().expect("tempdir");
    let workspace = Arc::new(
        ScriptedWorkspace::default().with_file("https://files.example/photo", b"png-bytes"),
    );
    let mirror = Arc::new(InMemoryMirror::new());
    let (mut bridge, gateway) = bridge_for(temp.path(), workspace.clone(), mirror.clone()).await;

    let created = bridge
        .dispatch(command("CHOME", "/create-channel", "diary daily notes"))
        .await;
    assert!(matches!(created, DispatchOutcome::Replied { .. }));
    assert_eq!(bridge.directory().len(), 1);
    let channel_id = bridge.directory().records()[0].channel_id.clone();
    assert_eq!(channel_id, "CDIARY1");

    let recorded = bridge
        .dispatch(InboundEvent::Message(message(
            &channel_id,
            AUTHOR,
            "1633024800.000100",
            "see <https://example.com|the site> & more",
        )))
        .await;
    assert!(matches!(recorded, DispatchOutcome::Recorded { .. }));

    let ignored = bridge
        .dispatch(InboundEvent::Message(message(
            &channel_id,
            "USOMEONE",
            "1633024801.000100",
            "not mine",
        )))
        .await;
    assert!(matches!(ignored, DispatchOutcome::Skipped(_)));

    let mut share = message(&channel_id, AUTHOR, "1633024900.000200", "a photo");
    share.sub_type = Some("file_share".to_string());
    share.attachments = vec![ChatAttachment {
        id: "F1".to_string(),
        name: "photo.png".to_string(),
        filetype: "png".to_string(),
        download_url: Some("https://files.example/photo".to_string()),
    }];
    match bridge.dispatch(InboundEvent::Message(share)).await {
        DispatchOutcome::Recorded {
            files,
            attachment_failures,
            mirror_error,
            ..
        } => {
            assert_eq!(files, vec!["images/diary/1633024900.000200_0.png".to_string()]);
            assert!(attachment_failures.is_empty());
            assert!(mirror_error.is_none());
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let image = std::fs::read(temp.path().join("images/diary/1633024900.000200_0.png"))
        .expect("attachment on disk");
    assert_eq!(image, b"png-bytes");

    let log = std::fs::read_to_string(temp.path().join("diary.jsonl")).expect("log file");
    let entries = log
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).expect("json line"))
        .collect::<Vec<_>>();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["channel"]["name"], "diary");
    assert!(entries[0].get("files").is_none());
    assert_eq!(entries[1]["files"][0], "images/diary/1633024900.000200_0.png");

    let root_id = gateway.layout().root_id.clone();
    let log_blobs = mirror.blobs_named("diary.jsonl", Some(&root_id));
    assert_eq!(log_blobs.len(), 1);
    assert_eq!(log_blobs[0].bytes, log.as_bytes());
    let image_blobs = mirror
        .snapshot()
        .into_iter()
        .filter(|blob| blob.name == "1633024900.000200_0.png")
        .collect::<Vec<_>>();
    assert_eq!(image_blobs.len(), 1);
    assert_eq!(image_blobs[0].bytes, b"png-bytes");

    bridge
        .dispatch(command(&channel_id, "/make-html", ""))
        .await;
    let html = std::fs::read_to_string(temp.path().join("html/diary.html")).expect("html page");
    assert!(html.contains(r#"<a href="https://example.com" target="_blank">the site</a>"#));
    assert!(html.contains("&amp; more"));
    assert!(html.contains("1633024900.000200_0.png"));
    let html_id = gateway.layout().html_id.clone();
    assert_eq!(mirror.blobs_named("diary.html", Some(&html_id)).len(), 1);

    bridge
        .dispatch(command(&channel_id, "/show-files", ""))
        .await;
    let replies = workspace.replies_to(&channel_id);
    assert!(replies
        .iter()
        .any(|reply| reply.starts_with("rendered diary (2 entries) to diary.html")));
    assert!(replies
        .iter()
        .any(|reply| reply.contains("- diary.jsonl entries=2 html=rendered")));

    let archived = bridge
        .dispatch(InboundEvent::ChannelArchived {
            channel_id: channel_id.clone(),
        })
        .await;
    assert!(matches!(
        archived,
        DispatchOutcome::ChannelRemoved { removed: true }
    ));
    assert!(ChannelDirectory::load(temp.path())
        .expect("reload directory")
        .is_empty());
    assert!(temp.path().join("diary.jsonl").exists());
}

#[tokio::test]
async fn integration_restart_resumes_from_saved_directory() {
    let temp = tempdir().expect("tempdir");
    let workspace = Arc::new(ScriptedWorkspace::default());
    let mirror = Arc::new(InMemoryMirror::new());

    {
        let (mut bridge, _) = bridge_for(temp.path(), workspace.clone(), mirror.clone()).await;
        bridge
            .dispatch(command("CHOME", "/create-channel", "garden"))
            .await;
        bridge
            .dispatch(InboundEvent::Message(message(
                "CDIARY1",
                AUTHOR,
                "1700000000.000001",
                "first",
            )))
            .await;
    }

    let (mut bridge, gateway) = bridge_for(temp.path(), workspace.clone(), mirror.clone()).await;
    assert_eq!(bridge.directory().len(), 1);
    let outcome = bridge
        .dispatch(InboundEvent::Message(message(
            "CDIARY1",
            AUTHOR,
            "1700000001.000001",
            "second",
        )))
        .await;
    match outcome {
        DispatchOutcome::Recorded { channel_name, .. } => assert_eq!(channel_name, "garden"),
        other => panic!("unexpected outcome {other:?}"),
    }

    let root_id = gateway.layout().root_id.clone();
    let blobs = mirror.blobs_named("garden.jsonl", Some(&root_id));
    assert_eq!(blobs.len(), 1);
    let mirrored = String::from_utf8(blobs[0].bytes.clone()).expect("utf8");
    assert_eq!(mirrored.lines().count(), 2);
}

#[tokio::test]
async fn regression_unknown_channel_reports_error_and_keeps_running() {
    let temp = tempdir().expect("tempdir");
    let workspace = Arc::new(ScriptedWorkspace::default());
    let mirror = Arc::new(InMemoryMirror::new());
    let (mut bridge, _) = bridge_for(temp.path(), workspace.clone(), mirror).await;

    let outcome = bridge
        .dispatch(InboundEvent::Message(message(
            "CUNKNOWN",
            AUTHOR,
            "1700000000.000001",
            "lost",
        )))
        .await;
    assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
    let replies = workspace.replies_to("CUNKNOWN");
    assert_eq!(replies.len(), 1);
    assert!(replies[0].starts_with("error: "));

    let next = bridge
        .dispatch(command("CUNKNOWN", "/show-files", ""))
        .await;
    assert!(matches!(next, DispatchOutcome::Replied { .. }));
    assert_eq!(
        workspace.replies_to("CUNKNOWN")[1],
        "no channel logs recorded yet"
    );
}
