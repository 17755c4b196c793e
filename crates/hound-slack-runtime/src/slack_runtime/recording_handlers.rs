//! Handlers for typed inbound events. Every handler error is caught in
//! [`RecordingBridge::dispatch`], logged, and answered with a best-effort
//! chat reply.

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use thiserror::Error;
use tracing::{debug, info, warn};

use hound_archive::{
    collect_channel_status, decide, render_channel_status, ChannelDirectory, ChannelRecord,
    ChatAttachment, ChatMessageEvent, FilterDecision, InboundEvent, LogEntry, LogStore,
    RecordingPolicy, RenderPipeline, SkipReason, SlashCommandRequest,
};
use hound_core::{sanitize_path_segment, truncate_chars};
use hound_drive::{MirrorGateway, MirrorTarget};

use super::slack_command_helpers::{
    bot_joined_greeting, parse_bridge_command, render_attachment_failures,
    render_make_html_reply, BridgeCommand,
};
use crate::chat_transport::ChatTransport;

const MAX_ERROR_REPLY_CHARS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentStage {
    MissingUrl,
    Download,
    WriteLocal,
    Mirror,
}

impl AttachmentStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingUrl => "missing_url",
            Self::Download => "download",
            Self::WriteLocal => "write_local",
            Self::Mirror => "mirror",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFailure {
    pub index: usize,
    pub attachment_id: String,
    pub name: String,
    pub stage: AttachmentStage,
    pub reason: String,
}

/// Per-attachment failures collected while storing a file share.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{} attachment(s) failed", .0.len())]
pub struct AttachmentFailures(Vec<AttachmentFailure>);

impl AttachmentFailures {
    pub fn push(&mut self, failure: AttachmentFailure) {
        self.0.push(failure);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttachmentFailure> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Recorded {
        channel_name: String,
        log_path: PathBuf,
        files: Vec<String>,
        attachment_failures: AttachmentFailures,
        mirror_error: Option<String>,
    },
    Skipped(SkipReason),
    Replied {
        channel_id: String,
    },
    ChannelRemoved {
        removed: bool,
    },
    Ignored,
    Failed {
        error: String,
    },
}

#[derive(Debug)]
struct StoredAttachment {
    index: usize,
    attachment_id: String,
    relative_path: String,
    local_path: PathBuf,
    file_name: String,
}

/// Records chat traffic into the local log store and mirrors it remotely.
///
/// Runs on a single event loop; `&mut self` serializes directory mutation.
pub struct RecordingBridge {
    transport: Arc<dyn ChatTransport>,
    mirror: MirrorGateway,
    directory: ChannelDirectory,
    store: LogStore,
    renderer: RenderPipeline,
    policy: RecordingPolicy,
}

impl RecordingBridge {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        mirror: MirrorGateway,
        directory: ChannelDirectory,
        store: LogStore,
        policy: RecordingPolicy,
    ) -> Self {
        let renderer = RenderPipeline::new(store.clone());
        Self {
            transport,
            mirror,
            directory,
            store,
            renderer,
            policy,
        }
    }

    pub fn directory(&self) -> &ChannelDirectory {
        &self.directory
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    pub fn policy(&self) -> &RecordingPolicy {
        &self.policy
    }

    pub async fn dispatch(&mut self, event: InboundEvent) -> DispatchOutcome {
        let kind = event.kind();
        let channel_id = event.channel_id().to_string();
        match self.handle_event(event).await {
            Ok(outcome) => outcome,
            Err(error) => {
                let error_text = format!("{error:#}");
                warn!(event = kind, channel_id, error = %error_text, "event handler failed");
                if !channel_id.trim().is_empty() {
                    let reply = format!(
                        "error: {}",
                        truncate_chars(&error_text, MAX_ERROR_REPLY_CHARS)
                    );
                    self.reply(&channel_id, &reply).await;
                }
                DispatchOutcome::Failed { error: error_text }
            }
        }
    }

    async fn handle_event(&mut self, event: InboundEvent) -> Result<DispatchOutcome> {
        match event {
            InboundEvent::Message(message) => self.record_message(message).await,
            InboundEvent::MemberJoined {
                channel_id,
                user_id,
            } => self.handle_member_joined(&channel_id, &user_id).await,
            InboundEvent::ChannelArchived { channel_id } => self.handle_channel_archived(&channel_id),
            InboundEvent::SlashCommand(request) => self.handle_command(request).await,
        }
    }

    async fn record_message(&mut self, message: ChatMessageEvent) -> Result<DispatchOutcome> {
        match decide(&message, &self.policy) {
            FilterDecision::Record => {}
            FilterDecision::Skip(reason) => {
                debug!(
                    channel_id = message.channel_id,
                    reason = reason.as_str(),
                    "message not recorded"
                );
                return Ok(DispatchOutcome::Skipped(reason));
            }
            FilterDecision::Malformed(reason) => bail!("cannot record message: {reason}"),
        }

        let channel_name = self.resolve_channel_name(&message.channel_id).await?;
        let mut failures = AttachmentFailures::default();
        let mut stored = Vec::new();
        if message.is_file_share() {
            for (index, attachment) in message.attachments.iter().enumerate() {
                match self
                    .store_attachment(&channel_name, &message.event_timestamp, index, attachment)
                    .await
                {
                    Ok(saved) => stored.push(saved),
                    Err(failure) => failures.push(failure),
                }
            }
        }

        let mut entry = LogEntry::new(
            message.event_timestamp.as_str(),
            message.text.as_str(),
            message.channel_id.as_str(),
            channel_name.as_str(),
        );
        if message.is_file_share() {
            entry = entry.with_files(
                stored
                    .iter()
                    .map(|saved| saved.relative_path.clone())
                    .collect(),
            );
        }
        let log_path = self
            .store
            .append(&channel_name, &entry)
            .with_context(|| format!("failed to record message in '{channel_name}'"))?;
        info!(
            channel_id = message.channel_id,
            channel_name,
            timestamp = message.event_timestamp,
            files = stored.len(),
            "message recorded"
        );

        let log_file_name = self.store.log_file_name(&channel_name);
        let mirror_error = match self
            .mirror
            .sync(&log_file_name, &log_path, MirrorTarget::Root)
            .await
        {
            Ok(outcome) => {
                debug!(blob = log_file_name, outcome = outcome.as_str(), "log mirrored");
                None
            }
            Err(error) => {
                let error_text = format!("{error:#}");
                warn!(channel_name, error = %error_text, "log mirror failed");
                Some(error_text)
            }
        };

        let channel_folder = sanitize_path_segment(&channel_name);
        for saved in &stored {
            if let Err(error) = self
                .mirror
                .upload_attachment(&saved.file_name, &channel_folder, &saved.local_path)
                .await
            {
                failures.push(AttachmentFailure {
                    index: saved.index,
                    attachment_id: saved.attachment_id.clone(),
                    name: saved.file_name.clone(),
                    stage: AttachmentStage::Mirror,
                    reason: format!("{error:#}"),
                });
            }
        }

        if let Some(error) = &mirror_error {
            let reply = format!(
                "recorded locally, but the drive copy of {log_file_name} failed: {}",
                truncate_chars(error, MAX_ERROR_REPLY_CHARS)
            );
            self.reply(&message.channel_id, &reply).await;
        }
        if !failures.is_empty() {
            warn!(channel_name, failures = failures.len(), "attachment failures");
            let reply = render_attachment_failures(&channel_name, &failures);
            self.reply(&message.channel_id, &reply).await;
        }

        Ok(DispatchOutcome::Recorded {
            channel_name,
            log_path,
            files: entry.attachments().to_vec(),
            attachment_failures: failures,
            mirror_error,
        })
    }

    async fn store_attachment(
        &self,
        channel_name: &str,
        timestamp: &str,
        index: usize,
        attachment: &ChatAttachment,
    ) -> Result<StoredAttachment, AttachmentFailure> {
        let failure = |stage: AttachmentStage, reason: String| AttachmentFailure {
            index,
            attachment_id: attachment.id.clone(),
            name: attachment.name.clone(),
            stage,
            reason,
        };
        let Some(url) = attachment
            .download_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
        else {
            return Err(failure(
                AttachmentStage::MissingUrl,
                "attachment has no download url".to_string(),
            ));
        };
        let bytes = self
            .transport
            .download_file(url)
            .await
            .map_err(|error| failure(AttachmentStage::Download, format!("{error:#}")))?;
        let extension = attachment.local_extension();
        let local_path = self
            .store
            .write_attachment(channel_name, timestamp, index, &extension, &bytes)
            .map_err(|error| failure(AttachmentStage::WriteLocal, format!("{error:#}")))?;
        let file_name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(StoredAttachment {
            index,
            attachment_id: attachment.id.clone(),
            relative_path: self
                .store
                .attachment_relative_path(channel_name, timestamp, index, &extension),
            local_path,
            file_name,
        })
    }

    async fn handle_member_joined(
        &mut self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<DispatchOutcome> {
        if user_id != self.policy.bot_user_id {
            return Ok(DispatchOutcome::Ignored);
        }
        info!(channel_id, "bot joined channel");
        self.transport
            .post_message(channel_id, &bot_joined_greeting(&self.policy.author_id))
            .await
            .context("failed to post greeting")?;
        Ok(DispatchOutcome::Replied {
            channel_id: channel_id.to_string(),
        })
    }

    fn handle_channel_archived(&mut self, channel_id: &str) -> Result<DispatchOutcome> {
        let removed = self.directory.remove(channel_id);
        if removed {
            self.directory
                .save()
                .context("failed to save channel directory")?;
            info!(channel_id, "archived channel removed from directory");
        }
        Ok(DispatchOutcome::ChannelRemoved { removed })
    }

    async fn handle_command(&mut self, request: SlashCommandRequest) -> Result<DispatchOutcome> {
        let reply = match parse_bridge_command(&request) {
            BridgeCommand::MakeHtml { channel_name } => {
                let channel_name = match channel_name {
                    Some(name) => name,
                    None => self.resolve_channel_name(&request.channel_id).await?,
                };
                let report = self.renderer.render(&channel_name, Some(&self.mirror)).await?;
                render_make_html_reply(&report)
            }
            BridgeCommand::ShowFiles => {
                render_channel_status(&collect_channel_status(self.store.base_dir())?)
            }
            BridgeCommand::CreateChannel { name, description } => {
                self.create_channel(&name, &description).await?
            }
            BridgeCommand::Invalid { message } => message,
        };
        self.transport
            .post_message(&request.channel_id, &reply)
            .await
            .with_context(|| format!("failed to reply to {}", request.command))?;
        Ok(DispatchOutcome::Replied {
            channel_id: request.channel_id,
        })
    }

    async fn create_channel(&mut self, name: &str, description: &str) -> Result<String> {
        if self.directory.find_by_name(name).is_some() {
            return Ok(format!("channel `{name}` already exists"));
        }
        let channel_id = self
            .transport
            .create_conversation(name)
            .await
            .with_context(|| format!("failed to create channel '{name}'"))?;
        let mut updated = self.directory.clone();
        updated.add(ChannelRecord {
            channel_id: channel_id.clone(),
            display_name: name.to_string(),
            log_path: self.store.log_path(name).display().to_string(),
            description: description.to_string(),
        });
        updated
            .save()
            .with_context(|| format!("created <#{channel_id}> but failed to save channel directory"))?;
        self.directory = updated;
        info!(channel_id, channel_name = name, "channel created");
        Ok(format!("created channel <#{channel_id}> ({name})"))
    }

    async fn resolve_channel_name(&self, channel_id: &str) -> Result<String> {
        if let Ok(record) = self.directory.lookup(channel_id) {
            if !record.display_name.trim().is_empty() {
                return Ok(record.display_name.clone());
            }
        }
        let info = self
            .transport
            .conversation_info(channel_id)
            .await
            .with_context(|| format!("failed to resolve name of channel {channel_id}"))?;
        Ok(info.name)
    }

    async fn reply(&self, channel_id: &str, text: &str) {
        if let Err(error) = self.transport.post_message(channel_id, text).await {
            warn!(channel_id, error = %format!("{error:#}"), "failed to post reply");
        }
    }
}
